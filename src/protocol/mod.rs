//! Protocol types for RPC envelopes and request correlation
//!
//! This module defines the logical request/reply envelope, the outcome it
//! carries, and request ID management.
mod envelope;
mod outcome;
mod request_id;

pub use envelope::{
    //
    ReplyEnvelope,
    RequestEnvelope,
    DEFAULT_PROTOCOL_TAG,
    ERROR_KEY,
    ID_KEY,
    METHOD_KEY,
    PARAMS_KEY,
    PROTOCOL_TAG_KEY,
    SUCCESS_KEY,
};
pub use outcome::{Outcome, RemoteError, RemoteErrorKind};
pub use request_id::{RequestId, RequestIdGenerator};
