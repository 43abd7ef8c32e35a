//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! concrete transport implementations and payload codecs.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod transport;
mod value;

// --- Transport domain re-exports ---

pub use transport::{
    //
    ChannelControl,
    Inbound,
    InboundHandler,
    InboundHandlerPtr,
    ReplyContext,
    ReplySink,
    Transport,
    TransportBase,
    TransportPtr,
};

// --- Value domain re-exports ---

pub use value::{
    //
    Dictionary,
    Endpoint,
    ErrorEvent,
    Fd,
    Value,
    ValueKind,
};
