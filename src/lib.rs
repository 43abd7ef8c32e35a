//! Request/reply RPC over a structured-message IPC transport.
//!
//! This library layers named, typed method calls on top of a duplex channel
//! that already delivers structured values and routes replies back to their
//! sender. It handles request ID assignment, envelope encoding, reply
//! correlation, timeouts and cancellation on the client side, and handler
//! dispatch with error isolation on the server side.
//!
//! ```no_run
//! use ipc_rpc::{ClientBuilder, DispatcherBuilder, MemoryTransport, Outcome};
//!
//! # async fn example() -> ipc_rpc::Result<()> {
//! let (client_end, server_end) = MemoryTransport::pair("client", "server");
//!
//! DispatcherBuilder::new()
//!     .register("echo", |text: String| async move { Ok::<_, String>(text) })
//!     .build()?
//!     .attach(&(server_end as ipc_rpc::TransportPtr))?;
//!
//! let client = ClientBuilder::new(client_end).build()?;
//! let outcome: Outcome<String, String> = client.call("echo", "hello").await?;
//! assert_eq!(outcome, Outcome::Success("hello".to_string()));
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod macros;

mod client;
mod codec;
mod domain;
mod protocol;
mod server;
mod transport;

mod client_builder;
mod dispatcher_builder;
mod rpc_config;

mod error;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{RpcClient, RpcRequest};
pub use client_builder::ClientBuilder;
pub use dispatcher_builder::DispatcherBuilder;
pub use server::{BoxFuture, Dispatcher, Disposition, MethodHandler, TransportEventHook};

pub use rpc_config::{RejectionPolicy, RpcConfig};

pub use error::{Result, RpcError};

#[cfg(feature = "msgpack")]
pub use codec::MsgPackCodec;
pub use codec::{JsonCodec, PayloadCodec};

pub use transport::{create_memory_transport_pair, MemoryTransport};

pub use tokio_util::sync::CancellationToken;

// --- public re-exports
pub use domain::{
    //
    ChannelControl,
    Dictionary,
    Endpoint,
    ErrorEvent,
    Fd,
    Inbound,
    InboundHandler,
    InboundHandlerPtr,
    ReplyContext,
    ReplySink,
    Transport,
    TransportBase,
    TransportPtr,
    Value,
    ValueKind,
};

pub use protocol::{
    //
    Outcome,
    RemoteError,
    RemoteErrorKind,
    ReplyEnvelope,
    RequestEnvelope,
    RequestId,
    RequestIdGenerator,
    DEFAULT_PROTOCOL_TAG,
    ERROR_KEY,
    ID_KEY,
    METHOD_KEY,
    PARAMS_KEY,
    PROTOCOL_TAG_KEY,
    SUCCESS_KEY,
};
