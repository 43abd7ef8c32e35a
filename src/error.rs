use thiserror::Error;

/// Errors surfaced by the RPC layer.
///
/// Every variant is a recoverable failure returned to the caller. A malformed
/// reply or a misbehaving peer never takes the process down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// A value could not be turned into bytes, or an envelope could not be built.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Bytes could not be turned into a value, or an envelope had the wrong shape.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The channel is invalid, was interrupted, or is terminating.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer violated the envelope protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer has no handler registered for the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The peer's handler reported a failure that the caller's error type
    /// could not represent.
    #[error("handler error: {0}")]
    Handler(String),

    /// No reply arrived within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the request before a reply arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The async runtime needed to drive a call is unavailable.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A builder or transport was configured inconsistently.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
