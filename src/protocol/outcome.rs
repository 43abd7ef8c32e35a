use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of a remote call as carried by a reply envelope.
///
/// Exactly one of `Success` or `Error`. On the wire both sides are opaque
/// bytes; the client decodes them into typed values with the payload codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<S, E> {
    Success(S),
    Error(E),
}

impl<S, E> Outcome<S, E> {
    // ---
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn success(self) -> Option<S> {
        match self {
            Outcome::Success(s) => Some(s),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(self) -> Option<E> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }

    pub fn as_ref(&self) -> Outcome<&S, &E> {
        match self {
            Outcome::Success(s) => Outcome::Success(s),
            Outcome::Error(e) => Outcome::Error(e),
        }
    }

    pub fn map<T, F>(self, f: F) -> Outcome<T, E>
    where
        F: FnOnce(S) -> T,
    {
        match self {
            Outcome::Success(s) => Outcome::Success(f(s)),
            Outcome::Error(e) => Outcome::Error(e),
        }
    }

    pub fn map_err<T, F>(self, f: F) -> Outcome<S, T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            Outcome::Success(s) => Outcome::Success(s),
            Outcome::Error(e) => Outcome::Error(f(e)),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> std::result::Result<S, E> {
        match self {
            Outcome::Success(s) => Ok(s),
            Outcome::Error(e) => Err(e),
        }
    }
}

impl<S, E> From<std::result::Result<S, E>> for Outcome<S, E> {
    fn from(result: std::result::Result<S, E>) -> Self {
        // ---
        match result {
            Ok(s) => Outcome::Success(s),
            Err(e) => Outcome::Error(e),
        }
    }
}

/// Category of a failure produced by the dispatcher rather than by the
/// application handler's own error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// No handler is registered under the requested method name.
    MethodNotFound,
    /// The request params could not be decoded into the handler's input type.
    InvalidParams,
    /// The handler panicked or otherwise failed outside its own error type.
    HandlerFailed,
    /// The handler's result could not be encoded.
    EncodingFailed,
}

/// Error payload written by the dispatcher into the reply `error` field.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct RemoteError {
    // ---
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    // ---
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        // ---
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        // ---
        Self::new(
            RemoteErrorKind::MethodNotFound,
            format!("no handler registered for method '{method}'"),
        )
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        // ---
        Self::new(RemoteErrorKind::InvalidParams, details)
    }

    pub fn handler_failed(details: impl Into<String>) -> Self {
        // ---
        Self::new(RemoteErrorKind::HandlerFailed, details)
    }

    pub fn encoding_failed(details: impl Into<String>) -> Self {
        // ---
        Self::new(RemoteErrorKind::EncodingFailed, details)
    }
}
