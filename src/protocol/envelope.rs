// src/protocol/envelope.rs

//! Request and reply envelopes.
//!
//! Envelopes are the RPC layer's logical wire shape, expressed as transport
//! [`Dictionary`] values:
//!
//! ```text
//! request = { xpcrpc: "1", method: string, id: uint64, params: data }
//! reply   = { id: uint64, success: data }
//!         | { id: uint64, error: data }
//! ```
//!
//! This module only (de)structures that shape. `params`, `success` and
//! `error` stay opaque bytes until the payload codec interprets them.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    // ---
    Dictionary,
    Outcome,
    RequestId,
    Result,
    RpcError,
    Value,
};

/// Key whose presence marks a dictionary as an RPC request.
pub const PROTOCOL_TAG_KEY: &str = "xpcrpc";

/// Protocol tag value written by this implementation.
pub const DEFAULT_PROTOCOL_TAG: &str = "1";

pub const METHOD_KEY: &str = "method";
pub const ID_KEY: &str = "id";
pub const PARAMS_KEY: &str = "params";
pub const SUCCESS_KEY: &str = "success";
pub const ERROR_KEY: &str = "error";

/// A request envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    // ---
    /// Marks the message as RPC traffic; `None` only for foreign messages.
    pub protocol_tag: Option<Arc<str>>,

    /// Method name used to select the handler. Never empty.
    pub method: Arc<str>,

    /// Correlation identifier copied into the reply.
    pub id: RequestId,

    /// Codec-encoded call parameters.
    pub params: Bytes,
}

impl RequestEnvelope {
    // ---
    /// Create a request envelope carrying the default protocol tag.
    pub fn new(method: impl Into<Arc<str>>, id: RequestId, params: Bytes) -> Self {
        // ---
        Self {
            protocol_tag: Some(Arc::from(DEFAULT_PROTOCOL_TAG)),
            method: method.into(),
            id,
            params,
        }
    }

    /// Replace the protocol tag.
    pub fn with_protocol_tag(mut self, tag: Option<Arc<str>>) -> Self {
        self.protocol_tag = tag;
        self
    }

    /// Structure the envelope as a transport dictionary.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Encoding` if the method name is empty.
    pub fn to_dictionary(&self) -> Result<Dictionary> {
        // ---
        if self.method.is_empty() {
            return Err(RpcError::Encoding("method name must not be empty".into()));
        }

        let mut dict = Dictionary::new();
        if let Some(tag) = &self.protocol_tag {
            dict.insert(PROTOCOL_TAG_KEY, tag.clone());
        }
        dict.insert(METHOD_KEY, self.method.clone());
        dict.insert(ID_KEY, self.id.as_u64());
        dict.insert(PARAMS_KEY, self.params.clone());
        Ok(dict)
    }

    /// Destructure a transport dictionary into a request envelope.
    ///
    /// A missing protocol tag is not an error here; callers decide whether
    /// untagged messages are acceptable.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Decoding` if a field is missing, has the wrong
    /// type, or the method name is empty.
    pub fn from_dictionary(dict: &Dictionary) -> Result<Self> {
        // ---
        let protocol_tag = match dict.get(PROTOCOL_TAG_KEY) {
            None => None,
            Some(Value::String(tag)) => Some(tag.clone()),
            Some(other) => return Err(wrong_type(PROTOCOL_TAG_KEY, "string", other)),
        };

        let method = match require(dict, METHOD_KEY)? {
            Value::String(m) if !m.is_empty() => m.clone(),
            Value::String(_) => {
                return Err(RpcError::Decoding("request method name is empty".into()));
            }
            other => return Err(wrong_type(METHOD_KEY, "string", other)),
        };

        let id = decode_id(dict)?;
        let params = decode_data(dict, PARAMS_KEY)?;

        Ok(Self {
            protocol_tag,
            method,
            id,
            params,
        })
    }
}

/// A reply envelope.
///
/// The outcome enum makes "both fields" and "neither field" unrepresentable
/// on the encode side; [`from_dictionary`](Self::from_dictionary) rejects
/// them on the decode side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    // ---
    /// Copied from the request being answered.
    pub id: RequestId,

    pub outcome: Outcome<Bytes, Bytes>,
}

impl ReplyEnvelope {
    // ---
    pub fn success(id: RequestId, payload: Bytes) -> Self {
        // ---
        Self {
            id,
            outcome: Outcome::Success(payload),
        }
    }

    pub fn error(id: RequestId, payload: Bytes) -> Self {
        // ---
        Self {
            id,
            outcome: Outcome::Error(payload),
        }
    }

    /// Structure the envelope as a transport dictionary.
    pub fn to_dictionary(&self) -> Dictionary {
        // ---
        let mut dict = Dictionary::new();
        dict.insert(ID_KEY, self.id.as_u64());
        match &self.outcome {
            Outcome::Success(bytes) => dict.insert(SUCCESS_KEY, bytes.clone()),
            Outcome::Error(bytes) => dict.insert(ERROR_KEY, bytes.clone()),
        };
        dict
    }

    /// Destructure a transport dictionary into a reply envelope.
    ///
    /// # Errors
    ///
    /// - `RpcError::Decoding` if `id` is missing or a field has the wrong type
    /// - `RpcError::Protocol` if both or neither of `success` / `error` are set
    pub fn from_dictionary(dict: &Dictionary) -> Result<Self> {
        // ---
        let id = decode_id(dict)?;

        let outcome = match (dict.contains_key(SUCCESS_KEY), dict.contains_key(ERROR_KEY)) {
            (true, false) => Outcome::Success(decode_data(dict, SUCCESS_KEY)?),
            (false, true) => Outcome::Error(decode_data(dict, ERROR_KEY)?),
            (true, true) => {
                return Err(RpcError::Protocol(format!(
                    "reply {id} carries both success and error"
                )));
            }
            (false, false) => {
                return Err(RpcError::Protocol(format!(
                    "reply {id} carries neither success nor error"
                )));
            }
        };

        Ok(Self { id, outcome })
    }
}

fn require<'a>(dict: &'a Dictionary, key: &str) -> Result<&'a Value> {
    // ---
    dict.get(key)
        .ok_or_else(|| RpcError::Decoding(format!("envelope is missing '{key}'")))
}

fn decode_id(dict: &Dictionary) -> Result<RequestId> {
    // ---
    match require(dict, ID_KEY)? {
        Value::Uint64(id) => Ok(RequestId::new(*id)),
        other => Err(wrong_type(ID_KEY, "uint64", other)),
    }
}

fn decode_data(dict: &Dictionary, key: &str) -> Result<Bytes> {
    // ---
    match require(dict, key)? {
        Value::Data(bytes) => Ok(bytes.clone()),
        other => Err(wrong_type(key, "data", other)),
    }
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> RpcError {
    // ---
    RpcError::Decoding(format!(
        "envelope field '{key}' should be {expected}, found {}",
        found.kind()
    ))
}
