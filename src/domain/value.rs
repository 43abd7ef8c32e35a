// src/domain/value.rs

//! Transport value model.
//!
//! The transport moves structured values, not raw bytes. A [`Value`] is a
//! closed tagged union over everything the transport can carry; the RPC layer
//! classifies inbound messages by matching on it exhaustively rather than by
//! probing types at runtime.
//!
//! Keyed maps are represented by [`Dictionary`]. Request and reply envelopes
//! are dictionaries whose payload fields hold opaque [`Value::Data`] bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

/// Transport-level error event.
///
/// Delivered in place of a message when the channel changes state. An
/// outstanding `send_with_reply` resolves with one of these when the channel
/// fails before the peer answers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorEvent {
    /// The channel is permanently unusable (cancelled or peer gone).
    #[error("connection invalid")]
    ConnectionInvalid,

    /// The exchange was interrupted; the channel may still be usable.
    #[error("connection interrupted")]
    ConnectionInterrupted,

    /// The peer announced that it is about to terminate.
    #[error("termination imminent")]
    TerminationImminent,
}

/// File descriptor carried by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd(pub i32);

/// Opaque channel endpoint that can be handed to another peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(pub Arc<str>);

impl From<&str> for Endpoint {
    fn from(name: &str) -> Self {
        Endpoint(Arc::from(name))
    }
}

impl From<String> for Endpoint {
    fn from(name: String) -> Self {
        Endpoint(Arc::from(name))
    }
}

impl From<Arc<str>> for Endpoint {
    fn from(name: Arc<str>) -> Self {
        Endpoint(name)
    }
}

/// Discriminant of a [`Value`], used for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int64,
    Uint64,
    Double,
    String,
    Data,
    Array,
    Dictionary,
    Null,
    Date,
    Uuid,
    Fd,
    Error,
    Endpoint,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int64 => "int64",
            ValueKind::Uint64 => "uint64",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Data => "data",
            ValueKind::Array => "array",
            ValueKind::Dictionary => "dictionary",
            ValueKind::Null => "null",
            ValueKind::Date => "date",
            ValueKind::Uuid => "uuid",
            ValueKind::Fd => "fd",
            ValueKind::Error => "error",
            ValueKind::Endpoint => "endpoint",
        };
        f.write_str(name)
    }
}

/// A structured value carried by the transport.
///
/// Equality and hashing are structural. Doubles compare by bit pattern so
/// that `Value` can satisfy `Eq` and be used as a map key.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(Arc<str>),
    Data(Bytes),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    Null,
    Date(SystemTime),
    Uuid(Uuid),
    Fd(Fd),
    Error(ErrorEvent),
    Endpoint(Endpoint),
}

impl Value {
    // ---
    /// Returns the discriminant of this value.
    pub fn kind(&self) -> ValueKind {
        // ---
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int64(_) => ValueKind::Int64,
            Value::Uint64(_) => ValueKind::Uint64,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Data(_) => ValueKind::Data,
            Value::Array(_) => ValueKind::Array,
            Value::Dictionary(_) => ValueKind::Dictionary,
            Value::Null => ValueKind::Null,
            Value::Date(_) => ValueKind::Date,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Fd(_) => ValueKind::Fd,
            Value::Error(_) => ValueKind::Error,
            Value::Endpoint(_) => ValueKind::Endpoint,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// Borrow the bytes of a `Data` value.
    pub fn as_data(&self) -> Option<&Bytes> {
        match self {
            Value::Data(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<ErrorEvent> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        // ---
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Dictionary(a), Value::Dictionary(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Fd(a), Value::Fd(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Endpoint(a), Value::Endpoint(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // ---
        self.kind().hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::Uint64(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Data(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
            Value::Dictionary(v) => v.hash(state),
            Value::Null => {}
            Value::Date(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Fd(v) => v.hash(state),
            Value::Error(v) => v.hash(state),
            Value::Endpoint(v) => v.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value::String(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Data(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Dictionary> for Value {
    fn from(value: Dictionary) -> Self {
        Value::Dictionary(value)
    }
}

impl From<SystemTime> for Value {
    fn from(value: SystemTime) -> Self {
        Value::Date(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<Fd> for Value {
    fn from(value: Fd) -> Self {
        Value::Fd(value)
    }
}

impl From<ErrorEvent> for Value {
    fn from(value: ErrorEvent) -> Self {
        Value::Error(value)
    }
}

impl From<Endpoint> for Value {
    fn from(value: Endpoint) -> Self {
        Value::Endpoint(value)
    }
}

/// Keyed map of values, addressed by string keys.
///
/// Keys are kept sorted so that equality, hashing and debug output do not
/// depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Dictionary {
    // ---
    entries: BTreeMap<String, Value>,
}

impl Dictionary {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Look up a field by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Set a field, returning the previous value under that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Dictionary
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        // ---
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_kind_names() {
        // ---
        assert_eq!(Value::from("x").kind().to_string(), "string");
        assert_eq!(Value::from(Dictionary::new()).kind().to_string(), "dictionary");
        assert_eq!(
            Value::from(ErrorEvent::ConnectionInvalid).kind().to_string(),
            "error"
        );
        assert_eq!(Value::Null.kind(), ValueKind::Null);
    }

    #[test]
    fn test_double_equality_is_bitwise() {
        // ---
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_ne!(Value::Int64(1), Value::Uint64(1));
    }

    #[test]
    fn test_values_hash_structurally() {
        // ---
        let a: Dictionary = [("name", Value::from("Tom")), ("age", Value::from(7u64))]
            .into_iter()
            .collect();
        let b: Dictionary = [("age", Value::from(7u64)), ("name", Value::from("Tom"))]
            .into_iter()
            .collect();

        let mut set = HashSet::new();
        set.insert(Value::from(a));
        assert!(set.contains(&Value::from(b)));
    }

    #[test]
    fn test_dictionary_get_and_insert() {
        // ---
        let mut dict = Dictionary::new();
        assert!(dict.is_empty());

        assert!(dict.insert("id", 3u64).is_none());
        let previous = dict.insert("id", 4u64);

        assert_eq!(previous, Some(Value::Uint64(3)));
        assert_eq!(dict.get("id").and_then(Value::as_u64), Some(4));
        assert_eq!(dict.len(), 1);
        assert!(dict.get("missing").is_none());
    }
}
