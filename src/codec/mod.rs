//! Payload codecs.
//!
//! A payload codec turns typed application values into the opaque bytes
//! carried in envelope `params`, `success` and `error` fields, and back.
//! The envelope layer never looks inside those bytes.
//!
//! - [`JsonCodec`] - JSON via `serde_json` (default)
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` (feature `msgpack`)
//!
//! Both peers of a channel must use the same codec.

mod json;
#[cfg(feature = "msgpack")]
mod msgpack;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

pub use json::JsonCodec;
#[cfg(feature = "msgpack")]
pub use msgpack::MsgPackCodec;

/// Pluggable encode/decode boundary for payload bytes.
///
/// Implementations map serializer failures to
/// [`RpcError::Encoding`](crate::RpcError::Encoding) and deserializer
/// failures to [`RpcError::Decoding`](crate::RpcError::Decoding).
pub trait PayloadCodec: Clone + Send + Sync + 'static {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn encode<T>(&self, value: &T) -> Result<Bytes>
    where
        T: Serialize + ?Sized;

    fn decode<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned;
}
