use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{PayloadCodec, Result, RpcError};

/// JSON payload codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    // ---
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T>(&self, value: &T) -> Result<Bytes>
    where
        T: Serialize + ?Sized,
    {
        // ---
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| RpcError::Encoding(e.to_string()))
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        // ---
        serde_json::from_slice(bytes).map_err(|e| RpcError::Decoding(e.to_string()))
    }
}
