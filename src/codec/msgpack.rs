//! MessagePack payload codec using `rmp-serde`.
//!
//! Structs are written as maps (`to_vec_named`) so that field order changes
//! on either peer do not corrupt payloads.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{PayloadCodec, Result, RpcError};

/// MessagePack payload codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl PayloadCodec for MsgPackCodec {
    // ---
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode<T>(&self, value: &T) -> Result<Bytes>
    where
        T: Serialize + ?Sized,
    {
        // ---
        rmp_serde::to_vec_named(value)
            .map(Bytes::from)
            .map_err(|e| RpcError::Encoding(e.to_string()))
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        // ---
        rmp_serde::from_slice(bytes).map_err(|e| RpcError::Decoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Message {
        id: u32,
        content: String,
        parts: Vec<Option<i64>>,
    }

    #[test]
    fn test_record_survives() {
        // ---
        let msg = Message {
            id: 42,
            content: "hello".to_string(),
            parts: vec![Some(-1), None],
        };

        let bytes = MsgPackCodec.encode(&msg).unwrap();
        let decoded: Message = MsgPackCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_truncated_input_is_decoding_error() {
        // ---
        let bytes = MsgPackCodec.encode("a longer string").unwrap();
        let err = MsgPackCodec.decode::<String>(&bytes[..3]).unwrap_err();
        assert!(matches!(err, RpcError::Decoding(_)));
    }
}
