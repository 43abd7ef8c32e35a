use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{
    // ---
    log_warn,
    Outcome,
    PayloadCodec,
    RemoteError,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased method handler.
///
/// Maps encoded params to an encoded outcome. Registered once on a
/// [`DispatcherBuilder`](crate::DispatcherBuilder) and shared read-only by
/// every request for that method.
pub trait MethodHandler: Send + Sync {
    fn call(&self, params: Bytes) -> BoxFuture<'static, Outcome<Bytes, Bytes>>;
}

/// Handler over already-encoded bytes.
pub(crate) struct RawHandler<F> {
    pub(crate) func: F,
}

impl<F, Fut> MethodHandler for RawHandler<F>
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<Bytes, Bytes>> + Send + 'static,
{
    fn call(&self, params: Bytes) -> BoxFuture<'static, Outcome<Bytes, Bytes>> {
        Box::pin((self.func)(params))
    }
}

/// Handler over typed values, decoding params and encoding the result with
/// the dispatcher's codec.
pub(crate) struct TypedHandler<C, F, Fut, P, R, E> {
    pub(crate) codec: C,
    pub(crate) func: F,
    pub(crate) _phantom: PhantomData<fn(P) -> (Fut, R, E)>,
}

impl<C, F, Fut, P, R, E> MethodHandler for TypedHandler<C, F, Fut, P, R, E>
where
    C: PayloadCodec,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: Serialize + Send + 'static,
{
    fn call(&self, params: Bytes) -> BoxFuture<'static, Outcome<Bytes, Bytes>> {
        // ---
        let codec = self.codec.clone();

        let input: P = match codec.decode(&params) {
            Ok(input) => input,
            Err(e) => {
                let payload = encode_remote_error(&codec, &RemoteError::invalid_params(e.to_string()));
                return Box::pin(async move { Outcome::Error(payload) });
            }
        };

        let fut = (self.func)(input);

        Box::pin(async move {
            let encoded = match fut.await {
                Ok(result) => codec.encode(&result).map(Outcome::Success),
                Err(err) => codec.encode(&err).map(Outcome::Error),
            };

            encoded.unwrap_or_else(|e| {
                log_warn!("handler result could not be encoded: {e}");
                Outcome::Error(encode_remote_error(
                    &codec,
                    &RemoteError::encoding_failed(e.to_string()),
                ))
            })
        })
    }
}

/// Encode a dispatcher-generated failure.
///
/// Falls back to the bare message bytes in the unlikely case the codec
/// cannot encode a two-field struct.
pub(crate) fn encode_remote_error<C: PayloadCodec>(codec: &C, err: &RemoteError) -> Bytes {
    // ---
    codec
        .encode(err)
        .unwrap_or_else(|_| Bytes::from(err.message.clone().into_bytes()))
}
