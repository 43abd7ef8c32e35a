//! RPC client.
//!
//! Assigns request IDs, builds tagged request envelopes, drives the call
//! over the transport and decodes the reply into a typed [`Outcome`].

mod request;

pub use request::RpcRequest;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{
    // ---
    log_debug,
    log_warn,
    JsonCodec,
    Outcome,
    PayloadCodec,
    RemoteError,
    RemoteErrorKind,
    ReplyEnvelope,
    RequestEnvelope,
    RequestId,
    RequestIdGenerator,
    Result,
    RpcConfig,
    RpcError,
    TransportPtr,
    Value,
};

/// Client side of the RPC protocol.
///
/// Cheap to clone; clones share the transport, the request ID counter and
/// the configuration. Construct with [`ClientBuilder`](crate::ClientBuilder).
///
/// Every call returns `Ok(Outcome)` when the peer answered, whether the
/// handler succeeded or not, and `Err(RpcError)` when no usable answer
/// arrived.
pub struct RpcClient<C: PayloadCodec = JsonCodec> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    // Write-locked only by replace_transport.
    transport: RwLock<TransportPtr>,
    ids: RequestIdGenerator,
    codec: C,
    config: RpcConfig,
    runtime: Option<Handle>,
}

impl<C: PayloadCodec> Clone for RpcClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: PayloadCodec> RpcClient<C> {
    // ---
    /// Create a client (internal use by ClientBuilder).
    pub(crate) fn new(
        transport: TransportPtr,
        codec: C,
        config: RpcConfig,
        runtime: Option<Handle>,
    ) -> Self {
        // ---
        Self {
            inner: Arc::new(Inner {
                transport: RwLock::new(transport),
                ids: RequestIdGenerator::new(),
                codec,
                config,
                runtime,
            }),
        }
    }

    /// Call `method` and wait for its outcome, bounded by the configured
    /// request timeout.
    ///
    /// # Errors
    ///
    /// - `RpcError::Encoding` if `params` cannot be encoded
    /// - `RpcError::Transport` if the channel fails before the reply arrives
    /// - `RpcError::Protocol` if the reply is not a well-formed answer to this call
    /// - `RpcError::Decoding` if the reply payload does not decode into `R` / `E`
    /// - `RpcError::MethodNotFound` / `RpcError::Handler` for dispatcher-side
    ///   failures that `E` cannot represent
    /// - `RpcError::Timeout` if the request timeout elapses
    pub async fn call<P, R, E>(&self, method: &str, params: &P) -> Result<Outcome<R, E>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
        E: DeserializeOwned,
    {
        // ---
        self.call_with_timeout(method, params, self.inner.config.request_timeout)
            .await
    }

    /// Like [`call`](Self::call), overriding the configured timeout.
    ///
    /// `None` waits until the reply arrives or the transport fails.
    pub async fn call_with_timeout<P, R, E>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<Outcome<R, E>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
        E: DeserializeOwned,
    {
        // ---
        let params = self.inner.codec.encode(params)?;
        let raw = self.exchange(method, params, timeout, None).await?;
        self.decode_outcome(method, raw)
    }

    /// Like [`call`](Self::call), resolving with `RpcError::Cancelled` as
    /// soon as `cancel` fires.
    ///
    /// The configured request timeout still applies.
    pub async fn call_with_cancel<P, R, E>(
        &self,
        method: &str,
        params: &P,
        cancel: &CancellationToken,
    ) -> Result<Outcome<R, E>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
        E: DeserializeOwned,
    {
        // ---
        let params = self.inner.codec.encode(params)?;
        let raw = self
            .exchange(method, params, self.inner.config.request_timeout, Some(cancel))
            .await?;
        self.decode_outcome(method, raw)
    }

    /// Send a typed request.
    pub async fn send<Q>(&self, request: &Q) -> Result<Outcome<Q::Success, Q::Error>>
    where
        Q: RpcRequest,
    {
        // ---
        self.call(request.method(), request.params()).await
    }

    /// Call `method` with pre-encoded params and return the undecoded outcome.
    pub async fn call_raw(&self, method: &str, params: Bytes) -> Result<Outcome<Bytes, Bytes>> {
        // ---
        self.exchange(method, params, self.inner.config.request_timeout, None)
            .await
    }

    /// Blocking variant of [`call`](Self::call).
    ///
    /// The call runs on the runtime captured when the client was built and
    /// the calling thread blocks until it completes. Plain threads and
    /// `spawn_blocking` threads may block; async worker threads may not, the
    /// same rule [`Handle::block_on`] applies.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Runtime` when the client has no runtime handle, or
    /// when the caller is on an async worker thread. Nothing is sent in
    /// either case. Otherwise the same errors as [`call`](Self::call).
    pub fn call_blocking<P, R, E>(&self, method: &str, params: &P) -> Result<Outcome<R, E>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
        E: DeserializeOwned,
    {
        // ---
        let runtime = self.inner.runtime.clone().ok_or_else(|| {
            RpcError::Runtime(
                "client has no runtime handle; build it inside a tokio runtime or set ClientBuilder::runtime"
                    .into(),
            )
        })?;

        let params = self.inner.codec.encode(params)?;
        let client = self.clone();
        let method_name = method.to_string();
        let timeout = self.inner.config.request_timeout;
        let spawner = runtime.clone();

        // Handle::block_on panics before polling when the thread already
        // runs the scheduler, so the call is only spawned once blocking is allowed.
        let blocked = panic::catch_unwind(AssertUnwindSafe(move || {
            runtime.block_on(async move {
                spawner
                    .spawn(async move { client.exchange(&method_name, params, timeout, None).await })
                    .await
            })
        }));

        let joined = blocked.map_err(|_| {
            RpcError::Runtime("call_blocking used from an async worker thread; use call instead".into())
        })?;
        let raw = joined.map_err(|e| RpcError::Runtime(format!("call task failed: {e}")))??;

        self.decode_outcome(method, raw)
    }

    /// Send a one-way request.
    ///
    /// The peer runs the handler for its side effect and sends no reply.
    pub async fn notify<P>(&self, method: &str, params: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        // ---
        let params = self.inner.codec.encode(params)?;
        let (id, message) = self.build_request(method, params)?;

        log_debug!("notify {method} id={id}");
        self.transport().send(message).await
    }

    /// Swap in a new transport, typically after the previous one was
    /// invalidated.
    ///
    /// Configuration and the request ID counter carry over. Calls already in
    /// flight finish on the transport they started on.
    ///
    /// The current transport sits behind an `RwLock`, separate from the ID
    /// mutex. A call holds the read side only long enough to clone the
    /// `Arc`, after its ID is assigned and never across an `.await`, so the
    /// ID counter stays the only state calls contend on. Writers appear only
    /// here.
    pub fn replace_transport(&self, transport: TransportPtr) {
        // ---
        log_debug!("replacing transport with {}", transport.transport_id());
        *write_ignore_poison(&self.inner.transport) = transport;
    }

    /// The transport new calls go out on.
    pub fn transport(&self) -> TransportPtr {
        read_ignore_poison(&self.inner.transport).clone()
    }

    /// The ID the next request will carry.
    pub fn next_id(&self) -> RequestId {
        self.inner.ids.peek()
    }

    pub fn config(&self) -> &RpcConfig {
        &self.inner.config
    }

    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    fn build_request(&self, method: &str, params: Bytes) -> Result<(RequestId, Value)> {
        // ---
        let id = self.inner.ids.next_id();
        let envelope = RequestEnvelope::new(method, id, params)
            .with_protocol_tag(Some(self.inner.config.protocol_tag.clone()));
        Ok((id, Value::from(envelope.to_dictionary()?)))
    }

    /// Send one request and wait for its reply envelope.
    async fn exchange(
        &self,
        method: &str,
        params: Bytes,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Outcome<Bytes, Bytes>> {
        // ---
        let (id, message) = self.build_request(method, params)?;
        let transport = self.transport();

        log_debug!("call {method} id={id} via {}", transport.transport_id());

        let waiting = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, transport.send_with_reply(message))
                    .await
                    .map_err(|_| RpcError::Timeout)?,
                None => transport.send_with_reply(message).await,
            }
        };

        let reply = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(RpcError::Cancelled),
                    reply = waiting => reply,
                }
            }
            None => waiting.await,
        };

        let outcome = reply.and_then(|reply| decode_reply(id, reply));
        match &outcome {
            Ok(Outcome::Success(_)) => {
                log_debug!("call {method} id={id} completed with success");
            }
            Ok(Outcome::Error(_)) => {
                log_debug!("call {method} id={id} completed with error");
            }
            Err(_e) => {
                log_debug!("call {method} id={id} failed: {_e}");
            }
        }
        outcome
    }

    fn decode_outcome<R, E>(&self, method: &str, raw: Outcome<Bytes, Bytes>) -> Result<Outcome<R, E>>
    where
        R: DeserializeOwned,
        E: DeserializeOwned,
    {
        // ---
        let codec = &self.inner.codec;
        match raw {
            Outcome::Success(bytes) => codec.decode(&bytes).map(Outcome::Success),
            Outcome::Error(bytes) => match codec.decode::<E>(&bytes) {
                Ok(err) => Ok(Outcome::Error(err)),
                Err(decode_err) => match codec.decode::<RemoteError>(&bytes) {
                    Ok(remote) => Err(remote_failure(remote)),
                    Err(_) => {
                        log_warn!("undecodable error payload from {method}: {decode_err}");
                        Err(decode_err)
                    }
                },
            },
        }
    }
}

/// Interpret a reply value as the answer to request `id`.
fn decode_reply(id: RequestId, reply: Value) -> Result<Outcome<Bytes, Bytes>> {
    // ---
    let dict = match reply {
        Value::Dictionary(dict) => dict,
        Value::Error(event) => return Err(RpcError::Transport(event.to_string())),
        other => {
            return Err(RpcError::Decoding(format!(
                "reply should be a dictionary, found {}",
                other.kind()
            )));
        }
    };

    let envelope = ReplyEnvelope::from_dictionary(&dict)?;
    if envelope.id != id {
        return Err(RpcError::Protocol(format!(
            "reply id {} does not match request id {id}",
            envelope.id
        )));
    }
    Ok(envelope.outcome)
}

fn remote_failure(remote: RemoteError) -> RpcError {
    // ---
    match remote.kind {
        RemoteErrorKind::MethodNotFound => RpcError::MethodNotFound(remote.message),
        _ => RpcError::Handler(remote.to_string()),
    }
}

fn read_ignore_poison<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_ignore_poison<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{Dictionary, ErrorEvent, ReplyEnvelope};

    #[test]
    fn test_reply_for_other_request_is_protocol_error() {
        // ---
        let reply = ReplyEnvelope::success(RequestId::new(8), Bytes::from_static(b"1"));
        let err = decode_reply(RequestId::new(7), reply.to_dictionary().into()).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn test_error_event_reply_is_transport_error() {
        // ---
        let err = decode_reply(
            RequestId::new(1),
            Value::Error(ErrorEvent::ConnectionInterrupted),
        )
        .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn test_non_dictionary_reply_is_decoding_error() {
        // ---
        let err = decode_reply(RequestId::new(1), Value::from("hello")).unwrap_err();
        assert!(matches!(err, RpcError::Decoding(_)));
    }

    #[test]
    fn test_empty_reply_is_protocol_error() {
        // ---
        let mut dict = Dictionary::new();
        dict.insert("id", 1u64);
        let err = decode_reply(RequestId::new(1), dict.into()).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn test_remote_failure_mapping() {
        // ---
        assert_eq!(
            remote_failure(RemoteError::method_not_found("echo")),
            RpcError::MethodNotFound("no handler registered for method 'echo'".into())
        );
        assert!(matches!(
            remote_failure(RemoteError::handler_failed("panicked")),
            RpcError::Handler(_)
        ));
    }
}
