//! Server-side dispatch.
//!
//! A [`Dispatcher`] is installed as a transport's inbound handler. For each
//! inbound message it classifies the value, validates the request envelope,
//! runs the registered method handler and answers through the message's
//! reply context.

mod handler;

pub use handler::{BoxFuture, MethodHandler};
pub(crate) use handler::{encode_remote_error, RawHandler, TypedHandler};

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    Dictionary,
    ErrorEvent,
    Inbound,
    InboundHandler,
    JsonCodec,
    Outcome,
    PayloadCodec,
    RejectionPolicy,
    RemoteError,
    ReplyEnvelope,
    RequestEnvelope,
    Result,
    RpcConfig,
    RpcError,
    TransportPtr,
    Value,
};

/// Observer for transport error events.
pub type TransportEventHook = Arc<dyn Fn(ErrorEvent) + Send + Sync>;

/// Registry of RPC method handlers.
///
/// Key: method name, Value: type-erased handler.
pub(crate) type HandlerTable = HashMap<String, Arc<dyn MethodHandler>>;

/// What the dispatcher did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The request was handled and the reply was sent.
    Replied,

    /// The request was handled; it carried no reply context, so nothing was sent.
    NoReply,

    /// The request was handled but the reply could not be delivered.
    ReplyFailed,

    /// The message was not a well-formed RPC request and was dropped.
    Rejected,

    /// The message was a transport error event.
    TransportEvent,
}

/// Server side of the RPC protocol.
///
/// Cheap to clone. The handler table is fixed when the dispatcher is built
/// and read without locking by concurrent requests. Construct with
/// [`DispatcherBuilder`](crate::DispatcherBuilder).
pub struct Dispatcher<C: PayloadCodec = JsonCodec> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    handlers: HandlerTable,
    codec: C,
    config: RpcConfig,
    on_transport_event: Option<TransportEventHook>,
}

impl<C: PayloadCodec> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: PayloadCodec> Dispatcher<C> {
    // ---
    /// Create a dispatcher (internal use by DispatcherBuilder).
    pub(crate) fn new(
        handlers: HandlerTable,
        codec: C,
        config: RpcConfig,
        on_transport_event: Option<TransportEventHook>,
    ) -> Self {
        // ---
        Self {
            inner: Arc::new(Inner {
                handlers,
                codec,
                config,
                on_transport_event,
            }),
        }
    }

    /// Install this dispatcher as `transport`'s inbound handler.
    ///
    /// # Errors
    ///
    /// Whatever the transport reports, e.g. `RpcError::InvalidConfig` if it
    /// already has a handler.
    pub fn attach(&self, transport: &TransportPtr) -> Result<()> {
        // ---
        log_info!(
            "dispatcher serving {} method(s) on {}",
            self.inner.handlers.len(),
            transport.transport_id()
        );
        transport.set_inbound_handler(Arc::new(self.clone()))
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.inner.handlers.contains_key(method)
    }

    /// Registered method names, in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.inner.handlers.keys().map(String::as_str)
    }

    pub fn config(&self) -> &RpcConfig {
        &self.inner.config
    }

    /// Process one inbound message.
    ///
    /// Never fails: every problem with the message is either answered with an
    /// error outcome or logged and dropped.
    pub async fn dispatch(&self, mut inbound: Inbound) -> Disposition {
        // ---
        let request = match inbound.message() {
            Value::Error(event) => {
                self.transport_event(*event);
                return Disposition::TransportEvent;
            }
            Value::Dictionary(dict) => match self.parse_request(dict) {
                Ok(request) => request,
                Err(e) => {
                    log_warn!("rejecting inbound message: {e}");
                    return self.reject(inbound);
                }
            },
            _other => {
                log_warn!("rejecting inbound {} message", _other.kind());
                return self.reject(inbound);
            }
        };

        let reply = inbound.create_reply_context();
        drop(inbound);

        let outcome = self.invoke(&request).await;

        let Some(reply) = reply else {
            log_debug!("one-way request {} id={} handled", request.method, request.id);
            return Disposition::NoReply;
        };

        let envelope = ReplyEnvelope {
            id: request.id,
            outcome,
        };

        match reply.send(envelope.to_dictionary()) {
            Ok(()) => Disposition::Replied,
            Err(_e) => {
                log_warn!(
                    "reply to {} id={} not delivered: {_e}",
                    request.method,
                    request.id
                );
                Disposition::ReplyFailed
            }
        }
    }

    /// Validate an inbound dictionary as a request for this dispatcher.
    fn parse_request(&self, dict: &Dictionary) -> Result<RequestEnvelope> {
        // ---
        let request = RequestEnvelope::from_dictionary(dict)?;

        match &request.protocol_tag {
            Some(tag) if *tag == self.inner.config.protocol_tag => Ok(request),
            Some(tag) => Err(RpcError::Protocol(format!(
                "unsupported protocol tag '{tag}' on request {}",
                request.id
            ))),
            None => Err(RpcError::Protocol(format!(
                "request {} carries no protocol tag",
                request.id
            ))),
        }
    }

    /// Abandon the exchange, closing the channel if configured to.
    fn reject(&self, inbound: Inbound) -> Disposition {
        // ---
        if self.inner.config.rejection_policy == RejectionPolicy::CloseChannel {
            if let Some(channel) = inbound.channel() {
                log_warn!("closing channel after rejected message");
                channel.close();
            }
        }
        Disposition::Rejected
    }

    /// Run the handler for `request` on its own task.
    async fn invoke(&self, request: &RequestEnvelope) -> Outcome<Bytes, Bytes> {
        // ---
        let Some(handler) = self.inner.handlers.get(&*request.method).cloned() else {
            log_warn!("no handler for method: {}", request.method);
            return Outcome::Error(encode_remote_error(
                &self.inner.codec,
                &RemoteError::method_not_found(&request.method),
            ));
        };

        let params = request.params.clone();
        let task = tokio::spawn(async move { handler.call(params).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_error!("handler for {} id={} failed: {e}", request.method, request.id);
                Outcome::Error(encode_remote_error(
                    &self.inner.codec,
                    &RemoteError::handler_failed(format!(
                        "handler for '{}' did not complete",
                        request.method
                    )),
                ))
            }
        }
    }

    fn transport_event(&self, event: ErrorEvent) {
        // ---
        match event {
            ErrorEvent::ConnectionInterrupted => {
                log_warn!("transport event: {event}");
            }
            ErrorEvent::ConnectionInvalid | ErrorEvent::TerminationImminent => {
                log_info!("transport event: {event}");
            }
        }

        if let Some(hook) = &self.inner.on_transport_event {
            hook(event);
        }
    }
}

#[async_trait::async_trait]
impl<C: PayloadCodec> InboundHandler for Dispatcher<C> {
    async fn handle_event(&self, inbound: Inbound) {
        // ---
        self.dispatch(inbound).await;
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{
        ChannelControl, DispatcherBuilder, RemoteErrorKind, ReplyContext, RequestId,
        DEFAULT_PROTOCOL_TAG, ERROR_KEY, SUCCESS_KEY,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn echo_dispatcher() -> Dispatcher {
        // ---
        DispatcherBuilder::new()
            .register_raw("echo", |params: Bytes| async move { Outcome::Success(params) })
            .build()
            .unwrap()
    }

    fn request(method: &str, id: u64, params: &'static [u8]) -> Dictionary {
        // ---
        RequestEnvelope::new(method, RequestId::new(id), Bytes::from_static(params))
            .to_dictionary()
            .unwrap()
    }

    fn with_reply(message: Dictionary) -> (Inbound, oneshot::Receiver<Value>) {
        // ---
        let (tx, rx) = oneshot::channel();
        let inbound = Inbound::new(message).with_reply_context(ReplyContext::new(tx));
        (inbound, rx)
    }

    #[derive(Default)]
    struct FakeChannel {
        closed: AtomicBool,
    }

    impl ChannelControl for FakeChannel {
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_echo_reply_copies_id() {
        // ---
        let (inbound, rx) = with_reply(request("echo", 7, b"payload"));

        let disposition = echo_dispatcher().dispatch(inbound).await;
        assert_eq!(disposition, Disposition::Replied);

        let reply = rx.await.unwrap();
        let reply = reply.as_dictionary().unwrap();
        assert_eq!(reply.get("id").and_then(Value::as_u64), Some(7));
        assert_eq!(
            reply.get(SUCCESS_KEY).and_then(Value::as_data),
            Some(&Bytes::from_static(b"payload"))
        );
        assert!(!reply.contains_key(ERROR_KEY));
    }

    #[tokio::test]
    async fn test_unregistered_method_answers_method_not_found() {
        // ---
        let (inbound, rx) = with_reply(request("missing", 11, b"null"));

        assert_eq!(echo_dispatcher().dispatch(inbound).await, Disposition::Replied);

        let reply = rx.await.unwrap();
        let envelope = ReplyEnvelope::from_dictionary(reply.as_dictionary().unwrap()).unwrap();
        assert_eq!(envelope.id, RequestId::new(11));

        let payload = envelope.outcome.error().expect("error outcome");
        let remote: RemoteError = JsonCodec.decode(&payload).unwrap();
        assert_eq!(remote.kind, RemoteErrorKind::MethodNotFound);
    }

    #[tokio::test]
    async fn test_one_way_request_runs_handler_without_reply() {
        // ---
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = {
            let calls = calls.clone();
            DispatcherBuilder::new()
                .register("bump", move |_: ()| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(()) }
                })
                .build()
                .unwrap()
        };

        let disposition = dispatcher
            .dispatch(Inbound::new(request("bump", 1, b"null")))
            .await;

        assert_eq!(disposition, Disposition::NoReply);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_untagged_request_rejected_channel_kept() {
        // ---
        let mut message = request("echo", 3, b"1");
        message.remove(crate::PROTOCOL_TAG_KEY);

        let channel = Arc::new(FakeChannel::default());
        let (inbound, rx) = with_reply(message);
        let inbound = inbound.with_channel(channel.clone());

        assert_eq!(echo_dispatcher().dispatch(inbound).await, Disposition::Rejected);
        // The exchange is abandoned: the reply context was dropped unanswered.
        assert!(rx.await.is_err());
        assert!(!channel.is_closed());
    }

    #[tokio::test]
    async fn test_wrong_tag_closes_channel_when_configured() {
        // ---
        let dispatcher = DispatcherBuilder::new()
            .rejection_policy(RejectionPolicy::CloseChannel)
            .build()
            .unwrap();

        let mut message = request("echo", 3, b"1");
        message.insert(crate::PROTOCOL_TAG_KEY, "2");
        assert_ne!(DEFAULT_PROTOCOL_TAG, "2");

        let channel = Arc::new(FakeChannel::default());
        let inbound = Inbound::new(message).with_channel(channel.clone());

        assert_eq!(dispatcher.dispatch(inbound).await, Disposition::Rejected);
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn test_non_dictionary_message_rejected() {
        // ---
        let disposition = echo_dispatcher().dispatch(Inbound::new("hello")).await;
        assert_eq!(disposition, Disposition::Rejected);
    }

    #[tokio::test]
    async fn test_transport_event_reaches_hook() {
        // ---
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = {
            let seen = seen.clone();
            DispatcherBuilder::new()
                .on_transport_event(move |event| seen.lock().unwrap().push(event))
                .build()
                .unwrap()
        };

        let disposition = dispatcher
            .dispatch(Inbound::new(ErrorEvent::TerminationImminent))
            .await;

        assert_eq!(disposition, Disposition::TransportEvent);
        assert_eq!(*seen.lock().unwrap(), vec![ErrorEvent::TerminationImminent]);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_error_outcome() {
        // ---
        let dispatcher = DispatcherBuilder::new()
            .register("explode", |_: ()| async {
                if true {
                    panic!("handler exploded");
                }
                Ok::<(), String>(())
            })
            .build()
            .unwrap();

        let (inbound, rx) = with_reply(request("explode", 5, b"null"));
        assert_eq!(dispatcher.dispatch(inbound).await, Disposition::Replied);

        let reply = rx.await.unwrap();
        let envelope = ReplyEnvelope::from_dictionary(reply.as_dictionary().unwrap()).unwrap();
        let remote: RemoteError = JsonCodec
            .decode(&envelope.outcome.error().expect("error outcome"))
            .unwrap();
        assert_eq!(remote.kind, RemoteErrorKind::HandlerFailed);
    }
}
