// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the contract the RPC layer consumes from the
//! underlying IPC channel. It intentionally avoids any reference to a
//! concrete channel implementation; the in-memory transport under
//! `src/transport/` is the reference implementation.
//!
//! The transport is responsible only for delivering structured [`Value`]s
//! between two peers and for routing a reply back to the sender of a
//! message. Request/reply correlation, envelope shape and payload encoding
//! are handled by higher layers.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::{
    // ---
    Dictionary,
    Result,
    RpcError,
    Value,
};

/// Shared base state for transport implementations.
///
/// Each concrete transport embeds this as a field named `base` so that the
/// default `Transport` methods can delegate to it.
#[derive(Debug, Clone)]
pub struct TransportBase {
    /// Identifier for this transport instance, used for logging.
    pub transport_id: String,
}

impl TransportBase {
    /// Create a new TransportBase.
    pub fn new(transport_id: impl Into<String>) -> Self {
        // ---
        Self {
            transport_id: transport_id.into(),
        }
    }
}

/// Destination for a single reply.
///
/// Transports implement this for whatever mechanism routes a reply back to
/// the original sender. `deliver` takes the sink by value, so a sink is
/// used at most once.
pub trait ReplySink: Send {
    fn deliver(self: Box<Self>, reply: Value) -> Result<()>;
}

impl ReplySink for oneshot::Sender<Value> {
    fn deliver(self: Box<Self>, reply: Value) -> Result<()> {
        // ---
        (*self)
            .send(reply)
            .map_err(|_| RpcError::Transport("reply receiver dropped".into()))
    }
}

/// Single-use capability to answer an inbound message.
///
/// Obtained from [`Inbound::create_reply_context`]. Sending consumes the
/// context, so a message can be answered at most once. Dropping a context
/// without sending abandons the exchange; transports report that to the
/// waiting sender as [`ErrorEvent::ConnectionInterrupted`](crate::ErrorEvent).
pub struct ReplyContext {
    // ---
    sink: Box<dyn ReplySink>,
}

impl ReplyContext {
    // ---
    pub fn new(sink: impl ReplySink + 'static) -> Self {
        // ---
        Self {
            sink: Box::new(sink),
        }
    }

    /// Send the reply to the original sender.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` if the sender is no longer waiting.
    pub fn send(self, reply: Dictionary) -> Result<()> {
        // ---
        self.sink.deliver(Value::Dictionary(reply))
    }
}

impl fmt::Debug for ReplyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyContext").finish_non_exhaustive()
    }
}

/// Control over the channel an inbound message arrived on.
pub trait ChannelControl: Send + Sync {
    /// Invalidate the channel for both peers.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// A message delivered to an [`InboundHandler`].
///
/// Carries the message value, the reply capability when the sender is
/// waiting for an answer, and a handle to the channel it arrived on.
pub struct Inbound {
    // ---
    message: Value,
    reply: Option<ReplyContext>,
    channel: Option<Arc<dyn ChannelControl>>,
}

impl Inbound {
    // ---
    /// A one-way message: no reply context, no channel handle.
    pub fn new(message: impl Into<Value>) -> Self {
        // ---
        Self {
            message: message.into(),
            reply: None,
            channel: None,
        }
    }

    pub fn with_reply_context(mut self, reply: ReplyContext) -> Self {
        self.reply = Some(reply);
        self
    }

    pub fn with_channel(mut self, channel: Arc<dyn ChannelControl>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn message(&self) -> &Value {
        &self.message
    }

    /// Whether the sender is waiting for a reply.
    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Extract the reply context.
    ///
    /// Only keyed-map messages can be answered. Returns `None` for any other
    /// message kind, for one-way messages, and on every call after the first.
    pub fn create_reply_context(&mut self) -> Option<ReplyContext> {
        // ---
        match self.message {
            Value::Dictionary(_) => self.reply.take(),
            _ => None,
        }
    }

    /// Handle to the channel this message arrived on, if the transport
    /// provides one.
    pub fn channel(&self) -> Option<Arc<dyn ChannelControl>> {
        self.channel.clone()
    }

    pub fn into_message(self) -> Value {
        self.message
    }
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.debug_struct("Inbound")
            .field("message", &self.message)
            .field("expects_reply", &self.reply.is_some())
            .finish()
    }
}

/// Receiver of inbound transport events.
///
/// Installed on a transport with [`Transport::set_inbound_handler`]. Events
/// may be delivered concurrently and in any order.
#[async_trait::async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle_event(&self, inbound: Inbound);
}

#[async_trait::async_trait]
impl<F> InboundHandler for F
where
    F: Fn(Inbound) + Send + Sync + 'static,
{
    async fn handle_event(&self, inbound: Inbound) {
        // ---
        self(inbound)
    }
}

/// Shared inbound handler pointer.
pub type InboundHandlerPtr = Arc<dyn InboundHandler>;

/// Transport abstraction.
///
/// A `Transport` is one end of a duplex channel delivering structured
/// values. It supports fire-and-forget sends, sends that wait for a reply,
/// and an inbound handler for messages initiated by the peer.
///
/// Implementations must ensure that:
/// - A `send_with_reply` whose channel fails before the peer answers
///   resolves with `Value::Error(..)`; it never waits forever on a dead
///   channel.
/// - Messages sent with `send_with_reply` reach the peer's handler with a
///   reply context; messages sent with `send` reach it without one.
/// - No ordering is assumed between independent messages.
///
/// # Notes
///
/// This trait uses `async_trait`; the expanded documentation may show explicit
/// lifetimes and a boxed `Future`. Consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &TransportBase;

    /// Returns the transport_id of the transport.
    ///
    /// Default implementation delegates to `base()`.
    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    /// Send a message without waiting for a reply.
    async fn send(&self, message: Value) -> Result<()>;

    /// Send a message and wait for the peer's reply.
    ///
    /// Channel failures while waiting are reported in-band as
    /// `Ok(Value::Error(..))`. `Err` is reserved for failures to hand the
    /// message to the channel at all.
    async fn send_with_reply(&self, message: Value) -> Result<Value>;

    /// Install the handler that receives messages initiated by the peer.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` if a handler is already installed.
    fn set_inbound_handler(&self, handler: InboundHandlerPtr) -> Result<()>;

    /// Invalidate the channel and release any associated resources.
    async fn cancel(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// This is an `Arc<dyn Transport>`, which means:
/// - `.clone()` is cheap (only increments a reference count)
/// - Multiple clones share the same underlying channel
pub type TransportPtr = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_reply_context_only_for_dictionaries() {
        // ---
        let (tx, _rx) = oneshot::channel();
        let mut inbound = Inbound::new("hello").with_reply_context(ReplyContext::new(tx));

        assert!(inbound.expects_reply());
        assert!(inbound.create_reply_context().is_none());
    }

    #[test]
    fn test_reply_context_is_taken_once() {
        // ---
        let (tx, mut rx) = oneshot::channel();
        let mut inbound =
            Inbound::new(Dictionary::new()).with_reply_context(ReplyContext::new(tx));

        let ctx = inbound.create_reply_context().expect("reply context");
        assert!(inbound.create_reply_context().is_none());

        let mut reply = Dictionary::new();
        reply.insert("reply", "hi");
        ctx.send(reply.clone()).expect("send reply");

        assert_eq!(rx.try_recv().expect("reply delivered"), Value::from(reply));
    }

    #[test]
    fn test_reply_to_departed_sender_fails() {
        // ---
        let (tx, rx) = oneshot::channel::<Value>();
        drop(rx);

        let err = ReplyContext::new(tx).send(Dictionary::new()).unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
