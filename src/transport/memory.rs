//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory transport defines the **reference behavior** for the transport
//! layer. Other transport implementations are expected to approximate this
//! behavior as closely as their underlying channel allows and to document any
//! unavoidable deviations.
//!
//! In particular, the in-memory transport establishes the following expectations:
//!
//! - Messages sent before the peer installs its inbound handler are queued
//!   and delivered once it does.
//! - Each inbound event is handled on its own task; events are not ordered
//!   relative to each other.
//! - Cancelling either end invalidates the channel for both: each handler
//!   receives `ErrorEvent::ConnectionInvalid` and every outstanding
//!   `send_with_reply` resolves with that event.
//! - A reply context dropped without being used resolves the waiting sender
//!   with `ErrorEvent::ConnectionInterrupted`.
//!
//! ## Non-Goals
//!
//! This transport does not emulate process boundaries, security checks, or
//! any particular IPC system's failure modes. It exists to provide a clear,
//! deterministic baseline against which the RPC layer can be validated.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    // ---
    log_debug,
    ChannelControl,
    ErrorEvent,
    Inbound,
    InboundHandlerPtr,
    ReplyContext,
    Result,
    RpcError,
    Transport,
    TransportBase,
    TransportPtr,
    Value,
};

type InboxSender = mpsc::UnboundedSender<Inbound>;
type InboxReceiver = mpsc::UnboundedReceiver<Inbound>;

/// Acquire a mutex guard, ignoring poisoning.
///
/// The protected state is a take-once slot; a panic while holding it leaves
/// nothing half-updated.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// State shared by both ends of a channel.
struct Link {
    // ---
    /// Inbox senders indexed by endpoint side.
    inboxes: [InboxSender; 2],

    /// Flips to `true` exactly once, when either side cancels.
    closed: watch::Sender<bool>,
}

impl Link {
    // ---
    fn deliver(&self, side: usize, inbound: Inbound) -> bool {
        // ---
        self.inboxes[side].send(inbound).is_ok()
    }
}

impl ChannelControl for Link {
    fn close(&self) {
        // ---
        let was_closed = self.closed.send_replace(true);
        if was_closed {
            return;
        }

        for side in 0..2 {
            let _ = self.deliver(side, Inbound::new(ErrorEvent::ConnectionInvalid));
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// One end of an in-memory duplex channel.
///
/// Created in connected pairs with [`MemoryTransport::pair`].
pub struct MemoryTransport {
    // ---
    base: TransportBase,
    side: usize,
    link: Arc<Link>,
    inbox: Mutex<Option<InboxReceiver>>,
}

impl MemoryTransport {
    // ---
    /// Create two connected endpoints.
    ///
    /// Messages sent on the first are delivered to the second's inbound
    /// handler and vice versa.
    pub fn pair(
        first_id: impl Into<String>,
        second_id: impl Into<String>,
    ) -> (Arc<MemoryTransport>, Arc<MemoryTransport>) {
        // ---
        let (tx_first, rx_first) = mpsc::unbounded_channel();
        let (tx_second, rx_second) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let link = Arc::new(Link {
            inboxes: [tx_first, tx_second],
            closed,
        });

        let first = MemoryTransport {
            base: TransportBase::new(first_id),
            side: 0,
            link: link.clone(),
            inbox: Mutex::new(Some(rx_first)),
        };
        let second = MemoryTransport {
            base: TransportBase::new(second_id),
            side: 1,
            link,
            inbox: Mutex::new(Some(rx_second)),
        };

        log_debug!(
            "create memory transport pair {} <-> {}",
            first.transport_id(),
            second.transport_id()
        );

        (Arc::new(first), Arc::new(second))
    }

    /// Tell the peer that this side is about to terminate.
    ///
    /// The peer's handler receives `ErrorEvent::TerminationImminent`. The
    /// channel stays usable until one side cancels it.
    pub fn announce_termination(&self) {
        // ---
        log_debug!("{}: announcing termination", self.transport_id());
        let _ = self
            .link
            .deliver(self.peer_side(), Inbound::new(ErrorEvent::TerminationImminent));
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    fn peer_side(&self) -> usize {
        1 - self.side
    }

    fn channel(&self) -> Arc<dyn ChannelControl> {
        self.link.clone()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    /// Deliver a message to the peer without a reply context.
    async fn send(&self, message: Value) -> Result<()> {
        // ---
        if self.link.is_closed() {
            return Err(RpcError::Transport(ErrorEvent::ConnectionInvalid.to_string()));
        }

        let inbound = Inbound::new(message).with_channel(self.channel());
        if !self.link.deliver(self.peer_side(), inbound) {
            return Err(RpcError::Transport(ErrorEvent::ConnectionInvalid.to_string()));
        }
        Ok(())
    }

    /// Deliver a message with a reply context and wait for the answer.
    ///
    /// Resolves with `Value::Error(ConnectionInvalid)` if the channel is or
    /// becomes invalid, and with `Value::Error(ConnectionInterrupted)` if the
    /// peer drops the reply context unanswered.
    async fn send_with_reply(&self, message: Value) -> Result<Value> {
        // ---
        // Subscribe before delivering so a concurrent cancel cannot be missed.
        let mut closed = self.link.closed.subscribe();
        if *closed.borrow() {
            return Ok(Value::Error(ErrorEvent::ConnectionInvalid));
        }

        let (tx, rx) = oneshot::channel();
        let inbound = Inbound::new(message)
            .with_reply_context(ReplyContext::new(tx))
            .with_channel(self.channel());

        if !self.link.deliver(self.peer_side(), inbound) {
            return Ok(Value::Error(ErrorEvent::ConnectionInvalid));
        }

        tokio::select! {
            reply = rx => match reply {
                Ok(value) => Ok(value),
                Err(_) => Ok(Value::Error(ErrorEvent::ConnectionInterrupted)),
            },
            _ = closed.wait_for(|closed| *closed) => {
                Ok(Value::Error(ErrorEvent::ConnectionInvalid))
            }
        }
    }

    /// Start delivering inbound events to `handler`.
    ///
    /// Queued events are delivered first. Each event is handled on its own
    /// task.
    fn set_inbound_handler(&self, handler: InboundHandlerPtr) -> Result<()> {
        // ---
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            RpcError::Runtime("inbound handler requires a tokio runtime".into())
        })?;

        let mut inbox = lock_ignore_poison(&self.inbox).take().ok_or_else(|| {
            RpcError::InvalidConfig(format!(
                "{}: inbound handler already installed",
                self.transport_id()
            ))
        })?;

        let _transport_id = self.transport_id().to_string();
        runtime.spawn(async move {
            log_debug!("{_transport_id}: inbound pump started");

            while let Some(inbound) = inbox.recv().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.handle_event(inbound).await;
                });
            }

            log_debug!("{_transport_id}: inbound pump stopped");
        });

        Ok(())
    }

    /// Invalidate the channel for both ends.
    async fn cancel(&self) -> Result<()> {
        // ---
        log_debug!("{}: cancelling channel", self.transport_id());
        self.link.close();
        Ok(())
    }
}

/// Create two connected in-memory transports behind [`TransportPtr`]s.
pub fn create_memory_transport_pair(
    first_id: impl Into<String>,
    second_id: impl Into<String>,
) -> (TransportPtr, TransportPtr) {
    // ---
    let (first, second) = MemoryTransport::pair(first_id, second_id);
    (first, second)
}
