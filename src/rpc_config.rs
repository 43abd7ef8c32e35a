//! Public, transport-agnostic RPC configuration.
//!
//! This type intentionally contains no transport-specific concepts. It is
//! shared by [`ClientBuilder`](crate::ClientBuilder) and
//! [`DispatcherBuilder`](crate::DispatcherBuilder).

use std::sync::Arc;
use std::time::Duration;

use crate::{Result, RpcError, DEFAULT_PROTOCOL_TAG};

/// What the dispatcher does with an inbound message that is not a
/// well-formed, tagged RPC request.
///
/// The offending exchange is always abandoned: the message is not
/// dispatched and no reply is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectionPolicy {
    /// Drop the message and keep the channel open for further traffic.
    #[default]
    DropMessage,

    /// Drop the message and invalidate the channel it arrived on.
    CloseChannel,
}

/// RPC configuration.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// How long a call waits for its reply.
    ///
    /// `None` waits until the reply arrives or the transport reports a
    /// failure, however long that takes.
    ///
    /// Default: 30 seconds
    pub request_timeout: Option<Duration>,

    /// Value written under the protocol tag key of every request, and the
    /// value the dispatcher requires on inbound requests.
    ///
    /// Default: `"1"`
    pub protocol_tag: Arc<str>,

    /// Dispatcher handling of malformed or untagged inbound messages.
    ///
    /// Default: [`RejectionPolicy::DropMessage`]
    pub rejection_policy: RejectionPolicy,
}

impl Default for RpcConfig {
    fn default() -> Self {
        // ---
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            protocol_tag: Arc::from(DEFAULT_PROTOCOL_TAG),
            rejection_policy: RejectionPolicy::DropMessage,
        }
    }
}

impl RpcConfig {
    /// Set the per-call reply timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use ipc_rpc::RpcConfig;
    /// use std::time::Duration;
    ///
    /// let config = RpcConfig::default().with_request_timeout(Duration::from_secs(5));
    /// assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Wait for replies without a time limit.
    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    pub fn with_protocol_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.protocol_tag = tag.into();
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    /// Check the configuration for values no peer could work with.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` for an empty protocol tag or a zero
    /// request timeout.
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.protocol_tag.is_empty() {
            return Err(RpcError::InvalidConfig(
                "protocol tag must not be empty".into(),
            ));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(RpcError::InvalidConfig(
                "request timeout must be non-zero; use without_request_timeout() to disable it"
                    .into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_defaults() {
        // ---
        let config = RpcConfig::default();
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(&*config.protocol_tag, "1");
        assert_eq!(config.rejection_policy, RejectionPolicy::DropMessage);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        // ---
        let empty_tag = RpcConfig::default().with_protocol_tag("");
        assert!(matches!(empty_tag.validate(), Err(RpcError::InvalidConfig(_))));

        let zero_timeout = RpcConfig::default().with_request_timeout(Duration::ZERO);
        assert!(matches!(
            zero_timeout.validate(),
            Err(RpcError::InvalidConfig(_))
        ));

        assert!(RpcConfig::default()
            .without_request_timeout()
            .validate()
            .is_ok());
    }
}
