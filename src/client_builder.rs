//! RPC client builder.
//!
//! Provides a fluent builder API for configuring [`RpcClient`] instances
//! with timeout, protocol tag and runtime settings.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::{
    // ---
    JsonCodec,
    PayloadCodec,
    Result,
    RpcClient,
    RpcConfig,
    TransportPtr,
};

/// Builder for creating RPC client instances.
///
/// # Example
///
/// ```no_run
/// use ipc_rpc::{ClientBuilder, MemoryTransport, TransportPtr};
/// use std::time::Duration;
///
/// # async fn example() -> ipc_rpc::Result<()> {
/// let (client_end, _server_end) = MemoryTransport::pair("client", "server");
/// let transport: TransportPtr = client_end;
///
/// let client = ClientBuilder::new(transport)
///     .request_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<C: PayloadCodec = JsonCodec> {
    // ---
    transport: TransportPtr,
    codec: C,
    config: RpcConfig,
    runtime: Option<Handle>,
}

impl ClientBuilder<JsonCodec> {
    /// Create a builder using the JSON payload codec.
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        Self::with_codec(transport, JsonCodec)
    }
}

impl<C: PayloadCodec> ClientBuilder<C> {
    // ---
    /// Create a builder using `codec` for params and results.
    ///
    /// The peer's dispatcher must use the same codec.
    pub fn with_codec(transport: TransportPtr, codec: C) -> Self {
        // ---
        Self {
            transport,
            codec,
            config: RpcConfig::default(),
            runtime: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the per-call reply timeout.
    ///
    /// Default: 30s.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Wait for replies without a time limit.
    pub fn no_request_timeout(mut self) -> Self {
        self.config.request_timeout = None;
        self
    }

    pub fn protocol_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.config.protocol_tag = tag.into();
        self
    }

    /// Runtime used by [`RpcClient::call_blocking`].
    ///
    /// Default: the runtime `build()` is called from, if any.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the RPC client (consumes self).
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` if the configuration is invalid.
    pub fn build(self) -> Result<RpcClient<C>> {
        // ---
        self.config.validate()?;

        let runtime = self.runtime.or_else(|| Handle::try_current().ok());

        crate::log_debug!(
            "building client on {} (codec={}, timeout={:?})",
            self.transport.transport_id(),
            self.codec.name(),
            self.config.request_timeout
        );

        Ok(RpcClient::new(
            self.transport,
            self.codec,
            self.config,
            runtime,
        ))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{MemoryTransport, RpcError};

    fn transport() -> TransportPtr {
        MemoryTransport::pair("client", "server").0
    }

    #[test]
    fn test_build_defaults() {
        // ---
        let client = ClientBuilder::new(transport()).build().unwrap();

        assert_eq!(client.config().request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(&*client.config().protocol_tag, "1");
        assert_eq!(client.next_id().as_u64(), 0);
        assert_eq!(client.transport().transport_id(), "client");
    }

    #[test]
    fn test_invalid_config_rejected() {
        // ---
        let err = ClientBuilder::new(transport())
            .protocol_tag("")
            .build()
            .err()
            .expect("empty tag must be rejected");
        assert!(matches!(err, RpcError::InvalidConfig(_)));

        let err = ClientBuilder::new(transport())
            .request_timeout(Duration::ZERO)
            .build()
            .err()
            .expect("zero timeout must be rejected");
        assert!(matches!(err, RpcError::InvalidConfig(_)));
    }

    #[test]
    fn test_blocking_without_runtime_fails() {
        // ---
        let client = ClientBuilder::new(transport()).build().unwrap();
        let err = client
            .call_blocking::<_, String, String>("echo", "hi")
            .unwrap_err();
        assert!(matches!(err, RpcError::Runtime(_)));
    }
}
