//! Dispatcher builder.
//!
//! Handlers are registered here and nowhere else; `build()` freezes the
//! handler table into the resulting [`Dispatcher`].

use std::collections::hash_map::Entry;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::server::{HandlerTable, RawHandler, TransportEventHook, TypedHandler};
use crate::{
    // ---
    Dispatcher,
    ErrorEvent,
    JsonCodec,
    MethodHandler,
    Outcome,
    PayloadCodec,
    RejectionPolicy,
    Result,
    RpcConfig,
    RpcError,
};

/// Builder for creating [`Dispatcher`] instances.
///
/// # Example
///
/// ```no_run
/// use ipc_rpc::{DispatcherBuilder, MemoryTransport, TransportPtr};
///
/// # fn example() -> ipc_rpc::Result<()> {
/// let (_client_end, server_end) = MemoryTransport::pair("client", "server");
/// let transport: TransportPtr = server_end;
///
/// let dispatcher = DispatcherBuilder::new()
///     .register("echo", |text: String| async move { Ok::<_, String>(text) })
///     .register("math/add", |(a, b): (i64, i64)| async move {
///         a.checked_add(b).ok_or_else(|| "overflow".to_string())
///     })
///     .build()?;
///
/// dispatcher.attach(&transport)?;
/// # Ok(())
/// # }
/// ```
pub struct DispatcherBuilder<C: PayloadCodec = JsonCodec> {
    // ---
    codec: C,
    config: RpcConfig,
    handlers: HandlerTable,
    on_transport_event: Option<TransportEventHook>,

    // First registration problem, reported by build().
    problem: Option<String>,
}

impl DispatcherBuilder<JsonCodec> {
    /// Create a builder using the JSON payload codec.
    pub fn new() -> Self {
        // ---
        Self::with_codec(JsonCodec)
    }
}

impl Default for DispatcherBuilder<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PayloadCodec> DispatcherBuilder<C> {
    // ---
    /// Create a builder using `codec` for params and results.
    pub fn with_codec(codec: C) -> Self {
        // ---
        Self {
            codec,
            config: RpcConfig::default(),
            handlers: HandlerTable::new(),
            on_transport_event: None,
            problem: None,
        }
    }

    /// Replace the whole configuration.
    ///
    /// The dispatcher uses the protocol tag and rejection policy; the
    /// request timeout only matters to clients.
    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Protocol tag inbound requests must carry.
    ///
    /// Default: `"1"`.
    pub fn protocol_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.config.protocol_tag = tag.into();
        self
    }

    /// What to do with malformed or untagged messages.
    ///
    /// Default: [`RejectionPolicy::DropMessage`].
    pub fn rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.config.rejection_policy = policy;
        self
    }

    /// Observe transport error events, which never reach method dispatch.
    pub fn on_transport_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(ErrorEvent) + Send + Sync + 'static,
    {
        self.on_transport_event = Some(Arc::new(hook));
        self
    }

    /// Register a typed handler for `method`.
    ///
    /// Params are decoded into `P`; `Ok(R)` becomes a success outcome and
    /// `Err(E)` an error outcome, both encoded with the builder's codec.
    /// Params that do not decode are answered with an `InvalidParams`
    /// [`RemoteError`](crate::RemoteError).
    pub fn register<P, R, E, F, Fut>(self, method: impl Into<String>, handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        // ---
        let handler = TypedHandler {
            codec: self.codec.clone(),
            func: handler,
            _phantom: PhantomData,
        };
        self.register_handler(method, Arc::new(handler))
    }

    /// Register a handler over encoded bytes for `method`.
    pub fn register_raw<F, Fut>(self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<Bytes, Bytes>> + Send + 'static,
    {
        // ---
        self.register_handler(method, Arc::new(RawHandler { func: handler }))
    }

    /// Register an already type-erased handler for `method`.
    pub fn register_handler(
        mut self,
        method: impl Into<String>,
        handler: Arc<dyn MethodHandler>,
    ) -> Self {
        // ---
        let method = method.into();

        if method.is_empty() {
            self.problem
                .get_or_insert_with(|| "method name must not be empty".into());
            return self;
        }

        match self.handlers.entry(method) {
            Entry::Occupied(entry) => {
                let method = entry.key().clone();
                self.problem
                    .get_or_insert_with(|| format!("method '{method}' registered twice"));
            }
            Entry::Vacant(entry) => {
                entry.insert(handler);
            }
        }
        self
    }

    /// Build the dispatcher (consumes self).
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` for an empty or duplicate method
    /// name, or an invalid configuration.
    pub fn build(self) -> Result<Dispatcher<C>> {
        // ---
        if let Some(problem) = self.problem {
            return Err(RpcError::InvalidConfig(problem));
        }
        self.config.validate()?;

        crate::log_debug!(
            "building dispatcher with {} method(s) (codec={})",
            self.handlers.len(),
            self.codec.name()
        );

        Ok(Dispatcher::new(
            self.handlers,
            self.codec,
            self.config,
            self.on_transport_event,
        ))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    async fn echo(text: String) -> std::result::Result<String, String> {
        Ok(text)
    }

    #[test]
    fn test_build_registers_methods() {
        // ---
        let dispatcher = DispatcherBuilder::new()
            .register("echo", echo)
            .register_raw("raw", |params: Bytes| async move { Outcome::Success(params) })
            .build()
            .unwrap();

        let mut methods: Vec<_> = dispatcher.methods().collect();
        methods.sort_unstable();
        assert_eq!(methods, vec!["echo", "raw"]);
        assert!(dispatcher.has_method("echo"));
        assert!(!dispatcher.has_method("missing"));
    }

    #[test]
    fn test_duplicate_method_rejected() {
        // ---
        let err = DispatcherBuilder::new()
            .register("echo", echo)
            .register("echo", echo)
            .build()
            .err()
            .expect("duplicate registration must fail");

        assert_eq!(
            err,
            RpcError::InvalidConfig("method 'echo' registered twice".into())
        );
    }

    #[test]
    fn test_empty_method_rejected() {
        // ---
        let err = DispatcherBuilder::new()
            .register("", echo)
            .build()
            .err()
            .expect("empty method must fail");
        assert!(matches!(err, RpcError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_protocol_tag_rejected() {
        // ---
        let err = DispatcherBuilder::new()
            .protocol_tag("")
            .build()
            .err()
            .expect("empty tag must fail");
        assert!(matches!(err, RpcError::InvalidConfig(_)));
    }
}
