//! Transport construction port.

use crate::client_registry::domain::{
    ClientRegistryDomainError, ResolvedTransportConfig, ServerDescriptor, ServerId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A configured communication channel to one MCP server.
///
/// Process spawning and stream handling belong to the implementation; the
/// registry only builds, hands out and releases transports.
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// Returns the identifier of the server this transport reaches.
    fn server_id(&self) -> &ServerId;

    /// Returns the executable path or endpoint URL.
    fn location(&self) -> &str;

    /// Returns the typed settings the transport was built with.
    fn config(&self) -> &ResolvedTransportConfig;

    /// Releases the channel. Calling this more than once must be harmless.
    async fn close(&self) -> TransportResult<()>;
}

/// Builds transports from descriptors and resolved settings.
pub trait TransportBuilder: Send + Sync {
    /// Builds a transport for `descriptor` using `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the descriptor location is invalid for
    /// the transport or the transport cannot be created.
    fn build(
        &self,
        descriptor: &ServerDescriptor,
        config: ResolvedTransportConfig,
    ) -> TransportResult<Arc<dyn ClientTransport>>;
}

/// Errors returned by transport adapters.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The descriptor does not describe a usable transport.
    #[error(transparent)]
    Invalid(#[from] ClientRegistryDomainError),

    /// Generic transport failure.
    #[error("MCP transport error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps a runtime error from the transport adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
