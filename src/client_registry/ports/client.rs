//! Client construction port.

use super::ClientTransport;
use crate::client_registry::domain::{ClientIdentity, ServerDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for MCP client operations.
pub type McpClientResult<T> = Result<T, McpClientError>;

/// A logical connection to one MCP server.
///
/// The handshake performed by `connect` and the protocol spoken afterwards
/// belong to the implementation.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Opens the transport and completes protocol initialisation.
    ///
    /// Implementations should return [`McpClientError::Cancelled`] promptly
    /// once `cancellation` fires.
    async fn connect(&self, cancellation: CancellationToken) -> McpClientResult<()>;

    /// Ends the session and releases client resources.
    async fn close(&self) -> McpClientResult<()>;
}

/// Builds clients bound to a transport and the registry's identity.
pub trait ClientBuilder: Send + Sync + 'static {
    /// Concrete client type produced by this builder.
    type Client: McpClient + 'static;

    /// Builds an unconnected client.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError`] when the client cannot be created.
    fn build(
        &self,
        descriptor: &ServerDescriptor,
        transport: Arc<dyn ClientTransport>,
        identity: &ClientIdentity,
    ) -> McpClientResult<Self::Client>;
}

/// Errors returned by MCP client adapters.
#[derive(Debug, Clone, Error)]
pub enum McpClientError {
    /// The operation was cancelled before it completed.
    #[error("MCP client operation was cancelled")]
    Cancelled,

    /// Generic client failure.
    #[error("MCP client error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl McpClientError {
    /// Wraps a runtime error from the client adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
