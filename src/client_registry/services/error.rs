//! Service-level errors for the client registry.

use crate::client_registry::{
    domain::{OptionFormatError, RegistryConfigError, ServerId},
    ports::{McpClientError, TransportError},
};
use thiserror::Error;

/// Result type for registry operations.
pub type ClientRegistryResult<T> = Result<T, ClientRegistryError>;

/// Broad classification of [`ClientRegistryError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRegistryErrorKind {
    /// The caller supplied an invalid descriptor set or identifier.
    Configuration,
    /// A transport option value could not be parsed.
    Format,
    /// Building, connecting or running a collaborator failed.
    Connection,
    /// The registry is closed, was shut down, or the caller stopped waiting.
    Lifecycle,
}

/// Errors returned by [`ClientRegistry`](super::ClientRegistry).
///
/// Every waiter of a shared connect attempt receives a clone of the same
/// error, so collaborator failures are stored behind `Arc`.
#[derive(Debug, Clone, Error)]
pub enum ClientRegistryError {
    /// Two descriptors share an identifier.
    #[error("duplicate MCP server identifier: {0}")]
    DuplicateServerId(ServerId),

    /// No descriptor is registered under the requested identifier.
    #[error("MCP server '{0}' is not registered")]
    ServerNotFound(String),

    /// A descriptor names a transport type the registry does not support.
    #[error("MCP server {server_id} uses unsupported transport type '{transport_type}'")]
    UnsupportedTransportType {
        /// Server identifier.
        server_id: ServerId,
        /// Raw transport type tag.
        transport_type: String,
    },

    /// A transport option could not be coerced into its expected type.
    #[error("invalid transport options for MCP server {server_id}: {source}")]
    InvalidOption {
        /// Server identifier.
        server_id: ServerId,
        /// Option parse failure.
        source: OptionFormatError,
    },

    /// The transport builder rejected the descriptor.
    #[error("failed to build transport for MCP server {server_id}: {source}")]
    Transport {
        /// Server identifier.
        server_id: ServerId,
        /// Transport failure.
        source: TransportError,
    },

    /// The client could not be built or connected.
    #[error("failed to connect MCP server {server_id}: {source}")]
    Client {
        /// Server identifier.
        server_id: ServerId,
        /// Client failure.
        source: McpClientError,
    },

    /// The task running a shared connect attempt ended abnormally.
    #[error("connect attempt for MCP server {server_id} was aborted: {reason}")]
    AttemptAborted {
        /// Server identifier.
        server_id: ServerId,
        /// Task failure description.
        reason: String,
    },

    /// The caller's cancellation token fired while waiting for a client.
    #[error("acquiring MCP server {0} was cancelled")]
    Cancelled(ServerId),

    /// The registry has been shut down.
    #[error("MCP client registry is closed")]
    Closed,

    /// One or more clients or transports failed to release during shutdown.
    #[error("{} MCP client resource(s) failed to release during shutdown", .0.len())]
    Shutdown(Vec<ReleaseFailure>),

    /// The registry configuration document is invalid.
    #[error(transparent)]
    Config(#[from] RegistryConfigError),
}

impl ClientRegistryError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ClientRegistryErrorKind {
        match self {
            Self::DuplicateServerId(_)
            | Self::ServerNotFound(_)
            | Self::UnsupportedTransportType { .. }
            | Self::Transport {
                source: TransportError::Invalid(_),
                ..
            }
            | Self::Config(_) => ClientRegistryErrorKind::Configuration,
            Self::InvalidOption { .. } => ClientRegistryErrorKind::Format,
            Self::Transport { .. } | Self::Client { .. } | Self::AttemptAborted { .. } => {
                ClientRegistryErrorKind::Connection
            }
            Self::Cancelled(_) | Self::Closed | Self::Shutdown(_) => {
                ClientRegistryErrorKind::Lifecycle
            }
        }
    }
}

/// A client or transport that failed to release during shutdown.
#[derive(Debug, Clone, Error)]
pub enum ReleaseFailure {
    /// Closing the client failed.
    #[error("closing client for MCP server {server_id} failed: {source}")]
    Client {
        /// Server identifier.
        server_id: ServerId,
        /// Client failure.
        source: McpClientError,
    },

    /// Closing the transport failed.
    #[error("closing transport for MCP server {server_id} failed: {source}")]
    Transport {
        /// Server identifier.
        server_id: ServerId,
        /// Transport failure.
        source: TransportError,
    },
}

impl ReleaseFailure {
    /// Returns the server whose resource failed to release.
    #[must_use]
    pub const fn server_id(&self) -> &ServerId {
        match self {
            Self::Client { server_id, .. } | Self::Transport { server_id, .. } => server_id,
        }
    }
}
