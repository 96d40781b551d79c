//! Default transport builder.

use crate::client_registry::{
    domain::{ClientRegistryDomainError, ResolvedTransportConfig, ServerDescriptor, ServerId},
    ports::{ClientTransport, TransportBuilder, TransportResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Builds a [`ConfiguredTransport`] for every recognised transport kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransportBuilder;

impl DefaultTransportBuilder {
    /// Creates the default builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportBuilder for DefaultTransportBuilder {
    fn build(
        &self,
        descriptor: &ServerDescriptor,
        config: ResolvedTransportConfig,
    ) -> TransportResult<Arc<dyn ClientTransport>> {
        Ok(Arc::new(ConfiguredTransport::new(descriptor, config)?))
    }
}

/// Transport carrying a validated location and resolved settings.
///
/// The channel itself is opened by the client during `connect`; closing the
/// transport marks it released so it is never reused.
#[derive(Debug)]
pub struct ConfiguredTransport {
    server_id: ServerId,
    location: String,
    config: ResolvedTransportConfig,
    closed: AtomicBool,
}

impl ConfiguredTransport {
    /// Creates a transport for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientRegistryDomainError`] when the location is blank, or
    /// when an SSE endpoint does not start with `http://` or `https://`.
    pub fn new(
        descriptor: &ServerDescriptor,
        config: ResolvedTransportConfig,
    ) -> Result<Self, ClientRegistryDomainError> {
        let location = descriptor.location().unwrap_or_default().trim().to_owned();
        match &config {
            ResolvedTransportConfig::Stdio(_) if location.is_empty() => {
                return Err(ClientRegistryDomainError::EmptyStdioCommand);
            }
            ResolvedTransportConfig::Sse(_) if location.is_empty() => {
                return Err(ClientRegistryDomainError::EmptySseEndpoint);
            }
            ResolvedTransportConfig::Sse(_)
                if !(location.starts_with("http://") || location.starts_with("https://")) =>
            {
                return Err(ClientRegistryDomainError::InvalidSseEndpoint(location));
            }
            ResolvedTransportConfig::Stdio(_) | ResolvedTransportConfig::Sse(_) => {}
        }

        Ok(Self {
            server_id: descriptor.id().clone(),
            location,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns whether the transport has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ClientTransport for ConfiguredTransport {
    fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn config(&self) -> &ResolvedTransportConfig {
        &self.config
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
