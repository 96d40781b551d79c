//! Transport selection for a descriptor.

use super::{ClientRegistryError, ClientRegistryResult};
use crate::client_registry::{
    domain::{ResolvedTransportConfig, ServerDescriptor},
    ports::{ClientTransport, TransportBuilder},
};
use std::sync::Arc;

/// Builds the transport a descriptor asks for.
///
/// The transport type is checked first, then the option bag is resolved for
/// that kind, then `builder` constructs the transport. Nothing is connected.
///
/// # Errors
///
/// Returns [`ClientRegistryError::UnsupportedTransportType`] for unknown
/// transport tags, [`ClientRegistryError::InvalidOption`] for malformed
/// option values and [`ClientRegistryError::Transport`] when the builder
/// fails.
pub fn build_transport<T>(
    descriptor: &ServerDescriptor,
    builder: &T,
) -> ClientRegistryResult<Arc<dyn ClientTransport>>
where
    T: TransportBuilder + ?Sized,
{
    let server_id = descriptor.id();
    let kind = descriptor.transport_kind().map_err(|err| {
        ClientRegistryError::UnsupportedTransportType {
            server_id: server_id.clone(),
            transport_type: err.0,
        }
    })?;

    let config = ResolvedTransportConfig::resolve(kind, descriptor.transport_options()).map_err(
        |source| ClientRegistryError::InvalidOption {
            server_id: server_id.clone(),
            source,
        },
    )?;

    builder
        .build(descriptor, config)
        .map_err(|source| ClientRegistryError::Transport {
            server_id: server_id.clone(),
            source,
        })
}
