//! Up-front validation of the descriptor set.

use super::{ClientRegistryError, ClientRegistryResult};
use crate::client_registry::domain::{ServerDescriptor, ServerId};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

/// Indexes descriptors by identifier, rejecting duplicates.
///
/// Only identifiers are inspected; transport types and options are checked
/// lazily when a client is first requested.
pub(super) fn index_descriptors(
    descriptors: impl IntoIterator<Item = ServerDescriptor>,
) -> ClientRegistryResult<BTreeMap<ServerId, Arc<ServerDescriptor>>> {
    let mut indexed = BTreeMap::new();
    for descriptor in descriptors {
        match indexed.entry(descriptor.id().clone()) {
            Entry::Occupied(existing) => {
                return Err(ClientRegistryError::DuplicateServerId(existing.key().clone()));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(descriptor));
            }
        }
    }
    Ok(indexed)
}
