//! Serialisable registry configuration document.

use super::{ClientIdentity, RegistryConfigError, ServerDescriptor};
use serde::{Deserialize, Serialize};

/// Declarative registry configuration: the client identity plus every
/// server descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Identity announced to every server.
    pub client_info: ClientIdentity,
    /// Declared servers. Identifier uniqueness is checked when a registry is
    /// built, not here.
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
}

impl RegistryConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError`] when the document is malformed or a
    /// server identifier is blank.
    pub fn from_json(document: &str) -> Result<Self, RegistryConfigError> {
        Ok(serde_json::from_str(document)?)
    }
}
