//! Static MCP server descriptors.

use super::{ServerId, TransportKind, UnsupportedTransportTypeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static declaration of one MCP server and how to reach it.
///
/// The transport type is kept as the raw tag so that a descriptor with an
/// unrecognised tag can still be registered; it only fails when a client is
/// requested for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    id: ServerId,
    name: String,
    transport_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    transport_options: BTreeMap<String, String>,
}

impl ServerDescriptor {
    /// Creates a descriptor with no location and no transport options.
    #[must_use]
    pub fn new(id: ServerId, name: impl Into<String>, transport_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            transport_type: transport_type.into(),
            location: None,
            transport_options: BTreeMap::new(),
        }
    }

    /// Sets the transport location (executable path or endpoint URL).
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Adds or replaces a single transport option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport_options.insert(key.into(), value.into());
        self
    }

    /// Replaces the transport option bag.
    #[must_use]
    pub fn with_options(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.transport_options = values.into_iter().collect();
        self
    }

    /// Returns the server identifier.
    #[must_use]
    pub const fn id(&self) -> &ServerId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw transport type tag.
    #[must_use]
    pub fn transport_type(&self) -> &str {
        &self.transport_type
    }

    /// Parses the transport type tag.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedTransportTypeError`] when the tag is not one of
    /// the recognised transport kinds.
    pub fn transport_kind(&self) -> Result<TransportKind, UnsupportedTransportTypeError> {
        TransportKind::try_from(self.transport_type.as_str())
    }

    /// Returns the transport location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns the free-form transport options.
    #[must_use]
    pub const fn transport_options(&self) -> &BTreeMap<String, String> {
        &self.transport_options
    }
}

/// Client metadata announced to every server during initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
    name: String,
    version: String,
}

impl ClientIdentity {
    /// Creates a client identity.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Returns the client name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the client version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}
