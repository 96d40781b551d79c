//! Error types for client registry domain validation and option parsing.

use std::sync::Arc;
use thiserror::Error;

/// Errors returned while constructing client registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientRegistryDomainError {
    /// The server identifier is empty after trimming.
    #[error("MCP server identifier must not be empty")]
    EmptyServerId,

    /// The STDIO command is empty.
    #[error("STDIO command must not be empty")]
    EmptyStdioCommand,

    /// The SSE endpoint is empty.
    #[error("SSE endpoint must not be empty")]
    EmptySseEndpoint,

    /// The SSE endpoint does not have an `http://` or `https://` prefix.
    #[error("SSE endpoint '{0}' must start with 'http://' or 'https://'")]
    InvalidSseEndpoint(String),
}

/// A transport option value could not be coerced into its expected type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value '{value}' for transport option '{key}': {reason}")]
pub struct OptionFormatError {
    key: String,
    value: String,
    reason: String,
}

impl OptionFormatError {
    /// Creates a format error for the named option key.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Returns the option key that failed to parse.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the raw value supplied for the key.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the parse failure reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Error returned when a transport type tag is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported MCP transport type: '{0}'")]
pub struct UnsupportedTransportTypeError(pub String);

/// Error returned while loading a registry configuration document.
#[derive(Debug, Clone, Error)]
#[error("invalid MCP client registry configuration: {0}")]
pub struct RegistryConfigError(Arc<serde_json::Error>);

impl From<serde_json::Error> for RegistryConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self(Arc::new(err))
    }
}
