//! MCP transport kind tags.

use super::UnsupportedTransportTypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport mechanisms the registry knows how to configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// MCP over the standard streams of a spawned local process.
    Stdio,
    /// MCP over an HTTP server-sent-event stream.
    Sse,
}

impl TransportKind {
    /// Returns the canonical transport type tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Tags are compared exactly; no trimming or case folding is applied.
impl TryFrom<&str> for TransportKind {
    type Error = UnsupportedTransportTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "stdio" => Ok(Self::Stdio),
            "sse" => Ok(Self::Sse),
            _ => Err(UnsupportedTransportTypeError(value.to_owned())),
        }
    }
}
