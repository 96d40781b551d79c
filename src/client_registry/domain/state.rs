//! Observable connection state of a registered server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of one descriptor as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ConnectionState {
    /// No client has been requested yet, or the last attempt failed.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// A client is connected and cached.
    Connected {
        /// When the connect attempt completed.
        since: DateTime<Utc>,
    },
}

impl ConnectionState {
    /// Returns the canonical state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected { .. } => "connected",
        }
    }

    /// Returns whether a client is cached for the descriptor.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
