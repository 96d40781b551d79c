//! Domain model for the MCP client registry.
//!
//! Server descriptors, transport kinds, typed transport settings and the
//! observable connection state live here. Nothing in this module performs
//! I/O.

mod config;
mod descriptor;
mod error;
mod ids;
pub mod options;
mod state;
mod transport;

pub use config::RegistryConfig;
pub use descriptor::{ClientIdentity, ServerDescriptor};
pub use error::{
    ClientRegistryDomainError, OptionFormatError, RegistryConfigError,
    UnsupportedTransportTypeError,
};
pub use ids::ServerId;
pub use options::{ResolvedTransportConfig, SseTransportOptions, StdioTransportOptions};
pub use state::ConnectionState;
pub use transport::TransportKind;
