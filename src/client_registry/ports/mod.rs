//! Port contracts for the collaborators the registry depends on.

mod client;
mod transport;

pub use client::{ClientBuilder, McpClient, McpClientError, McpClientResult};
pub use transport::{ClientTransport, TransportBuilder, TransportError, TransportResult};
