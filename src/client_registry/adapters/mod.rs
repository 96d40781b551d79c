//! Adapter implementations for the client registry ports.

pub mod memory;

mod transport;

pub use memory::{InMemoryClientBuilder, InMemoryMcpClient};
pub use transport::{ConfiguredTransport, DefaultTransportBuilder};
