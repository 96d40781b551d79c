//! Registry of long-lived MCP client connections.
//!
//! A fixed set of server descriptors is declared up front. Each descriptor
//! names a transport (a local process over STDIO, or an HTTP event stream)
//! and a bag of string options. Clients are created lazily on first request,
//! connected once, and shared by every later caller. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The registry service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
