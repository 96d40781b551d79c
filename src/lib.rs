//! Lazily connected, shared MCP client connections.
//!
//! This crate maps statically declared MCP server descriptors to long-lived
//! protocol clients, one per descriptor, reused across callers.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Descriptors, transport settings and option coercion
//! - **Ports**: Trait interfaces for transport and client construction
//! - **Adapters**: Default transport builder and an in-memory client
//! - **Services**: The registry and its connection cache
//!
//! # Modules
//!
//! - [`client_registry`]: Descriptor validation, option coercion, client
//!   caching and teardown

pub mod client_registry;
