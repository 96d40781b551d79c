//! Registry service: validated descriptors, keyed connection cache and
//! coordinated teardown.

mod cache;
mod error;
mod registry;
mod selector;
mod validation;

pub use error::{
    ClientRegistryError, ClientRegistryErrorKind, ClientRegistryResult, ReleaseFailure,
};
pub use registry::{ClientRegistry, ClientRegistryBuilder};
pub use selector::build_transport;
