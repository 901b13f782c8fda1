//! Provider adapters: contract, registry and authenticated calls

pub mod auth;
pub mod ports;
pub mod registry;

pub use auth::{call_with_auth_retry, CallFailure};
pub use ports::{EventPage, ExternalEvent, ProviderAdapter};
pub use registry::ProviderRegistry;
