//! relay-core: framework-agnostic core types for the relay job service.

pub mod config;
pub mod errors;
pub mod tenant;

pub use config::{RelayConfig, RelayConfigSnapshot};
pub use errors::{ErrorKind, RelayError};
pub use tenant::{TenantContext, TenantId};
