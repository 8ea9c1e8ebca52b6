//! Conduit Connection - the connection broker
//!
//! Ties saved configurations, the secret store, the provider registry and
//! the SSH tunnel manager together behind [`ConnectionRegistry`]:
//!
//! - `SecretStore` - keychain-backed credential storage, plus an in-memory backend
//! - `ConfigStore` - JSON persistence of connections, groups and metadata
//! - `validate_config` - per-kind shape rules checked before any I/O
//! - `QueryHistory` - bounded execution history usable as a `QueryLogger`
//! - Export/import of saved connections

mod export;
mod groups;
mod history;
mod registry;
mod secret_store;
mod store;
mod validation;

pub use export::*;
pub use groups::*;
pub use history::*;
pub use registry::*;
pub use secret_store::*;
pub use store::*;
pub use validation::*;

pub use conduit_core::{ConnectionStatus, ConnectionUpdate};
