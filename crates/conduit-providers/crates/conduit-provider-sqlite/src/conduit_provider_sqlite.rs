//! SQLite provider implementation

mod provider;
mod session;

pub use provider::SqliteProvider;
pub use session::SqliteSession;

#[cfg(test)]
mod provider_tests;
