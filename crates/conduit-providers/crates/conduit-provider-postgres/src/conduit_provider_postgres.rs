//! PostgreSQL provider implementation

mod provider;
mod session;
mod tls;
mod values;

pub use provider::PostgresProvider;
pub use session::PostgresSession;
pub use tls::build_tls_connector;

#[cfg(test)]
mod provider_tests;
