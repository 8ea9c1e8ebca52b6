//! MySQL and MariaDB provider implementation
//!
//! Both kinds speak the same wire protocol; one provider type serves either,
//! parameterized by the kind it was constructed for.

mod provider;
mod session;
mod tls;

pub use provider::MySqlProvider;
pub use session::MySqlSession;
pub use tls::ssl_opts_for;

#[cfg(test)]
mod provider_tests;
