//! MS SQL Server provider for Conduit
//!
//! Talks TDS through `tiberius` over a tokio TCP stream. One client per
//! connection; scripts hold the client for their whole run so `USE` sticks.

mod provider;
mod session;
mod values;

#[cfg(test)]
mod provider_tests;

pub use provider::MssqlProvider;
pub use session::MssqlSession;
