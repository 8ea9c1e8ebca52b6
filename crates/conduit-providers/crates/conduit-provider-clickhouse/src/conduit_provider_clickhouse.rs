//! ClickHouse provider for Conduit
//!
//! Uses the HTTP interface. Row-returning statements are fetched as
//! `JSONCompactEachRowWithNamesAndTypes` so column order and types survive
//! even when no rows come back.

mod format;
mod provider;
mod session;

#[cfg(test)]
mod provider_tests;

pub use format::parse_compact_rows;
pub use provider::ClickHouseProvider;
pub use session::ClickHouseSession;
