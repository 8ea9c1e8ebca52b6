//! Neo4j provider for Conduit
//!
//! Speaks the HTTP transactional endpoint (`/db/<name>/tx/commit`). Every
//! script is committed as one transaction; rows from all statements are
//! flattened into one record list and nodes/relationships are extracted for
//! graph rendering.

mod provider;
mod session;
mod transaction;

#[cfg(test)]
mod provider_tests;

pub use provider::Neo4jProvider;
pub use session::Neo4jSession;
pub use transaction::{CommitRequest, CommitResponse, into_graph_result};
