//! Elasticsearch provider for Conduit
//!
//! Commands are a small REST vocabulary (`indices`, `search <index> [json]`,
//! ...) translated into HTTP requests against the cluster.

mod provider;
mod request;
mod session;

#[cfg(test)]
mod provider_tests;

pub use provider::ElasticsearchProvider;
pub use request::{COMMANDS, RequestPlan, plan_request};
pub use session::ElasticsearchSession;
