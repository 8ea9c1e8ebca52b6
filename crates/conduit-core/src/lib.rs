//! Conduit Core - Core abstractions for the multi-protocol connection broker
//!
//! This crate provides the fundamental types and traits that every other
//! Conduit crate depends on. It defines:
//!
//! - `ConnectionProvider` - The uniform contract each protocol implements
//! - `ConnectionConfig` / `Credential` - Routing data kept apart from secrets
//! - `ExecOutput`, `QueryResult`, `MetadataNode` - Result shapes handed to callers
//! - Script splitters for SQL, Mongo shell and Cypher text
//! - `QueryLogger` - Capability for recording execution history

mod command;
mod config;
mod credential;
pub mod cypher_script;
mod error;
mod kind;
pub mod mongo_script;
mod provider;
mod query_logger;
pub mod sql_script;
mod status;
mod types;

pub use command::*;
pub use config::*;
pub use credential::*;
pub use error::*;
pub use kind::*;
pub use provider::*;
pub use query_logger::*;
pub use status::*;
pub use types::*;
