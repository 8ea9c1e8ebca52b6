//! MongoDB provider for Conduit
//!
//! Scripts are matched into collection calls by
//! [`conduit_core::mongo_script`] and run in order against the official
//! driver. Literals travel as extended JSON and are converted to BSON here.

mod convert;
mod provider;
mod session;

#[cfg(test)]
mod provider_tests;

pub use convert::{document_to_json, json_to_document};
pub use provider::MongoDbProvider;
pub use session::MongoDbSession;
