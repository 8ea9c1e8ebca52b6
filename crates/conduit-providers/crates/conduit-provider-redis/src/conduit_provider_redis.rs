//! Redis provider for Conduit
//!
//! Each line of input is one Redis command; the reply of the last one is
//! returned as JSON.

mod provider;
mod reply;
mod session;

#[cfg(test)]
mod provider_tests;

pub use provider::RedisProvider;
pub use reply::reply_to_json;
pub use session::RedisSession;
