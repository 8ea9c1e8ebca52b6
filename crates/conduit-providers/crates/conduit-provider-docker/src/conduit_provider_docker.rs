//! Docker Engine provider for Conduit
//!
//! Talks to the Engine API through `bollard`, over the local socket by
//! default or TCP (optionally TLS) when a host is configured.

mod command;
mod provider;
mod session;
mod target;

#[cfg(test)]
mod provider_tests;

pub use command::{COMMANDS, DockerCommand};
pub use provider::DockerProvider;
pub use session::DockerSession;
pub use target::DockerTarget;
