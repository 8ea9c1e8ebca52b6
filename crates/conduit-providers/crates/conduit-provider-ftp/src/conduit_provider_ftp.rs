//! FTP provider for Conduit
//!
//! Blocking `suppaftp` control connections run on blocking threads. With
//! `ssl` set the session upgrades through `AUTH TLS` before logging in.

mod command;
mod provider;
mod session;

#[cfg(test)]
mod provider_tests;

pub use command::{COMMANDS, FtpCommand};
pub use provider::FtpProvider;
pub use session::FtpSession;
