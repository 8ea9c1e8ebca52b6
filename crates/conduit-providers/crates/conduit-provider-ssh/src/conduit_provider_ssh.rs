//! SSH shell and SFTP provider for Conduit
//!
//! Both kinds log in with libssh2 through `conduit-tunnel`'s session
//! helper. SSH runs the query text as a remote command; SFTP interprets a
//! small file vocabulary over the SFTP subsystem.

mod provider;
mod session;
mod sftp;

#[cfg(test)]
mod provider_tests;

pub use provider::SshProvider;
pub use session::{ExecReport, SshSession};
pub use sftp::{COMMANDS, SftpCommand};
