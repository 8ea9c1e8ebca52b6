//! Conduit Tunnel - SSH tunnel multiplexer
//!
//! Opens one local ephemeral listener per connection id and forwards every
//! accepted socket through a single authenticated SSH session to a remote
//! target.

mod error;
mod manager;
mod pipe;
mod ssh;

pub use error::SshTunnelError;
pub use manager::{BastionConnector, BastionSession, TunnelManager, TunnelSpec};
pub use pipe::pipe_bidirectional;
pub use ssh::{Ssh2Connector, SshAuth, open_ssh_session};
