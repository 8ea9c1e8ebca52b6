//! Error types for SSH tunnel operations

use conduit_core::ConduitError;

#[derive(Debug, thiserror::Error)]
pub enum SshTunnelError {
    /// Failed to reach the SSH server
    #[error("Failed to connect to SSH server {host}:{port}: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("SSH handshake failed: {0}")]
    HandshakeFailed(String),

    /// Never carries the secret itself
    #[error("SSH authentication failed for user '{0}'")]
    AuthenticationFailed(String),

    #[error("SSH agent not available: {0}")]
    AgentNotAvailable(String),

    #[error("Failed to bind local tunnel listener: {0}")]
    ListenerFailed(String),

    #[error("Failed to open forwarded channel to {host}:{port}: {reason}")]
    PortForwardingFailed {
        host: String,
        port: u16,
        reason: String,
    },
}

impl From<SshTunnelError> for ConduitError {
    fn from(e: SshTunnelError) -> Self {
        ConduitError::Tunnel(e.to_string())
    }
}
