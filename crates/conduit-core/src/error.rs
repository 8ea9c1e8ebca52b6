//! Error types for Conduit

use crate::ProtocolKind;
use thiserror::Error;

/// Core error type for broker and provider operations
#[derive(Error, Debug)]
pub enum ConduitError {
    /// Configuration shape rejected before any I/O
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Network or authentication failure while establishing a session
    #[error("Connection error: {0}")]
    Connect(String),

    /// Operation attempted without a live session
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// A query or command failed mid-flight
    #[error("Execution error: {0}")]
    Exec(String),

    /// SSH bastion or local listener failure
    #[error("SSH tunnel error: {0}")]
    Tunnel(String),

    #[error("Provider unavailable for kind {0}")]
    ProviderUnavailable(ProtocolKind),

    #[error("No credentials found, please edit connection and re-enter credentials")]
    MissingCredentials,

    #[error("Secret store error: {0}")]
    Secret(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConduitError {
    /// Whether this error should mark the owning connection as disconnected
    pub fn affects_status(&self) -> bool {
        matches!(
            self,
            ConduitError::Connect(_) | ConduitError::Tunnel(_) | ConduitError::MissingCredentials
        )
    }

    /// Build an `Exec` error for an unsupported command name
    pub fn unknown_command(name: &str, supported: &[&str]) -> Self {
        ConduitError::Exec(format!(
            "unknown command '{}', supported: {}",
            name,
            supported.join(", ")
        ))
    }
}

/// Result type alias for Conduit operations
pub type Result<T> = std::result::Result<T, ConduitError>;
