//! Where the Engine API is reached

use conduit_core::{ConduitError, ConnectionConfig, Endpoint, Result};
use std::path::PathBuf;

#[cfg(test)]
mod tests;

/// Engine address resolved from a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerTarget {
    /// Platform default socket, honouring `DOCKER_HOST`
    LocalDefaults,
    /// Explicit unix socket or named pipe (`socket` param)
    Socket(String),
    /// Plain TCP
    Http(String),
    /// TCP with client certificates (`ssl_key`, `ssl_cert`, `ssl_ca` params)
    Ssl {
        address: String,
        key: PathBuf,
        cert: PathBuf,
        ca: PathBuf,
    },
}

impl DockerTarget {
    pub fn resolve(config: &ConnectionConfig, endpoint: &Endpoint) -> Result<Self> {
        if let Some(socket) = config.param("socket").filter(|s| !s.is_empty()) {
            return Ok(DockerTarget::Socket(socket.to_string()));
        }

        let has_host = config
            .host
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty());
        if !has_host && config.ssh_tunnel.is_none() {
            return Ok(DockerTarget::LocalDefaults);
        }
        if endpoint.port == 0 {
            return Err(ConduitError::Validation(format!(
                "Docker connection '{}' has a host but no port",
                config.name
            )));
        }

        let address = format!("tcp://{}", endpoint.address());
        if !config.ssl {
            return Ok(DockerTarget::Http(address));
        }

        let path = |key: &str| {
            config
                .param(key)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| {
                    ConduitError::Validation(format!(
                        "Docker TLS requires the '{}' parameter",
                        key
                    ))
                })
        };
        Ok(DockerTarget::Ssl {
            address,
            key: path("ssl_key")?,
            cert: path("ssl_cert")?,
            ca: path("ssl_ca")?,
        })
    }
}
