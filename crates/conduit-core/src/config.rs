//! Connection configuration types
//!
//! A `ConnectionConfig` carries identity and routing data only. Secrets live
//! in a `Credential` that is handed to providers at connect time and never
//! stored alongside the config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ProtocolKind;

/// Default SSH port for bastion hosts
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Bastion host description for a tunnelled connection
///
/// The bastion's password or key is part of the connection's `Credential`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshTunnelDescriptor {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl SshTunnelDescriptor {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Identity and routing information for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Unique identifier, fixed at creation
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Protocol kind, fixed at creation
    #[serde(rename = "type")]
    pub kind: ProtocolKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name, or the file path for file-based kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default)]
    pub ssl: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_tunnel: Option<SshTunnelDescriptor>,

    /// Protocol-specific extras (vhost, auth source, ssl mode, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ConnectionConfig {
    /// Create a new configuration with a fresh id
    pub fn new(name: impl Into<String>, kind: ProtocolKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            host: None,
            port: None,
            database: None,
            username: None,
            ssl: false,
            ssh_tunnel: None,
            params: BTreeMap::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_ssh_tunnel(mut self, tunnel: SshTunnelDescriptor) -> Self {
        self.ssh_tunnel = Some(tunnel);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    /// Port from the config or the kind's default
    pub fn effective_port(&self) -> Option<u16> {
        self.port.filter(|p| *p > 0).or_else(|| self.kind.default_port())
    }

    /// Host from the config, falling back to the loopback address
    pub fn effective_host(&self) -> String {
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or("127.0.0.1")
            .to_string()
    }

    /// Endpoint dialed when no tunnel is involved
    pub fn direct_endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.effective_host(),
            port: self.effective_port().unwrap_or(0),
        }
    }

    /// Short description safe to log
    pub fn summary(&self) -> String {
        match (&self.host, self.effective_port(), &self.database) {
            (_, _, Some(db)) if self.kind.is_file_based() => format!("{} {}", self.kind, db),
            (Some(host), Some(port), _) => format!("{} {}:{}", self.kind, host, port),
            (Some(host), None, _) => format!("{} {}", self.kind, host),
            _ => self.kind.to_string(),
        }
    }
}

/// Mutable subset of a `ConnectionConfig`
///
/// There is no way to express a kind change here; the protocol kind of a
/// connection is fixed for its lifetime.
#[derive(Debug, Clone, Default)]
pub struct ConnectionUpdate {
    pub name: Option<String>,
    pub host: Option<Option<String>>,
    pub port: Option<Option<u16>>,
    pub database: Option<Option<String>>,
    pub username: Option<Option<String>>,
    pub ssl: Option<bool>,
    pub ssh_tunnel: Option<Option<SshTunnelDescriptor>>,
    pub params: Option<BTreeMap<String, String>>,
}

impl ConnectionUpdate {
    /// Apply this update to `config` in place
    pub fn apply_to(self, config: &mut ConnectionConfig) {
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(username) = self.username {
            config.username = username;
        }
        if let Some(ssl) = self.ssl {
            config.ssl = ssl;
        }
        if let Some(tunnel) = self.ssh_tunnel {
            config.ssh_tunnel = tunnel;
        }
        if let Some(params) = self.params {
            config.params = params;
        }
    }
}

/// Host and port a provider actually dials
///
/// Equal to the config's own host/port unless an SSH tunnel is active, in
/// which case it points at the tunnel's local listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn local(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialized_config_uses_type_key() {
        let config = ConnectionConfig::new("local pg", ProtocolKind::Postgres)
            .with_host("localhost")
            .with_port(5432)
            .with_ssh_tunnel(SshTunnelDescriptor::new("bastion", "ops"));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "postgres");
        assert_eq!(json["sshTunnel"]["host"], "bastion");
        assert_eq!(json["sshTunnel"]["port"], 22);
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_effective_port_falls_back_to_default() {
        let config = ConnectionConfig::new("r", ProtocolKind::Redis).with_host("cache");
        assert_eq!(config.effective_port(), Some(6379));
        assert_eq!(config.direct_endpoint(), Endpoint::new("cache", 6379));
        let config = config.with_port(0);
        assert_eq!(config.effective_port(), Some(6379));
    }

    #[test]
    fn test_update_never_touches_kind() {
        let mut config = ConnectionConfig::new("a", ProtocolKind::Mysql).with_host("db");
        ConnectionUpdate {
            name: Some("b".into()),
            host: Some(None),
            ..Default::default()
        }
        .apply_to(&mut config);
        assert_eq!(config.name, "b");
        assert_eq!(config.host, None);
        assert_eq!(config.kind, ProtocolKind::Mysql);
    }

    #[test]
    fn test_summary_for_file_based() {
        let config = ConnectionConfig::new("s", ProtocolKind::Sqlite).with_database("/tmp/x.db");
        assert_eq!(config.summary(), "sqlite /tmp/x.db");
    }
}
