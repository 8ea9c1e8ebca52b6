//! Portable export and import of saved connections
//!
//! Passwords may be included, base64-encoded. That is an encoding for
//! transport, not protection; the document must be handled as a secret
//! whenever `includePasswords` is set.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use conduit_core::{
    ConduitError, ConnectionConfig, Credential, ProtocolKind, Result, SshTunnelDescriptor,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::ConnectionRegistry;
use crate::validation::validate_config;

/// Format version written by this build
pub const EXPORT_VERSION: &str = "1.0";

/// Top-level export document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    #[serde(alias = "passwordsIncluded")]
    pub include_passwords: bool,
    pub connections: Vec<ExportedConnection>,
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One connection in export form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedConnection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProtocolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_tunnel: Option<SshTunnelDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Base64 of the password, present only when passwords were included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl From<&ConnectionConfig> for ExportedConnection {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.kind,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            username: config.username.clone(),
            ssl: config.ssl,
            ssh_tunnel: config.ssh_tunnel.clone(),
            params: config.params.clone(),
            password: None,
        }
    }
}

impl ExportedConnection {
    /// Config under a fresh id
    pub fn to_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.name.clone(), self.kind);
        config.host = self.host.clone();
        config.port = self.port;
        config.database = self.database.clone();
        config.username = self.username.clone();
        config.ssl = self.ssl;
        config.ssh_tunnel = self.ssh_tunnel.clone();
        config.params = self.params.clone();
        config
    }

    /// Decoded password, if one was exported
    pub fn decode_password(&self) -> Result<Option<Zeroizing<String>>> {
        let Some(encoded) = &self.password else {
            return Ok(None);
        };
        let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|_| {
            ConduitError::Validation(format!(
                "connection '{}' has an invalid encoded password",
                self.name
            ))
        })?);
        let password = String::from_utf8(bytes.to_vec()).map_err(|_| {
            ConduitError::Validation(format!(
                "connection '{}' has a password that is not valid UTF-8",
                self.name
            ))
        })?;
        Ok(Some(Zeroizing::new(password)))
    }
}

/// What to do when an imported name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionAction {
    Skip,
    /// Replace the existing connection, credential included
    Overwrite,
}

/// Counts from one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub overwritten: usize,
    pub skipped: usize,
}

impl ConnectionRegistry {
    /// Snapshot every saved connection
    #[tracing::instrument(skip(self))]
    pub async fn export_connections(&self, include_passwords: bool) -> Result<ExportDocument> {
        let configs = self.list_connections();
        let mut connections = Vec::with_capacity(configs.len());
        for config in &configs {
            let mut exported = ExportedConnection::from(config);
            if include_passwords
                && let Some(credential) = self.secrets.get(config.id).await?
                && let Some(password) = credential.password.as_deref()
            {
                exported.password = Some(STANDARD.encode(password.as_bytes()));
            }
            connections.push(exported);
        }

        tracing::info!(count = connections.len(), include_passwords, "connections exported");
        Ok(ExportDocument {
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now(),
            include_passwords,
            connections,
        })
    }

    /// Add every connection in `doc`, asking `resolve` about name clashes
    ///
    /// Imported connections get fresh ids. A secret-store entry is written
    /// only for connections that carry a password.
    #[tracing::instrument(skip(self, doc, resolve), fields(count = doc.connections.len()))]
    pub async fn import_connections<F>(
        &self,
        doc: ExportDocument,
        mut resolve: F,
    ) -> Result<ImportSummary>
    where
        F: FnMut(&ExportedConnection, &ConnectionConfig) -> CollisionAction,
    {
        if !doc.version.starts_with("1.") {
            return Err(ConduitError::Validation(format!(
                "unsupported export version '{}'",
                doc.version
            )));
        }

        let mut summary = ImportSummary::default();
        for exported in &doc.connections {
            let password = exported.decode_password()?;
            let config = exported.to_config();
            validate_config(&config)?;

            let mut overwrite: Option<Uuid> = None;
            if let Some(existing) = self.find_by_name(&exported.name) {
                match resolve(exported, &existing) {
                    CollisionAction::Skip => {
                        tracing::debug!(name = %exported.name, "import skipped existing name");
                        summary.skipped += 1;
                        continue;
                    }
                    CollisionAction::Overwrite => overwrite = Some(existing.id),
                }
            }

            if let Some(existing_id) = overwrite {
                self.delete_connection(existing_id).await?;
            }
            let credential = password.map(|p| Credential::password(p.as_str()));
            self.add_connection(config, credential).await?;

            if overwrite.is_some() {
                summary.overwritten += 1;
            } else {
                summary.imported += 1;
            }
        }

        tracing::info!(
            imported = summary.imported,
            overwritten = summary.overwritten,
            skipped = summary.skipped,
            "connections imported"
        );
        Ok(summary)
    }
}
