//! On-disk configuration store
//!
//! One JSON document holds every saved connection (never a secret), the
//! groups and the per-connection metadata. A missing or unreadable file is
//! treated as empty state.

use conduit_core::{ConnectionConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{ConnectionGroup, ConnectionMetadata};

const APP_DIR: &str = "conduit";
const FILE_NAME: &str = "connections.json";

/// Everything the broker persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub groups: Vec<ConnectionGroup>,
    #[serde(default)]
    pub metadata: Vec<ConnectionMetadata>,
}

/// Where broker state is persisted, if anywhere
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Store in the platform config directory
    pub fn default_location() -> Self {
        Self {
            path: default_path(),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// State lives only as long as the broker
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the stored state; missing or corrupt files load as empty
    #[tracing::instrument(skip(self), fields(path = ?self.path))]
    pub async fn load(&self) -> StoredState {
        let Some(path) = &self.path else {
            return StoredState::default();
        };

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no configuration file yet");
                return StoredState::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read configuration file, starting empty");
                return StoredState::default();
            }
        };

        match serde_json::from_str::<StoredState>(&content) {
            Ok(state) => {
                tracing::info!(count = state.connections.len(), "connections loaded from storage");
                state
            }
            Err(e) => {
                tracing::warn!(error = %e, "configuration file is corrupt, starting empty");
                StoredState::default()
            }
        }
    }

    /// Write `state`, creating the parent directory when needed
    #[tracing::instrument(skip(self, state), fields(path = ?self.path))]
    pub async fn save(&self, state: &StoredState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(path, content).await?;
        tracing::debug!(count = state.connections.len(), "connections saved to storage");
        Ok(())
    }
}

/// `<config dir>/conduit/connections.json`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
}
