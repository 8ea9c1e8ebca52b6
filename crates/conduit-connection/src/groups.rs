//! Connection groups and per-connection flags

use chrono::{DateTime, Utc};
use conduit_core::{ConduitError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConnectionRegistry;

/// A named folder of connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionGroup {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl ConnectionGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Favorite flag and group membership of one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetadata {
    pub connection_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub favorite: bool,
}

impl ConnectionMetadata {
    pub fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id,
            group_id: None,
            favorite: false,
        }
    }
}

fn group_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConduitError::Validation("group name cannot be empty".into()));
    }
    Ok(name.to_string())
}

impl ConnectionRegistry {
    #[tracing::instrument(skip(self))]
    pub async fn create_group(&self, name: &str) -> Result<ConnectionGroup> {
        let name = group_name(name)?;
        let group = {
            let mut state = self.state.write();
            if state.groups.iter().any(|g| g.name == name) {
                return Err(ConduitError::Validation(format!(
                    "a group named '{}' already exists",
                    name
                )));
            }
            let group = ConnectionGroup::new(name);
            state.groups.push(group.clone());
            group
        };
        self.persist().await?;
        tracing::info!(group_id = %group.id, "group created");
        Ok(group)
    }

    pub async fn rename_group(&self, group_id: Uuid, name: &str) -> Result<()> {
        let name = group_name(name)?;
        {
            let mut state = self.state.write();
            if state.groups.iter().any(|g| g.name == name && g.id != group_id) {
                return Err(ConduitError::Validation(format!(
                    "a group named '{}' already exists",
                    name
                )));
            }
            let group = state
                .groups
                .iter_mut()
                .find(|g| g.id == group_id)
                .ok_or_else(|| ConduitError::NotFound(format!("group {}", group_id)))?;
            group.name = name;
        }
        self.persist().await
    }

    /// Remove a group; its members become ungrouped
    pub async fn delete_group(&self, group_id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write();
            let before = state.groups.len();
            state.groups.retain(|g| g.id != group_id);
            if state.groups.len() == before {
                return Err(ConduitError::NotFound(format!("group {}", group_id)));
            }
            for meta in state
                .metadata
                .iter_mut()
                .filter(|m| m.group_id == Some(group_id))
            {
                meta.group_id = None;
            }
        }
        self.persist().await?;
        tracing::info!(group_id = %group_id, "group deleted");
        Ok(())
    }

    /// Move a connection into `group_id`, or out of any group with `None`
    pub async fn assign_group(&self, id: Uuid, group_id: Option<Uuid>) -> Result<()> {
        {
            let mut state = self.state.write();
            if let Some(group_id) = group_id
                && !state.groups.iter().any(|g| g.id == group_id)
            {
                return Err(ConduitError::NotFound(format!("group {}", group_id)));
            }
            state.metadata_mut(id)?.group_id = group_id;
        }
        self.persist().await
    }

    pub async fn set_favorite(&self, id: Uuid, favorite: bool) -> Result<()> {
        self.state.write().metadata_mut(id)?.favorite = favorite;
        self.persist().await
    }

    pub fn list_groups(&self) -> Vec<ConnectionGroup> {
        self.state.read().groups.clone()
    }

    pub fn metadata(&self, id: Uuid) -> Option<ConnectionMetadata> {
        let state = self.state.read();
        state.find(id)?;
        Some(
            state
                .metadata
                .iter()
                .find(|m| m.connection_id == id)
                .cloned()
                .unwrap_or_else(|| ConnectionMetadata::new(id)),
        )
    }

    /// Connections whose metadata places them in `group_id`
    pub fn connections_in_group(&self, group_id: Uuid) -> Vec<Uuid> {
        self.state
            .read()
            .metadata
            .iter()
            .filter(|m| m.group_id == Some(group_id))
            .map(|m| m.connection_id)
            .collect()
    }

    pub fn favorites(&self) -> Vec<Uuid> {
        self.state
            .read()
            .metadata
            .iter()
            .filter(|m| m.favorite)
            .map(|m| m.connection_id)
            .collect()
    }
}
