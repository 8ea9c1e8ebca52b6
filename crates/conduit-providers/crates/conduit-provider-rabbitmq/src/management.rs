//! RabbitMQ management plugin client

use conduit_core::{CONNECT_TIMEOUT, ConduitError, MetadataNode, NodeKind, Result};
use reqwest::Url;
use serde::Deserialize;

#[cfg(test)]
mod tests;

pub const DEFAULT_MANAGEMENT_PORT: u16 = 15672;

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
}

/// HTTP client for `/api/queues` and `/api/exchanges` of one vhost
pub struct ManagementApi {
    http: reqwest::Client,
    base_url: Url,
    vhost: String,
    username: String,
    password: String,
}

impl ManagementApi {
    pub fn new(
        base_url: Url,
        vhost: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConduitError::Connect(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url,
            vhost: vhost.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Queues and exchanges as two categories
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let queues = self.list("queues").await?;
        let exchanges = self.list("exchanges").await?;
        Ok(categorize(queues, exchanges))
    }

    async fn list(&self, resource: &str) -> Result<Vec<String>> {
        let url = self.resource_url(resource)?;
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                ConduitError::Exec(format!("RabbitMQ management API unreachable: {}", e))
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConduitError::Exec(format!(
                "RabbitMQ management API returned HTTP {} for {}",
                status.as_u16(),
                resource
            )));
        }
        let entries: Vec<NamedEntry> = response.json().await.map_err(|e| {
            ConduitError::Exec(format!("Unexpected management API response: {}", e))
        })?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// `/api/<resource>/<vhost>`, the vhost percent-encoded (`/` becomes `%2F`)
    pub(crate) fn resource_url(&self, resource: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConduitError::Validation("management URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", resource, self.vhost.as_str()]);
        Ok(url)
    }
}

/// Sorted categories; the default exchange has an empty name and is shown
/// under its AMQP alias
pub(crate) fn categorize(mut queues: Vec<String>, exchanges: Vec<String>) -> Vec<MetadataNode> {
    queues.sort();
    let mut exchanges: Vec<String> = exchanges
        .into_iter()
        .map(|name| {
            if name.is_empty() {
                "(AMQP default)".to_string()
            } else {
                name
            }
        })
        .collect();
    exchanges.sort();

    vec![
        MetadataNode::branch(
            "Queues",
            NodeKind::Category,
            queues
                .into_iter()
                .map(|q| MetadataNode::leaf(q, NodeKind::Queue))
                .collect(),
        ),
        MetadataNode::branch(
            "Exchanges",
            NodeKind::Category,
            exchanges
                .into_iter()
                .map(|e| MetadataNode::leaf(e, NodeKind::Exchange))
                .collect(),
        ),
    ]
}
