//! Elasticsearch provider implementation

use async_trait::async_trait;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::ElasticsearchSession;

/// Elasticsearch provider speaking the REST API
pub struct ElasticsearchProvider {
    sessions: Sessions<ElasticsearchSession>,
}

impl ElasticsearchProvider {
    /// Create a new Elasticsearch provider instance
    pub fn new() -> Self {
        tracing::debug!("Elasticsearch provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<ElasticsearchSession> {
        with_connect_timeout(
            ProtocolKind::Elasticsearch,
            ElasticsearchSession::connect(config, credential, endpoint),
        )
        .await
    }
}

impl Default for ElasticsearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for ElasticsearchProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Elasticsearch
    }

    #[tracing::instrument(skip(self, config, credential, endpoint), fields(connection_id = %config.id))]
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<()> {
        let session = self
            .open(config, credential, endpoint)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect to Elasticsearch");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if self.sessions.remove(id).is_some() {
            tracing::info!(connection_id = %id, "Elasticsearch connection closed");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, config, credential, endpoint))]
    async fn test_connection(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<bool> {
        tracing::debug!("testing Elasticsearch connection");
        self.open(config, credential, endpoint).await?;
        Ok(true)
    }

    async fn get_metadata(&self, id: Uuid) -> Result<Vec<MetadataNode>> {
        self.sessions.get(id)?.metadata().await
    }

    #[tracing::instrument(skip(self, query), fields(connection_id = %id))]
    async fn execute_query(
        &self,
        id: Uuid,
        _target: Option<&str>,
        query: &str,
    ) -> Result<ExecOutput> {
        self.sessions.get(id)?.run(query).await
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
