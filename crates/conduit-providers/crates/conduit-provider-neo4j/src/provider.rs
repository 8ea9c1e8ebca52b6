//! Neo4j provider implementation

use async_trait::async_trait;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::Neo4jSession;

/// Neo4j provider
pub struct Neo4jProvider {
    sessions: Sessions<Neo4jSession>,
}

impl Neo4jProvider {
    /// Create a new Neo4j provider instance
    pub fn new() -> Self {
        tracing::debug!("Neo4j provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Neo4jSession> {
        with_connect_timeout(
            ProtocolKind::Neo4j,
            Neo4jSession::connect(config, credential, endpoint),
        )
        .await
    }
}

impl Default for Neo4jProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for Neo4jProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Neo4j
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
                tracing::error!(error = %e, "failed to connect to Neo4j");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        // HTTP is stateless; dropping the client is the whole teardown
        if self.sessions.remove(id).is_some() {
            tracing::info!(connection_id = %id, "Neo4j connection closed");
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
        tracing::debug!("testing Neo4j connection");
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
        target: Option<&str>,
        query: &str,
    ) -> Result<ExecOutput> {
        let session = self.sessions.get(id)?;
        let graph = session.run_script(query, target).await?;
        Ok(ExecOutput::Graph(graph))
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
