//! Docker provider implementation

use async_trait::async_trait;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::DockerSession;

/// Docker Engine provider; the daemon does its own access control, so
/// credentials are unused
pub struct DockerProvider {
    sessions: Sessions<DockerSession>,
}

impl DockerProvider {
    /// Create a new Docker provider instance
    pub fn new() -> Self {
        tracing::debug!("Docker provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(&self, config: &ConnectionConfig, endpoint: &Endpoint) -> Result<DockerSession> {
        with_connect_timeout(
            ProtocolKind::Docker,
            DockerSession::connect(config, endpoint),
        )
        .await
    }
}

impl Default for DockerProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for DockerProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Docker
    }

    #[tracing::instrument(skip(self, config, _credential, endpoint), fields(connection_id = %config.id))]
    async fn connect(
        &self,
        config: &ConnectionConfig,
        _credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<()> {
        let session = self
            .open(config, endpoint)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect to Docker");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if self.sessions.remove(id).is_some() {
            tracing::info!(connection_id = %id, "Docker connection closed");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, config, _credential, endpoint))]
    async fn test_connection(
        &self,
        config: &ConnectionConfig,
        _credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<bool> {
        tracing::debug!("testing Docker connection");
        self.open(config, endpoint).await?;
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
