//! RabbitMQ provider implementation

use async_trait::async_trait;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::RabbitMqSession;

/// RabbitMQ provider
///
/// `database` names the vhost (default `/`).
pub struct RabbitMqProvider {
    sessions: Sessions<RabbitMqSession>,
}

impl RabbitMqProvider {
    /// Create a new RabbitMQ provider instance
    pub fn new() -> Self {
        tracing::debug!("RabbitMQ provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<RabbitMqSession> {
        with_connect_timeout(
            ProtocolKind::Rabbitmq,
            RabbitMqSession::connect(config, credential, endpoint),
        )
        .await
    }
}

impl Default for RabbitMqProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for RabbitMqProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rabbitmq
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
                tracing::error!(error = %e, "failed to connect to RabbitMQ");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if let Some(session) = self.sessions.remove(id) {
            if let Err(e) = session.close().await {
                tracing::warn!(connection_id = %id, error = %e, "RabbitMQ disconnect was not clean");
            }
            tracing::info!(connection_id = %id, "RabbitMQ connection closed");
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
        tracing::debug!("testing RabbitMQ connection");
        let session = self.open(config, credential, endpoint).await?;
        let _ = session.close().await;
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
