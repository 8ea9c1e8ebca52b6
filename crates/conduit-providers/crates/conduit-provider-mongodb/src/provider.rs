//! MongoDB provider implementation

use async_trait::async_trait;
use conduit_core::mongo_script::parse_script;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::MongoDbSession;

/// MongoDB provider; `target` on execute names the database to use when the
/// script does not select one
pub struct MongoDbProvider {
    sessions: Sessions<MongoDbSession>,
}

impl MongoDbProvider {
    /// Create a new MongoDB provider instance
    pub fn new() -> Self {
        tracing::debug!("MongoDB provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<MongoDbSession> {
        with_connect_timeout(
            ProtocolKind::Mongodb,
            MongoDbSession::connect(config, credential, endpoint),
        )
        .await
    }
}

impl Default for MongoDbProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for MongoDbProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Mongodb
    }

    #[tracing::instrument(skip(self, config, credential, endpoint), fields(connection_id = %config.id))]
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<()> {
        let session = Self::open(config, credential, endpoint)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect to MongoDB");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if let Some(session) = self.sessions.remove(id) {
            session.close().await;
            tracing::info!(connection_id = %id, "MongoDB connection closed");
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
        tracing::debug!("testing MongoDB connection");
        let session = Self::open(config, credential, endpoint).await?;
        session.close().await;
        Ok(true)
    }

    async fn get_metadata(&self, id: Uuid) -> Result<Vec<MetadataNode>> {
        self.sessions.get(id)?.metadata().await
    }

    #[tracing::instrument(skip(self, query), fields(connection_id = %id, target = target))]
    async fn execute_query(
        &self,
        id: Uuid,
        target: Option<&str>,
        query: &str,
    ) -> Result<ExecOutput> {
        let session = self.sessions.get(id)?;
        let script = parse_script(query)?;
        session.run_script(script, target).await
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
