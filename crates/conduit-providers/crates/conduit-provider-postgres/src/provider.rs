//! PostgreSQL provider implementation

use async_trait::async_trait;
use conduit_core::sql_script::run_sql_script;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::PostgresSession;
use crate::session::PostgresExecutor;

/// PostgreSQL provider
pub struct PostgresProvider {
    sessions: Sessions<PostgresSession>,
}

impl PostgresProvider {
    /// Create a new PostgreSQL provider instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<PostgresSession> {
        with_connect_timeout(
            ProtocolKind::Postgres,
            PostgresSession::connect(config, credential, endpoint),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL database");
            e
        })
    }
}

impl Default for PostgresProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for PostgresProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Postgres
    }

    #[tracing::instrument(skip(self, config, credential, endpoint), fields(connection_id = %config.id, kind = "postgres"))]
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<()> {
        let session = Self::open(config, credential, endpoint).await?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if self.sessions.remove(id).is_some() {
            tracing::info!(connection_id = %id, "PostgreSQL connection closed");
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
        tracing::debug!("testing PostgreSQL connection");
        Self::open(config, credential, endpoint).await?;
        Ok(true)
    }

    async fn get_metadata(&self, id: Uuid) -> Result<Vec<MetadataNode>> {
        self.sessions.get(id)?.metadata().await
    }

    #[tracing::instrument(skip(self, query), fields(connection_id = %id, sql_preview = %query.chars().take(100).collect::<String>()))]
    async fn execute_query(
        &self,
        id: Uuid,
        _target: Option<&str>,
        query: &str,
    ) -> Result<ExecOutput> {
        let session = self.sessions.get(id)?;
        let result = run_sql_script(&mut PostgresExecutor(&session), query).await?;
        Ok(ExecOutput::Rows(result))
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
