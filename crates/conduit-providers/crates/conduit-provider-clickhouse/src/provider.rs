//! ClickHouse provider implementation

use async_trait::async_trait;
use conduit_core::sql_script::run_sql_script;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::ClickHouseSession;

/// ClickHouse provider over the HTTP interface
pub struct ClickHouseProvider {
    sessions: Sessions<ClickHouseSession>,
}

impl ClickHouseProvider {
    /// Create a new ClickHouse provider instance
    pub fn new() -> Self {
        tracing::debug!("ClickHouse provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<ClickHouseSession> {
        with_connect_timeout(
            ProtocolKind::Clickhouse,
            ClickHouseSession::connect(config, credential, endpoint),
        )
        .await
    }
}

impl Default for ClickHouseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for ClickHouseProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Clickhouse
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
                tracing::error!(error = %e, "failed to connect to ClickHouse");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if self.sessions.remove(id).is_some() {
            tracing::info!(connection_id = %id, "ClickHouse connection closed");
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
        tracing::debug!("testing ClickHouse connection");
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
        let session = self.sessions.get(id)?;
        let result = run_sql_script(&mut session.executor(), query).await?;
        Ok(ExecOutput::Rows(result))
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
