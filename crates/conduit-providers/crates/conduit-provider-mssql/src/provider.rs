//! MS SQL Server provider implementation

use async_trait::async_trait;
use conduit_core::sql_script::run_sql_script;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::MssqlSession;

/// MS SQL Server provider
pub struct MssqlProvider {
    sessions: Sessions<MssqlSession>,
}

impl MssqlProvider {
    /// Create a new MS SQL Server provider instance
    pub fn new() -> Self {
        tracing::debug!("MS SQL Server provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<MssqlSession> {
        with_connect_timeout(
            ProtocolKind::Mssql,
            MssqlSession::connect(config, credential, endpoint),
        )
        .await
    }
}

impl Default for MssqlProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for MssqlProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Mssql
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
                tracing::error!(error = %e, "failed to connect to SQL Server");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if let Some(session) = self.sessions.remove(id) {
            if let Err(e) = session.close().await {
                tracing::warn!(connection_id = %id, error = %e, "SQL Server disconnect was not clean");
            }
            tracing::info!(connection_id = %id, "SQL Server connection closed");
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
        tracing::debug!("testing SQL Server connection");
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
        let session = self.sessions.get(id)?;
        let mut executor = session.lock().await?;
        let result = run_sql_script(&mut executor, query).await?;
        Ok(ExecOutput::Rows(result))
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
