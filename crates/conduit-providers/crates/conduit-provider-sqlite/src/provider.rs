//! SQLite provider implementation

use async_trait::async_trait;
use conduit_core::sql_script::run_sql_script;
use conduit_core::{
    ConduitError, ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput,
    MetadataNode, ProtocolKind, Result, Sessions, run_blocking, with_connect_timeout,
};
use uuid::Uuid;

use crate::SqliteSession;
use crate::session::SqliteExecutor;

/// SQLite provider; `database` is the file path
pub struct SqliteProvider {
    sessions: Sessions<SqliteSession>,
}

impl SqliteProvider {
    /// Create a new SQLite provider instance
    pub fn new() -> Self {
        tracing::debug!("SQLite provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(config: &ConnectionConfig) -> Result<SqliteSession> {
        let path = config
            .database
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                ConduitError::Validation(format!(
                    "SQLite connection '{}' requires a database file path",
                    config.name
                ))
            })?;

        with_connect_timeout(
            ProtocolKind::Sqlite,
            run_blocking("SQLite open", move || {
                let session = SqliteSession::open(&path)?;
                session.verify()?;
                Ok(session)
            }),
        )
        .await
    }
}

impl Default for SqliteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for SqliteProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Sqlite
    }

    #[tracing::instrument(skip(self, config, _credential, _endpoint), fields(connection_id = %config.id, path = config.database.as_deref()))]
    async fn connect(
        &self,
        config: &ConnectionConfig,
        _credential: &Credential,
        _endpoint: &Endpoint,
    ) -> Result<()> {
        let session = Self::open(config).await.map_err(|e| {
            tracing::error!(error = %e, "failed to open SQLite database");
            e
        })?;
        tracing::info!(path = %session.path(), "SQLite connection created");
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if self.sessions.remove(id).is_some() {
            tracing::info!(connection_id = %id, "SQLite connection closed");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, config, _credential, _endpoint))]
    async fn test_connection(
        &self,
        config: &ConnectionConfig,
        _credential: &Credential,
        _endpoint: &Endpoint,
    ) -> Result<bool> {
        tracing::debug!("testing SQLite connection");
        Self::open(config).await?;
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
        let result = run_sql_script(&mut SqliteExecutor(&session), query).await?;
        Ok(ExecOutput::Rows(result))
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
