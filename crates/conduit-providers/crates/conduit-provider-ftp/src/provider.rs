//! FTP provider implementation

use async_trait::async_trait;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, with_connect_timeout,
};
use uuid::Uuid;

use crate::FtpSession;

/// FTP provider; logs in anonymously when no username is configured
pub struct FtpProvider {
    sessions: Sessions<FtpSession>,
}

impl FtpProvider {
    /// Create a new FTP provider instance
    pub fn new() -> Self {
        tracing::debug!("FTP provider initialized");
        Self {
            sessions: Sessions::new(),
        }
    }

    async fn open(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<FtpSession> {
        with_connect_timeout(
            ProtocolKind::Ftp,
            FtpSession::connect(config, credential, endpoint),
        )
        .await
    }
}

impl Default for FtpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for FtpProvider {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Ftp
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
                tracing::error!(error = %e, "failed to connect to FTP");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if let Some(session) = self.sessions.remove(id) {
            if let Err(e) = session.close().await {
                tracing::warn!(connection_id = %id, error = %e, "FTP disconnect was not clean");
            }
            tracing::info!(connection_id = %id, "FTP connection closed");
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
        tracing::debug!("testing FTP connection");
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
