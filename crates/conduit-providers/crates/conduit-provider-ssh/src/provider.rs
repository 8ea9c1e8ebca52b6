//! SSH shell and SFTP provider implementation

use async_trait::async_trait;
use conduit_core::{
    ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput, MetadataNode,
    ProtocolKind, Result, Sessions, require_port, with_connect_timeout,
};
use uuid::Uuid;

use crate::SshSession;

/// SSH provider; SFTP shares the login path and this implementation
pub struct SshProvider {
    kind: ProtocolKind,
    sessions: Sessions<SshSession>,
}

impl SshProvider {
    /// Create a new SSH shell provider instance
    pub fn new() -> Self {
        tracing::debug!("SSH provider initialized");
        Self {
            kind: ProtocolKind::Ssh,
            sessions: Sessions::new(),
        }
    }

    /// Same provider registered under the SFTP kind
    pub fn sftp() -> Self {
        tracing::debug!("SFTP provider initialized");
        Self {
            kind: ProtocolKind::Sftp,
            sessions: Sessions::new(),
        }
    }

    async fn open(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<SshSession> {
        require_port(config, endpoint)?;
        with_connect_timeout(self.kind, SshSession::connect(config, credential, endpoint)).await
    }
}

impl Default for SshProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for SshProvider {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    #[tracing::instrument(skip(self, config, credential, endpoint), fields(connection_id = %config.id, kind = %self.kind))]
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
                tracing::error!(error = %e, "failed to open SSH login");
                e
            })?;
        self.sessions.insert(config.id, session);
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        if let Some(session) = self.sessions.remove(id) {
            if let Err(e) = session.close().await {
                tracing::warn!(connection_id = %id, error = %e, "SSH disconnect was not clean");
            }
            tracing::info!(connection_id = %id, kind = %self.kind, "SSH connection closed");
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
        tracing::debug!(kind = %self.kind, "testing SSH connection");
        let session = self.open(config, credential, endpoint).await?;
        let _ = session.close().await;
        Ok(true)
    }

    async fn get_metadata(&self, id: Uuid) -> Result<Vec<MetadataNode>> {
        self.sessions.get(id)?.metadata().await
    }

    #[tracing::instrument(skip(self, query), fields(connection_id = %id, kind = %self.kind))]
    async fn execute_query(
        &self,
        id: Uuid,
        _target: Option<&str>,
        query: &str,
    ) -> Result<ExecOutput> {
        let session = self.sessions.get(id)?;
        match self.kind {
            ProtocolKind::Sftp => session.sftp(query).await,
            _ => Ok(ExecOutput::Text(session.exec(query).await?.render())),
        }
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.contains(id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids()
    }
}
