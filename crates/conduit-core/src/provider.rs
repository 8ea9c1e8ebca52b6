//! The uniform provider contract and the helpers every provider shares

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    ConduitError, ConnectionConfig, Credential, Endpoint, ExecOutput, MetadataNode, ProtocolKind,
    Result,
};

/// Upper bound on establishing and verifying one session
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One backend protocol behind the broker's uniform interface
///
/// A provider instance serves every connection of its kind and keeps its own
/// map from connection id to live session. Sessions never leave the provider.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Protocol kind this instance serves
    fn kind(&self) -> ProtocolKind;

    /// Open and verify a session and register it under `config.id`
    ///
    /// `endpoint` is the address to dial; it differs from the config's
    /// host/port when the broker routes through an SSH tunnel.
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<()>;

    /// Close the session for `id`; a no-op when none exists
    async fn disconnect(&self, id: Uuid) -> Result<()>;

    /// Open, verify and close a session without registering it
    async fn test_connection(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<bool>;

    /// Navigable structure of the backend
    async fn get_metadata(&self, id: Uuid) -> Result<Vec<MetadataNode>>;

    /// Run one query, script or command
    ///
    /// `target` is protocol-specific: the database for document and graph
    /// stores, free text ignored by command-style kinds. SQL kinds ignore it;
    /// their database comes from the connection config, or from a `USE`
    /// statement inside the script where the engine supports one.
    async fn execute_query(&self, id: Uuid, target: Option<&str>, query: &str)
    -> Result<ExecOutput>;

    fn is_connected(&self, id: Uuid) -> bool;

    /// Ids with a live session
    fn session_ids(&self) -> Vec<Uuid>;

    /// Close every live session, tolerating individual failures
    async fn disconnect_all(&self) {
        for id in self.session_ids() {
            if let Err(e) = self.disconnect(id).await {
                tracing::warn!(kind = %self.kind(), connection_id = %id, error = %e, "failed to close session during teardown");
            }
        }
    }
}

/// Per-provider map from connection id to live session
///
/// Each mutation touches exactly one id under the write lock, so concurrent
/// connects for different ids never collide.
pub struct Sessions<S> {
    inner: RwLock<HashMap<Uuid, Arc<S>>>,
}

impl<S> Sessions<S> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session, returning any session it replaced
    pub fn insert(&self, id: Uuid, session: S) -> Option<Arc<S>> {
        self.inner.write().insert(id, Arc::new(session))
    }

    pub fn remove(&self, id: Uuid) -> Option<Arc<S>> {
        self.inner.write().remove(&id)
    }

    /// Session for `id`, or `NotConnected`
    pub fn get(&self, id: Uuid) -> Result<Arc<S>> {
        self.inner.read().get(&id).cloned().ok_or_else(|| {
            ConduitError::NotConnected(format!("connection {} has no live session", id))
        })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.read().contains_key(&id)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.inner.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<S> Default for Sessions<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bound a connect attempt by `CONNECT_TIMEOUT`
pub async fn with_connect_timeout<T, F>(kind: ProtocolKind, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    with_timeout(kind, CONNECT_TIMEOUT, fut).await
}

/// Bound a connect attempt by an explicit duration
pub async fn with_timeout<T, F>(kind: ProtocolKind, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(kind = %kind, timeout_secs = limit.as_secs(), "connect timed out");
            Err(ConduitError::Connect(format!(
                "{} connection timed out after {}s",
                kind.display_name(),
                limit.as_secs()
            )))
        }
    }
}

/// Run a blocking native-client call off the async executor
pub async fn run_blocking<T, F>(what: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConduitError::Exec(format!("{} task failed: {}", what, e)))?
}

/// Port to dial, or a validation error for kinds that need one
pub fn require_port(config: &ConnectionConfig, endpoint: &Endpoint) -> Result<u16> {
    if endpoint.port > 0 {
        Ok(endpoint.port)
    } else {
        Err(ConduitError::Validation(format!(
            "{} connection '{}' has no port",
            config.kind.display_name(),
            config.name
        )))
    }
}
