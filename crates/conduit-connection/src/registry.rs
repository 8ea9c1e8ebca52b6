//! The connection broker
//!
//! `ConnectionRegistry` owns every saved config, the ephemeral status of
//! each connection, and the routing from a connection id to the provider
//! that serves its kind. Callers execute queries by id and never see
//! provider sessions or tunnels.

use chrono::Utc;
use conduit_core::{
    ConduitError, ConnectionConfig, ConnectionProvider, ConnectionStatus, ConnectionUpdate,
    Credential, Endpoint, ExecOutput, ExecutionRecord, MetadataNode, NoopQueryLogger, QueryLogger,
    Result,
};
use conduit_providers::ProviderRegistry;
use conduit_tunnel::{TunnelManager, TunnelSpec};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::store::{ConfigStore, StoredState};
use crate::validation::{credential_optional, validate_config};
use crate::{ConnectionMetadata, KeyringSecretStore, SecretStore};

type ConnectLock = Arc<tokio::sync::Mutex<()>>;

/// Holds the per-id lock; the map entry goes away with the last holder
struct ConnectGuard<'a> {
    locks: &'a Mutex<HashMap<Uuid, ConnectLock>>,
    id: Uuid,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        // only the map's own reference left: nobody holds or waits on it
        if locks.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.id);
        }
    }
}

impl StoredState {
    pub(crate) fn find(&self, id: Uuid) -> Option<&ConnectionConfig> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub(crate) fn metadata_mut(&mut self, id: Uuid) -> Result<&mut ConnectionMetadata> {
        if self.find(id).is_none() {
            return Err(ConduitError::NotFound(format!("connection {}", id)));
        }
        let index = match self.metadata.iter().position(|m| m.connection_id == id) {
            Some(index) => index,
            None => {
                self.metadata.push(ConnectionMetadata::new(id));
                self.metadata.len() - 1
            }
        };
        Ok(&mut self.metadata[index])
    }
}

/// Builder for [`ConnectionRegistry`]
///
/// Every collaborator has a production default: keychain secrets, the
/// built-in providers, libssh2 tunnels and no query logging. The config
/// store defaults to in-memory.
#[derive(Default)]
pub struct ConnectionRegistryBuilder {
    store: ConfigStore,
    secrets: Option<Arc<dyn SecretStore>>,
    providers: Option<Arc<ProviderRegistry>>,
    tunnels: Option<Arc<TunnelManager>>,
    logger: Option<Arc<dyn QueryLogger>>,
}

impl ConnectionRegistryBuilder {
    pub fn config_store(mut self, store: ConfigStore) -> Self {
        self.store = store;
        self
    }

    pub fn secret_store(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn tunnels(mut self, tunnels: Arc<TunnelManager>) -> Self {
        self.tunnels = Some(tunnels);
        self
    }

    pub fn query_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Load persisted state and assemble the broker
    ///
    /// Every loaded connection starts disconnected.
    pub async fn build(self) -> ConnectionRegistry {
        let mut state = self.store.load().await;
        let known: Vec<Uuid> = state.connections.iter().map(|c| c.id).collect();
        state.metadata.retain(|m| known.contains(&m.connection_id));

        let statuses = known
            .iter()
            .map(|id| (*id, ConnectionStatus::disconnected()))
            .collect();

        ConnectionRegistry {
            state: RwLock::new(state),
            statuses: RwLock::new(statuses),
            connect_locks: Mutex::new(HashMap::new()),
            persist_lock: tokio::sync::Mutex::new(()),
            store: self.store,
            secrets: self
                .secrets
                .unwrap_or_else(|| Arc::new(KeyringSecretStore::new())),
            providers: self
                .providers
                .unwrap_or_else(|| Arc::new(ProviderRegistry::with_defaults())),
            tunnels: self.tunnels.unwrap_or_else(|| Arc::new(TunnelManager::new())),
            logger: self.logger.unwrap_or_else(|| Arc::new(NoopQueryLogger)),
        }
    }
}

/// Saved connections, their live status, and routing to providers
pub struct ConnectionRegistry {
    pub(crate) state: RwLock<StoredState>,
    statuses: RwLock<HashMap<Uuid, ConnectionStatus>>,
    /// At most one connect or disconnect in flight per id
    connect_locks: Mutex<HashMap<Uuid, ConnectLock>>,
    persist_lock: tokio::sync::Mutex<()>,
    store: ConfigStore,
    pub(crate) secrets: Arc<dyn SecretStore>,
    providers: Arc<ProviderRegistry>,
    tunnels: Arc<TunnelManager>,
    logger: Arc<dyn QueryLogger>,
}

impl ConnectionRegistry {
    pub fn builder() -> ConnectionRegistryBuilder {
        ConnectionRegistryBuilder::default()
    }

    pub fn tunnels(&self) -> &Arc<TunnelManager> {
        &self.tunnels
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Serialize connect, disconnect and delete for one id
    async fn lock_connection(&self, id: Uuid) -> ConnectGuard<'_> {
        let lock = self.connect_locks.lock().entry(id).or_default().clone();
        let mut guard = ConnectGuard {
            locks: &self.connect_locks,
            id,
            guard: None,
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    #[cfg(test)]
    pub(crate) fn connect_lock_count(&self) -> usize {
        self.connect_locks.lock().len()
    }

    fn require(&self, id: Uuid) -> Result<ConnectionConfig> {
        self.get_connection(id)
            .ok_or_else(|| ConduitError::NotFound(format!("connection {}", id)))
    }

    fn update_status(&self, id: Uuid, f: impl FnOnce(&mut ConnectionStatus)) {
        f(self.statuses.write().entry(id).or_default());
    }

    /// Write the current state to the config store
    ///
    /// Snapshots are taken under the persist lock so saves land in order.
    pub(crate) async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.state.read().clone();
        self.store.save(&snapshot).await
    }

    // ---- configuration ----

    /// Validate and save a new connection, then store its credential
    #[tracing::instrument(skip(self, config, credential), fields(connection_id = %config.id, kind = %config.kind))]
    pub async fn add_connection(
        &self,
        config: ConnectionConfig,
        credential: Option<Credential>,
    ) -> Result<Uuid> {
        validate_config(&config)?;
        let id = config.id;
        let summary = config.summary();
        {
            let mut state = self.state.write();
            if state.find(id).is_some() {
                return Err(ConduitError::Validation(format!(
                    "connection {} already exists",
                    id
                )));
            }
            state.connections.push(config);
            state.metadata.push(ConnectionMetadata::new(id));
        }
        self.statuses
            .write()
            .insert(id, ConnectionStatus::disconnected());
        self.persist().await?;

        if let Some(credential) = credential {
            self.secrets.store(id, &credential).await?;
        }
        tracing::info!(target = %summary, "connection added");
        Ok(id)
    }

    /// Change mutable fields and optionally replace the credential
    ///
    /// A live session keeps its old settings until the next connect.
    #[tracing::instrument(skip(self, update, credential), fields(connection_id = %id))]
    pub async fn update_connection(
        &self,
        id: Uuid,
        update: ConnectionUpdate,
        credential: Option<Credential>,
    ) -> Result<ConnectionConfig> {
        let mut updated = self.require(id)?;
        update.apply_to(&mut updated);
        validate_config(&updated)?;
        {
            let mut state = self.state.write();
            let slot = state
                .connections
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| ConduitError::NotFound(format!("connection {}", id)))?;
            *slot = updated.clone();
        }
        self.persist().await?;

        if let Some(credential) = credential {
            self.secrets.store(id, &credential).await?;
        }
        tracing::info!(target = %updated.summary(), "connection updated");
        Ok(updated)
    }

    /// Disconnect, forget the config, then drop the stored credential
    ///
    /// The order matters: the provider session is closed while its
    /// credential still exists, and no state ever shows a connected id
    /// without one.
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn delete_connection(&self, id: Uuid) -> Result<()> {
        let _guard = self.lock_connection(id).await;
        let config = self.require(id)?;
        self.teardown(&config).await;

        {
            let mut state = self.state.write();
            state.connections.retain(|c| c.id != id);
            state.metadata.retain(|m| m.connection_id != id);
        }
        self.statuses.write().remove(&id);
        self.persist().await?;
        self.secrets.delete(id).await?;
        tracing::info!("connection deleted");
        Ok(())
    }

    /// Copy a connection and its credential under a new id
    pub async fn duplicate_connection(&self, id: Uuid) -> Result<ConnectionConfig> {
        let source = self.require(id)?;
        let mut copy = source.clone();
        copy.id = Uuid::new_v4();
        copy.name = format!("{} (copy)", source.name);
        copy.created_at = Utc::now();

        let credential = self.secrets.get(id).await?;
        let group = self.metadata(id).and_then(|m| m.group_id);
        self.add_connection(copy.clone(), credential).await?;
        if group.is_some() {
            self.assign_group(copy.id, group).await?;
        }
        Ok(copy)
    }

    pub fn get_connection(&self, id: Uuid) -> Option<ConnectionConfig> {
        self.state.read().find(id).cloned()
    }

    /// Saved connections in insertion order
    pub fn list_connections(&self) -> Vec<ConnectionConfig> {
        self.state.read().connections.clone()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ConnectionConfig> {
        self.state
            .read()
            .connections
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub async fn has_credentials(&self, id: Uuid) -> Result<bool> {
        self.secrets.has(id).await
    }

    // ---- lifecycle ----

    pub fn provider_for_connection(&self, id: Uuid) -> Result<Arc<dyn ConnectionProvider>> {
        let config = self.require(id)?;
        self.providers.get(config.kind)
    }

    /// Open a session for a saved connection
    ///
    /// Concurrent calls for one id are serialized; the second finds the
    /// session already open and returns. Any failure is recorded in the
    /// connection's status and returned.
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn connect(&self, id: Uuid) -> Result<()> {
        let _guard = self.lock_connection(id).await;

        let config = self.require(id)?;
        let result = match self.providers.get(config.kind) {
            Ok(provider) if provider.is_connected(id) => {
                tracing::debug!("already connected");
                Ok(())
            }
            Ok(provider) => self.open_session(&config, provider.as_ref()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.update_status(id, |status| {
                    if !status.connected {
                        status.mark_connected();
                    }
                });
                tracing::info!(kind = %config.kind, target = %config.summary(), "connected");
                Ok(())
            }
            Err(e) => {
                tracing::error!(kind = %config.kind, error = %e, "connect failed");
                self.update_status(id, |status| status.mark_failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn open_session(
        &self,
        config: &ConnectionConfig,
        provider: &dyn ConnectionProvider,
    ) -> Result<()> {
        let credential = self.credential_for(config).await?;
        let endpoint = self.endpoint_for(config.id, config, &credential).await?;

        if let Err(e) = provider.connect(config, &credential, &endpoint).await {
            if config.ssh_tunnel.is_some() {
                self.close_tunnel_quietly(config.id).await;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn credential_for(&self, config: &ConnectionConfig) -> Result<Credential> {
        match self.secrets.get(config.id).await? {
            Some(credential) => Ok(credential),
            None if credential_optional(config.kind) => Ok(Credential::default()),
            None => Err(ConduitError::MissingCredentials),
        }
    }

    /// Address the provider dials: the config's own, or a tunnel listener
    async fn endpoint_for(
        &self,
        tunnel_id: Uuid,
        config: &ConnectionConfig,
        credential: &Credential,
    ) -> Result<Endpoint> {
        let Some(spec) = TunnelSpec::for_connection(config)? else {
            return Ok(config.direct_endpoint());
        };
        let local_port = self.tunnels.create_tunnel(tunnel_id, spec, credential).await?;
        tracing::debug!(local_port, "routing through SSH tunnel");
        Ok(Endpoint::local(local_port))
    }

    async fn close_tunnel_quietly(&self, tunnel_id: Uuid) {
        if let Err(e) = self.tunnels.close_tunnel(tunnel_id).await {
            tracing::warn!(tunnel_id = %tunnel_id, error = %e, "failed to close SSH tunnel");
        }
    }

    /// Best-effort close of the session and tunnel for `config`
    async fn teardown(&self, config: &ConnectionConfig) {
        if self.providers.is_loaded(config.kind) {
            match self.providers.get(config.kind) {
                Ok(provider) => {
                    if let Err(e) = provider.disconnect(config.id).await {
                        tracing::warn!(connection_id = %config.id, error = %e, "provider disconnect failed, marking disconnected anyway");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "no provider to disconnect from"),
            }
        }
        self.close_tunnel_quietly(config.id).await;
    }

    /// Close the session for `id`; always ends disconnected
    ///
    /// Calling it for an id with no session, or an unknown id, is a no-op.
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn disconnect(&self, id: Uuid) -> Result<()> {
        let _guard = self.lock_connection(id).await;

        let Some(config) = self.get_connection(id) else {
            tracing::debug!("disconnect for unknown connection ignored");
            return Ok(());
        };
        self.teardown(&config).await;
        self.update_status(id, ConnectionStatus::mark_disconnected);
        tracing::info!("disconnected");
        Ok(())
    }

    /// Open and close a session for an unsaved config
    ///
    /// Tunnelled configs get a throwaway tunnel that is closed afterwards.
    /// Nothing is registered and no status changes.
    #[tracing::instrument(skip(self, config, credential), fields(kind = %config.kind))]
    pub async fn test_connection(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
    ) -> Result<bool> {
        validate_config(config)?;
        let provider = self.providers.get(config.kind)?;
        let trial_id = Uuid::new_v4();
        let endpoint = self.endpoint_for(trial_id, config, credential).await?;

        let result = provider.test_connection(config, credential, &endpoint).await;
        if config.ssh_tunnel.is_some() {
            self.close_tunnel_quietly(trial_id).await;
        }
        result
    }

    /// Test a saved connection with its stored credential
    pub async fn test_saved_connection(&self, id: Uuid) -> Result<bool> {
        let config = self.require(id)?;
        let credential = self.credential_for(&config).await?;
        self.test_connection(&config, &credential).await
    }

    // ---- execution ----

    /// Run a query or command on a connected id and log the execution
    #[tracing::instrument(skip(self, query), fields(connection_id = %id))]
    pub async fn execute_query(
        &self,
        id: Uuid,
        target: Option<&str>,
        query: &str,
    ) -> Result<ExecOutput> {
        let config = self.require(id)?;
        let provider = self.providers.get(config.kind)?;
        if !provider.is_connected(id) {
            return Err(ConduitError::NotConnected(format!(
                "'{}' is not connected",
                config.name
            )));
        }

        let started = Instant::now();
        let result = provider.execute_query(id, target, query).await;
        self.logger.record(ExecutionRecord {
            connection_id: id,
            kind: config.kind,
            query: query.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            item_count: result.as_ref().ok().map(ExecOutput::item_count),
            error: result.as_ref().err().map(ToString::to_string),
        });

        if let Err(ConduitError::NotConnected(_)) = &result {
            self.update_status(id, ConnectionStatus::mark_disconnected);
        }
        result
    }

    pub async fn get_metadata(&self, id: Uuid) -> Result<Vec<MetadataNode>> {
        self.provider_for_connection(id)?.get_metadata(id).await
    }

    /// Status of a saved connection
    pub fn status(&self, id: Uuid) -> Option<ConnectionStatus> {
        self.statuses.read().get(&id).cloned()
    }

    pub fn is_connected(&self, id: Uuid) -> bool {
        self.status(id).is_some_and(|s| s.connected)
    }

    /// Close every provider session and tunnel
    ///
    /// One failing close never stops the others.
    pub async fn shutdown(&self) {
        self.providers.shutdown().await;
        let tunnels = self.tunnels.close_all().await;
        for status in self.statuses.write().values_mut() {
            if status.connected {
                status.mark_disconnected();
            }
        }
        tracing::info!(tunnels, "connection broker shut down");
    }
}

#[cfg(test)]
mod tests;
