use super::*;
use crate::{ConnectionGroup, MemorySecretStore, QueryHistory};
use async_trait::async_trait;
use conduit_core::{NodeKind, ProtocolKind, SshTunnelDescriptor};
use conduit_tunnel::{BastionConnector, BastionSession, SshAuth, SshTunnelError};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

type Events = Arc<Mutex<Vec<String>>>;

/// Provider that keeps a set of "open" ids and records every call
struct FakeProvider {
    kind: ProtocolKind,
    open: Mutex<HashSet<Uuid>>,
    events: Events,
    refuse: AtomicBool,
    fail_disconnect: AtomicBool,
    connect_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    connects: AtomicUsize,
    endpoints: Mutex<Vec<Endpoint>>,
}

impl FakeProvider {
    fn new(kind: ProtocolKind, events: Events) -> Self {
        Self {
            kind,
            open: Mutex::new(HashSet::new()),
            events,
            refuse: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            connect_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConnectionProvider for FakeProvider {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().push(endpoint.clone());

        if self.refuse.load(Ordering::SeqCst) {
            return Err(ConduitError::Connect(format!(
                "connection refused by {}",
                endpoint.address()
            )));
        }
        if credential.password.as_deref() == Some("wrong") {
            return Err(ConduitError::Connect("authentication failed".into()));
        }
        self.open.lock().insert(config.id);
        self.events.lock().push("provider.connect".into());
        Ok(())
    }

    async fn disconnect(&self, id: Uuid) -> Result<()> {
        let was_open = self.open.lock().remove(&id);
        if was_open {
            self.events.lock().push("provider.disconnect".into());
        }
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(ConduitError::Exec("socket already gone".into()));
        }
        Ok(())
    }

    async fn test_connection(
        &self,
        _config: &ConnectionConfig,
        _credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<bool> {
        self.endpoints.lock().push(endpoint.clone());
        Ok(!self.refuse.load(Ordering::SeqCst))
    }

    async fn get_metadata(&self, id: Uuid) -> Result<Vec<MetadataNode>> {
        if !self.open.lock().contains(&id) {
            return Err(ConduitError::NotConnected(id.to_string()));
        }
        Ok(vec![MetadataNode::leaf("main", NodeKind::Database)])
    }

    async fn execute_query(
        &self,
        id: Uuid,
        _target: Option<&str>,
        query: &str,
    ) -> Result<ExecOutput> {
        if !self.open.lock().contains(&id) {
            return Err(ConduitError::NotConnected(id.to_string()));
        }
        if query.starts_with("FAIL") {
            return Err(ConduitError::Exec("syntax error".into()));
        }
        Ok(ExecOutput::Text(query.to_uppercase()))
    }

    fn is_connected(&self, id: Uuid) -> bool {
        self.open.lock().contains(&id)
    }

    fn session_ids(&self) -> Vec<Uuid> {
        self.open.lock().iter().copied().collect()
    }
}

/// Secret store that records deletes and what the config file held at the time
struct RecordingSecrets {
    inner: MemorySecretStore,
    events: Events,
    config_path: Option<std::path::PathBuf>,
}

#[async_trait]
impl SecretStore for RecordingSecrets {
    async fn store(&self, id: Uuid, credential: &Credential) -> Result<()> {
        self.inner.store(id, credential).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Credential>> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let on_disk = self
            .config_path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .is_some_and(|content| content.contains(&id.to_string()));
        self.events
            .lock()
            .push(format!("secret.delete (config on disk: {})", on_disk));
        self.inner.delete(id).await
    }

    async fn has(&self, id: Uuid) -> Result<bool> {
        self.inner.has(id).await
    }
}

/// Bastion that accepts every session without forwarding anything
struct StubBastion {
    refuse: bool,
}

struct StubSession;

impl BastionSession for StubSession {
    fn forward(
        &self,
        _local: std::net::TcpStream,
        _target_host: &str,
        _target_port: u16,
        _running: &AtomicBool,
    ) -> std::result::Result<(), SshTunnelError> {
        Ok(())
    }

    fn close(&self) -> std::result::Result<(), SshTunnelError> {
        Ok(())
    }
}

#[async_trait]
impl BastionConnector for StubBastion {
    async fn connect(
        &self,
        spec: &TunnelSpec,
        _auth: SshAuth,
    ) -> std::result::Result<Arc<dyn BastionSession>, SshTunnelError> {
        if self.refuse {
            return Err(SshTunnelError::ConnectionFailed {
                host: spec.ssh_host.clone(),
                port: spec.ssh_port,
                reason: "connection refused".into(),
            });
        }
        Ok(Arc::new(StubSession))
    }
}

struct Harness {
    registry: Arc<ConnectionRegistry>,
    provider: Arc<FakeProvider>,
    secrets: Arc<RecordingSecrets>,
    history: Arc<QueryHistory>,
    events: Events,
    _dir: tempfile::TempDir,
}

async fn harness_with(provider: FakeProvider, refuse_bastion: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("connections.json");
    let events = provider.events.clone();
    let provider = Arc::new(provider);
    let factory_provider = provider.clone();
    let secrets = Arc::new(RecordingSecrets {
        inner: MemorySecretStore::new(),
        events: events.clone(),
        config_path: Some(path.clone()),
    });
    let history = Arc::new(QueryHistory::new());

    let registry = ConnectionRegistry::builder()
        .config_store(ConfigStore::at(&path))
        .secret_store(secrets.clone())
        .providers(Arc::new(ProviderRegistry::with_factory(Box::new(
            move |kind| match kind {
                ProtocolKind::Postgres | ProtocolKind::Sqlite | ProtocolKind::Docker => {
                    Ok(factory_provider.clone() as Arc<dyn ConnectionProvider>)
                }
                other => Err(ConduitError::ProviderUnavailable(other)),
            },
        ))))
        .tunnels(Arc::new(TunnelManager::with_connector(Arc::new(
            StubBastion {
                refuse: refuse_bastion,
            },
        ))))
        .query_logger(history.clone())
        .build()
        .await;

    Harness {
        registry: Arc::new(registry),
        provider,
        secrets,
        history,
        events,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with(FakeProvider::new(ProtocolKind::Postgres, Events::default()), false).await
}

fn postgres_config() -> ConnectionConfig {
    ConnectionConfig::new("orders", ProtocolKind::Postgres)
        .with_host("localhost")
        .with_port(5432)
        .with_database("testdb")
        .with_username("u")
}

#[rstest::rstest]
#[case(ConnectionConfig::new("pg", ProtocolKind::Postgres).with_host("h"))]
#[case(ConnectionConfig::new("mongo", ProtocolKind::Mongodb).with_host("h"))]
#[case(ConnectionConfig::new("file", ProtocolKind::Sqlite).with_database("/tmp/a.db"))]
#[case(ConnectionConfig::new("docker", ProtocolKind::Docker))]
#[case(ConnectionConfig::new("box", ProtocolKind::Sftp).with_host("h").with_username("u"))]
#[tokio::test]
async fn test_saved_config_never_holds_secrets(#[case] config: ConnectionConfig) {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(config, Some(Credential::password("hunter2").with_ssh_password("b4stion")))
        .await
        .unwrap();

    let saved = serde_json::to_string(&h.registry.get_connection(id).unwrap()).unwrap();
    assert!(!saved.contains("hunter2"));
    assert!(!saved.contains("password"));
    assert!(!saved.contains("privateKey"));

    let path = h.registry.store.path().unwrap().to_path_buf();
    let on_disk = std::fs::read_to_string(path).unwrap();
    assert!(on_disk.contains(&id.to_string()));
    assert!(!on_disk.contains("hunter2"));
    assert!(!on_disk.contains("b4stion"));
}

#[tokio::test]
async fn test_add_rejects_invalid_config_before_any_io() {
    let h = harness().await;
    let config = ConnectionConfig::new("no host", ProtocolKind::Postgres);
    let id = config.id;
    let err = h
        .registry
        .add_connection(config, Some(Credential::password("p")))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
    assert!(h.registry.get_connection(id).is_none());
    assert!(!h.secrets.has(id).await.unwrap());
}

#[tokio::test]
async fn test_connect_execute_disconnect() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();
    assert_eq!(h.registry.status(id), Some(ConnectionStatus::disconnected()));

    h.registry.connect(id).await.unwrap();
    let status = h.registry.status(id).unwrap();
    assert!(status.connected);
    assert!(status.last_connected.is_some());
    assert_eq!(
        h.provider.endpoints.lock().last().cloned(),
        Some(Endpoint::new("localhost", 5432))
    );

    let output = h.registry.execute_query(id, None, "select 1").await.unwrap();
    assert_eq!(output, ExecOutput::Text("SELECT 1".into()));
    let metadata = h.registry.get_metadata(id).await.unwrap();
    assert_eq!(metadata[0].name, "main");

    h.registry.disconnect(id).await.unwrap();
    assert!(!h.registry.is_connected(id));
    assert!(!h.provider.is_connected(id));
}

#[tokio::test]
async fn test_execute_requires_live_session() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();

    let err = h
        .registry
        .execute_query(id, None, "select 1")
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::NotConnected(_)), "{}", err);
    assert!(h.history.is_empty());
}

#[tokio::test]
async fn test_exec_error_leaves_status_and_is_logged() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();
    h.registry.connect(id).await.unwrap();

    let err = h
        .registry
        .execute_query(id, None, "FAIL now")
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Exec(_)));
    assert!(h.registry.is_connected(id));

    h.registry.execute_query(id, None, "ok").await.unwrap();
    let recent = h.history.recent();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].success);
    assert_eq!(recent[0].item_count, Some(1));
    assert!(!recent[1].success);
    assert_eq!(recent[1].connection_id, id);
}

#[tokio::test]
async fn test_connect_failure_is_recorded_and_leaves_no_session() {
    let provider = FakeProvider::new(ProtocolKind::Postgres, Events::default());
    provider.refuse.store(true, Ordering::SeqCst);
    let h = harness_with(provider, false).await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();

    let err = h.registry.connect(id).await.unwrap_err();
    assert!(matches!(err, ConduitError::Connect(_)));

    let status = h.registry.status(id).unwrap();
    assert!(!status.connected);
    assert!(status.error.as_deref().unwrap().contains("refused"));
    assert!(!h.provider.is_connected(id));
    assert!(h.provider.session_ids().is_empty());
}

#[tokio::test]
async fn test_auth_failure_never_echoes_secret() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("wrong")))
        .await
        .unwrap();

    let err = h.registry.connect(id).await.unwrap_err();
    assert!(!err.to_string().contains("wrong"));
    let status = h.registry.status(id).unwrap();
    assert!(!status.error.unwrap().contains("wrong"));
}

#[tokio::test]
async fn test_missing_credentials_fail_fast() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), None)
        .await
        .unwrap();

    let err = h.registry.connect(id).await.unwrap_err();
    assert!(matches!(err, ConduitError::MissingCredentials));
    assert_eq!(h.provider.connects.load(Ordering::SeqCst), 0);
    let status = h.registry.status(id).unwrap();
    assert!(status.error.unwrap().contains("re-enter credentials"));
}

#[tokio::test]
async fn test_credential_free_kinds_connect_without_secret() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(ConnectionConfig::new("local docker", ProtocolKind::Docker), None)
        .await
        .unwrap();
    h.registry.connect(id).await.unwrap();
    assert!(h.registry.is_connected(id));
}

#[tokio::test]
async fn test_provider_unavailable_is_isolated() {
    let h = harness().await;
    let mongo = h
        .registry
        .add_connection(
            ConnectionConfig::new("docs", ProtocolKind::Mongodb).with_host("h"),
            Some(Credential::password("p")),
        )
        .await
        .unwrap();
    let pg = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();

    let err = h.registry.connect(mongo).await.unwrap_err();
    assert_eq!(err.to_string(), "Provider unavailable for kind mongodb");
    assert!(h.registry.status(mongo).unwrap().error.is_some());

    h.registry.connect(pg).await.unwrap();
    assert!(h.registry.is_connected(pg));
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let provider = FakeProvider::new(ProtocolKind::Postgres, Events::default());
    provider.fail_disconnect.store(true, Ordering::SeqCst);
    let h = harness_with(provider, false).await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();
    h.registry.connect(id).await.unwrap();

    h.registry.disconnect(id).await.unwrap();
    let first = h.registry.status(id).unwrap();
    h.registry.disconnect(id).await.unwrap();
    let second = h.registry.status(id).unwrap();

    assert_eq!(first, second);
    assert!(!second.connected);
    assert!(second.error.is_none());

    // unknown ids are a no-op too
    h.registry.disconnect(Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn test_connect_locks_do_not_accumulate() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();

    for _ in 0..5 {
        h.registry.disconnect(Uuid::new_v4()).await.unwrap();
        assert!(h.registry.delete_connection(Uuid::new_v4()).await.is_err());
    }
    h.registry.connect(id).await.unwrap();
    h.registry.disconnect(id).await.unwrap();

    assert_eq!(h.registry.connect_lock_count(), 0);
}

#[tokio::test]
async fn test_delete_orders_disconnect_config_secret() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();
    h.registry.connect(id).await.unwrap();

    h.registry.delete_connection(id).await.unwrap();

    let events = h.events.lock().clone();
    assert_eq!(
        events,
        vec![
            "provider.connect".to_string(),
            "provider.disconnect".to_string(),
            "secret.delete (config on disk: false)".to_string(),
        ]
    );
    assert!(h.registry.get_connection(id).is_none());
    assert!(h.registry.status(id).is_none());
    assert!(!h.secrets.has(id).await.unwrap());
    assert!(!h.provider.is_connected(id));
}

#[tokio::test]
async fn test_concurrent_connects_are_serialized() {
    let mut provider = FakeProvider::new(ProtocolKind::Postgres, Events::default());
    provider.connect_delay = Duration::from_millis(50);
    let h = harness_with(provider, false).await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();

    let a = tokio::spawn({
        let registry = h.registry.clone();
        async move { registry.connect(id).await }
    });
    let b = tokio::spawn({
        let registry = h.registry.clone();
        async move { registry.connect(id).await }
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(h.provider.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.provider.connects.load(Ordering::SeqCst), 1);
    assert!(h.registry.is_connected(id));
}

#[tokio::test]
async fn test_update_keeps_kind_and_replaces_credential() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("old")))
        .await
        .unwrap();

    let update = ConnectionUpdate {
        name: Some("orders-replica".into()),
        port: Some(Some(6432)),
        ..Default::default()
    };
    let updated = h
        .registry
        .update_connection(id, update, Some(Credential::password("new")))
        .await
        .unwrap();
    assert_eq!(updated.kind, ProtocolKind::Postgres);
    assert_eq!(updated.port, Some(6432));
    assert_eq!(h.registry.get_connection(id).unwrap().name, "orders-replica");
    assert_eq!(
        h.secrets.get(id).await.unwrap().unwrap().password.as_deref(),
        Some("new")
    );

    let clear_host = ConnectionUpdate {
        host: Some(None),
        ..Default::default()
    };
    assert!(matches!(
        h.registry.update_connection(id, clear_host, None).await,
        Err(ConduitError::Validation(_))
    ));
    assert_eq!(
        h.registry.get_connection(id).unwrap().host.as_deref(),
        Some("localhost")
    );
}

#[tokio::test]
async fn test_state_survives_reload() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();
    let group = h.registry.create_group("Production").await.unwrap();
    h.registry.assign_group(id, Some(group.id)).await.unwrap();
    h.registry.set_favorite(id, true).await.unwrap();
    h.registry.connect(id).await.unwrap();

    let path = h.registry.store.path().unwrap().to_path_buf();
    let reloaded = ConnectionRegistry::builder()
        .config_store(ConfigStore::at(&path))
        .secret_store(Arc::new(MemorySecretStore::new()))
        .providers(Arc::new(ProviderRegistry::with_factory(Box::new(|kind| {
            Err(ConduitError::ProviderUnavailable(kind))
        }))))
        .build()
        .await;

    assert_eq!(reloaded.list_connections(), h.registry.list_connections());
    assert_eq!(reloaded.list_groups(), vec![group.clone()]);
    let meta = reloaded.metadata(id).unwrap();
    assert_eq!(meta.group_id, Some(group.id));
    assert!(meta.favorite);
    // status is never persisted
    assert_eq!(reloaded.status(id), Some(ConnectionStatus::disconnected()));
}

#[tokio::test]
async fn test_groups_and_favorites() {
    let h = harness().await;
    let a = h
        .registry
        .add_connection(postgres_config(), None)
        .await
        .unwrap();
    let b = h
        .registry
        .add_connection(postgres_config().with_port(5433), None)
        .await
        .unwrap();

    let group: ConnectionGroup = h.registry.create_group("  Staging ").await.unwrap();
    assert_eq!(group.name, "Staging");
    assert!(h.registry.create_group("Staging").await.is_err());
    assert!(h.registry.create_group(" ").await.is_err());

    h.registry.assign_group(a, Some(group.id)).await.unwrap();
    h.registry.assign_group(b, Some(group.id)).await.unwrap();
    assert_eq!(h.registry.connections_in_group(group.id), vec![a, b]);
    assert!(matches!(
        h.registry.assign_group(a, Some(Uuid::new_v4())).await,
        Err(ConduitError::NotFound(_))
    ));

    h.registry.rename_group(group.id, "QA").await.unwrap();
    assert_eq!(h.registry.list_groups()[0].name, "QA");

    h.registry.set_favorite(b, true).await.unwrap();
    assert_eq!(h.registry.favorites(), vec![b]);

    h.registry.delete_group(group.id).await.unwrap();
    assert!(h.registry.list_groups().is_empty());
    assert_eq!(h.registry.metadata(a).unwrap().group_id, None);
    assert!(h.registry.metadata(b).unwrap().favorite);
    assert!(h.registry.metadata(Uuid::new_v4()).is_none());
}

#[tokio::test]
async fn test_duplicate_copies_config_and_credential() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();
    let group = h.registry.create_group("Prod").await.unwrap();
    h.registry.assign_group(id, Some(group.id)).await.unwrap();

    let copy = h.registry.duplicate_connection(id).await.unwrap();
    assert_ne!(copy.id, id);
    assert_eq!(copy.name, "orders (copy)");
    assert_eq!(copy.host.as_deref(), Some("localhost"));
    assert_eq!(
        h.secrets.get(copy.id).await.unwrap().unwrap().password.as_deref(),
        Some("p")
    );
    assert_eq!(h.registry.metadata(copy.id).unwrap().group_id, Some(group.id));
    assert_eq!(h.registry.list_connections().len(), 2);
}

#[tokio::test]
async fn test_tunnelled_connect_dials_local_listener() {
    let h = harness().await;
    let config = postgres_config()
        .with_host("10.0.0.5")
        .with_ssh_tunnel(SshTunnelDescriptor::new("bastion.internal", "ops"));
    let id = h
        .registry
        .add_connection(config, Some(Credential::password("p").with_ssh_password("b")))
        .await
        .unwrap();

    h.registry.connect(id).await.unwrap();
    let local_port = h.registry.tunnels().local_port(id).await.unwrap();
    assert_eq!(
        h.provider.endpoints.lock().last().cloned(),
        Some(Endpoint::local(local_port))
    );

    h.registry.disconnect(id).await.unwrap();
    assert!(!h.registry.tunnels().has_tunnel(id).await);
}

#[tokio::test]
async fn test_bastion_failure_is_tunnel_error() {
    let h = harness_with(FakeProvider::new(ProtocolKind::Postgres, Events::default()), true).await;
    let config = postgres_config().with_ssh_tunnel(SshTunnelDescriptor::new("bastion", "ops"));
    let id = h
        .registry
        .add_connection(config, Some(Credential::password("p")))
        .await
        .unwrap();

    let err = h.registry.connect(id).await.unwrap_err();
    assert!(matches!(err, ConduitError::Tunnel(_)), "{}", err);
    let status = h.registry.status(id).unwrap();
    assert!(!status.connected);
    assert!(status.error.unwrap().contains("SSH"));
    assert_eq!(h.provider.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_provider_connect_releases_tunnel() {
    let provider = FakeProvider::new(ProtocolKind::Postgres, Events::default());
    provider.refuse.store(true, Ordering::SeqCst);
    let h = harness_with(provider, false).await;
    let config = postgres_config().with_ssh_tunnel(SshTunnelDescriptor::new("bastion", "ops"));
    let id = h
        .registry
        .add_connection(config, Some(Credential::password("p")))
        .await
        .unwrap();

    assert!(h.registry.connect(id).await.is_err());
    assert!(!h.registry.tunnels().has_tunnel(id).await);
}

#[tokio::test]
async fn test_test_connection_registers_nothing() {
    let h = harness().await;
    let config = postgres_config().with_ssh_tunnel(SshTunnelDescriptor::new("bastion", "ops"));

    let ok = h
        .registry
        .test_connection(&config, &Credential::password("p"))
        .await
        .unwrap();
    assert!(ok);
    assert!(h.registry.list_connections().is_empty());
    assert!(h.provider.session_ids().is_empty());
    assert_eq!(h.registry.tunnels().accept_loop_count(), 0);
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let h = harness().await;
    let plain = h
        .registry
        .add_connection(postgres_config(), Some(Credential::password("p")))
        .await
        .unwrap();
    let tunnelled = h
        .registry
        .add_connection(
            postgres_config().with_ssh_tunnel(SshTunnelDescriptor::new("bastion", "ops")),
            Some(Credential::password("p")),
        )
        .await
        .unwrap();
    h.registry.connect(plain).await.unwrap();
    h.registry.connect(tunnelled).await.unwrap();

    h.registry.shutdown().await;

    assert!(h.provider.session_ids().is_empty());
    assert!(!h.registry.tunnels().has_tunnel(tunnelled).await);
    assert!(!h.registry.is_connected(plain));
    assert!(!h.registry.is_connected(tunnelled));
}

#[tokio::test]
async fn test_saved_connection_uses_stored_credential() {
    let h = harness().await;
    let id = h
        .registry
        .add_connection(postgres_config(), None)
        .await
        .unwrap();
    assert!(matches!(
        h.registry.test_saved_connection(id).await,
        Err(ConduitError::MissingCredentials)
    ));

    h.secrets.store(id, &Credential::password("p")).await.unwrap();
    assert!(h.registry.test_saved_connection(id).await.unwrap());
    assert!(!h.registry.is_connected(id));
}
