//! Active tunnel bookkeeping
//!
//! At most one tunnel exists per connection id. Each id has its own async
//! slot, so creating or closing a tunnel for one id never waits on another.

use async_trait::async_trait;
use conduit_core::{ConduitError, ConnectionConfig, Credential, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Ssh2Connector, SshAuth, SshTunnelError};

/// Bastion and forward target for one tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub target_host: String,
    pub target_port: u16,
}

impl TunnelSpec {
    /// Tunnel needed by `config`, if it routes through a bastion
    ///
    /// The target is the config's own host/port as seen from the bastion.
    pub fn for_connection(config: &ConnectionConfig) -> Result<Option<Self>> {
        let Some(tunnel) = &config.ssh_tunnel else {
            return Ok(None);
        };
        let target_port = config.effective_port().ok_or_else(|| {
            ConduitError::Validation(format!(
                "{} connections cannot be tunnelled without a port",
                config.kind.display_name()
            ))
        })?;
        Ok(Some(Self {
            ssh_host: tunnel.host.clone(),
            ssh_port: tunnel.port,
            ssh_user: tunnel.username.clone(),
            target_host: config.effective_host(),
            target_port,
        }))
    }
}

/// An authenticated bastion session that can forward sockets
pub trait BastionSession: Send + Sync + 'static {
    /// Open a channel to the target and pipe `local` through it
    ///
    /// Blocks until either side closes. On error the local socket is
    /// dropped, closing just that connection.
    fn forward(
        &self,
        local: TcpStream,
        target_host: &str,
        target_port: u16,
        running: &AtomicBool,
    ) -> std::result::Result<(), SshTunnelError>;

    /// End the session
    fn close(&self) -> std::result::Result<(), SshTunnelError>;
}

/// Establishes bastion sessions
#[async_trait]
pub trait BastionConnector: Send + Sync {
    async fn connect(
        &self,
        spec: &TunnelSpec,
        auth: SshAuth,
    ) -> std::result::Result<Arc<dyn BastionSession>, SshTunnelError>;
}

struct ActiveTunnel {
    spec: TunnelSpec,
    local_port: u16,
    session: Arc<dyn BastionSession>,
    running: Arc<AtomicBool>,
    stop_tx: oneshot::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl ActiveTunnel {
    /// Stop the listener, then end the SSH session
    ///
    /// The local port is released before the session close is attempted,
    /// so a failing close never leaks the listener.
    async fn shutdown(self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(());
        if let Err(e) = self.accept_task.await {
            warn!(local_port = self.local_port, error = %e, "tunnel accept task ended abnormally");
        }
        debug!(local_port = self.local_port, "tunnel listener released");

        let session = self.session;
        tokio::task::spawn_blocking(move || session.close())
            .await
            .map_err(|e| ConduitError::Tunnel(format!("SSH close task failed: {}", e)))?
            .map_err(ConduitError::from)
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<ActiveTunnel>>>;

/// Owns every active SSH tunnel, keyed by connection id
pub struct TunnelManager {
    connector: Arc<dyn BastionConnector>,
    slots: Mutex<HashMap<Uuid, Slot>>,
    accept_loops: Arc<AtomicUsize>,
}

impl TunnelManager {
    /// Create a manager that dials bastions with libssh2
    pub fn new() -> Self {
        Self::with_connector(Arc::new(Ssh2Connector))
    }

    pub fn with_connector(connector: Arc<dyn BastionConnector>) -> Self {
        Self {
            connector,
            slots: Mutex::new(HashMap::new()),
            accept_loops: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn slot(&self, id: Uuid) -> Slot {
        self.slots.lock().entry(id).or_default().clone()
    }

    /// Drop a slot that never received a tunnel
    fn discard_empty_slot(&self, id: Uuid, slot: &Slot) {
        let mut slots = self.slots.lock();
        let unused = slots.get(&id).is_some_and(|s| Arc::ptr_eq(s, slot))
            && slot.try_lock().map(|t| t.is_none()).unwrap_or(false);
        if unused {
            slots.remove(&id);
        }
    }

    /// Open a tunnel for `id`, or return the port of the existing one
    #[tracing::instrument(skip(self, spec, credential), fields(connection_id = %id, ssh_host = %spec.ssh_host, target = %format!("{}:{}", spec.target_host, spec.target_port)))]
    pub async fn create_tunnel(&self, id: Uuid, spec: TunnelSpec, credential: &Credential) -> Result<u16> {
        let slot = self.slot(id);
        let result = {
            let mut guard = slot.lock().await;
            if let Some(existing) = guard.as_ref() {
                if existing.spec != spec {
                    warn!(local_port = existing.local_port, "tunnel already open with a different target, reusing it");
                }
                debug!(local_port = existing.local_port, "reusing existing tunnel");
                return Ok(existing.local_port);
            }

            match self.establish(spec, credential).await {
                Ok(tunnel) => {
                    let port = tunnel.local_port;
                    *guard = Some(tunnel);
                    Ok(port)
                }
                Err(e) => Err(e),
            }
        };

        if result.is_err() {
            self.discard_empty_slot(id, &slot);
        }
        result
    }

    async fn establish(&self, spec: TunnelSpec, credential: &Credential) -> Result<ActiveTunnel> {
        let auth = SshAuth::for_bastion(credential);
        let session = self.connector.connect(&spec, auth).await.map_err(|e| {
            tracing::error!(error = %e, "failed to establish SSH session");
            ConduitError::from(e)
        })?;

        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(e) => {
                let session = session.clone();
                let _ = tokio::task::spawn_blocking(move || session.close()).await;
                return Err(SshTunnelError::ListenerFailed(e.to_string()).into());
            }
        };
        let local_port = listener
            .local_addr()
            .map_err(|e| ConduitError::from(SshTunnelError::ListenerFailed(e.to_string())))?
            .port();

        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = oneshot::channel();
        let accept_task = spawn_accept_loop(
            listener,
            session.clone(),
            spec.clone(),
            running.clone(),
            stop_rx,
            self.accept_loops.clone(),
        );

        info!(local_port, "SSH tunnel established");
        Ok(ActiveTunnel {
            spec,
            local_port,
            session,
            running,
            stop_tx,
            accept_task,
        })
    }

    /// Close the tunnel for `id`; returns whether one existed
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn close_tunnel(&self, id: Uuid) -> Result<bool> {
        let Some(slot) = self.slots.lock().remove(&id) else {
            return Ok(false);
        };
        let Some(tunnel) = slot.lock().await.take() else {
            return Ok(false);
        };
        let local_port = tunnel.local_port;
        tunnel.shutdown().await?;
        info!(local_port, "SSH tunnel closed");
        Ok(true)
    }

    /// Close every tunnel, waiting for all of them
    ///
    /// One tunnel failing to close does not stop the others. Returns the
    /// number of tunnels that existed.
    pub async fn close_all(&self) -> usize {
        let ids: Vec<Uuid> = self.slots.lock().keys().copied().collect();
        let results = futures::future::join_all(ids.iter().map(|id| self.close_tunnel(*id))).await;

        let mut closed = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => {
                    closed += 1;
                    warn!(connection_id = %id, error = %e, "tunnel close failed during teardown");
                }
            }
        }
        closed
    }

    /// Local port of the tunnel for `id`
    pub async fn local_port(&self, id: Uuid) -> Option<u16> {
        let slot = self.slots.lock().get(&id).cloned()?;
        let guard = slot.lock().await;
        guard.as_ref().map(|t| t.local_port)
    }

    pub async fn has_tunnel(&self, id: Uuid) -> bool {
        self.local_port(id).await.is_some()
    }

    /// Number of accept loops currently running
    pub fn accept_loop_count(&self) -> usize {
        self.accept_loops.load(Ordering::SeqCst)
    }
}

impl Default for TunnelManager {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_accept_loop(
    listener: TcpListener,
    session: Arc<dyn BastionSession>,
    spec: TunnelSpec,
    running: Arc<AtomicBool>,
    mut stop_rx: oneshot::Receiver<()>,
    accept_loops: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    accept_loops.fetch_add(1, Ordering::SeqCst);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    debug!("tunnel accept loop stopped by request");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("Failed to set TCP_NODELAY: {}", e);
                            }
                            let stream = match stream.into_std() {
                                Ok(stream) => stream,
                                Err(e) => {
                                    warn!(error = %e, "failed to detach accepted socket");
                                    continue;
                                }
                            };
                            debug!(%peer_addr, "accepted tunnel connection");

                            let session = session.clone();
                            let target_host = spec.target_host.clone();
                            let target_port = spec.target_port;
                            let running = running.clone();
                            tokio::task::spawn_blocking(move || {
                                if let Err(e) = session.forward(stream, &target_host, target_port, &running) {
                                    warn!(error = %e, "forwarded connection failed, closed local socket");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "tunnel accept error");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
        drop(listener);
        accept_loops.fetch_sub(1, Ordering::SeqCst);
    })
}
