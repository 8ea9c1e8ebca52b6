//! ssh2-backed bastion sessions
//!
//! libssh2 is a blocking library; every call here runs on a blocking thread.
//! Once a tunnel session is authenticated it is switched to non-blocking
//! mode so many forwarded channels can share it.

use async_trait::async_trait;
use conduit_core::Credential;
use ssh2::{Channel, ErrorCode, Session};
use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::manager::{BastionConnector, BastionSession, TunnelSpec};
use crate::pipe::pipe_bidirectional;
use crate::SshTunnelError;

/// libssh2's "would block" session error
const LIBSSH2_ERROR_EAGAIN: i32 = -37;

const CHANNEL_OPEN_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_SECONDS: u32 = 30;

/// How to authenticate an SSH login
pub enum SshAuth {
    Password(Zeroizing<String>),
    /// PEM key contents, or a path to a key file
    PrivateKey {
        key: Zeroizing<String>,
        passphrase: Option<Zeroizing<String>>,
    },
    Agent,
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuth::Password(_) => write!(f, "SshAuth::Password([REDACTED])"),
            SshAuth::PrivateKey { .. } => write!(f, "SshAuth::PrivateKey([REDACTED])"),
            SshAuth::Agent => write!(f, "SshAuth::Agent"),
        }
    }
}

impl SshAuth {
    fn pick(
        key: Option<&String>,
        passphrase: Option<&String>,
        password: Option<&String>,
    ) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            SshAuth::PrivateKey {
                key: Zeroizing::new(key.clone()),
                passphrase: passphrase.map(|p| Zeroizing::new(p.clone())),
            }
        } else if let Some(password) = password {
            SshAuth::Password(Zeroizing::new(password.clone()))
        } else {
            SshAuth::Agent
        }
    }

    /// Bastion authentication from the connection's SSH secrets
    pub fn for_bastion(credential: &Credential) -> Self {
        Self::pick(
            credential.ssh_private_key.as_ref(),
            credential.ssh_passphrase.as_ref(),
            credential.ssh_password.as_ref(),
        )
    }

    /// Login authentication for SSH/SFTP connections themselves
    pub fn for_login(credential: &Credential) -> Self {
        Self::pick(
            credential.private_key.as_ref(),
            credential.passphrase.as_ref(),
            credential.password.as_ref(),
        )
    }
}

/// Connect, handshake and authenticate a blocking SSH session
pub fn open_ssh_session(
    host: &str,
    port: u16,
    username: &str,
    auth: &SshAuth,
    timeout: Duration,
) -> Result<Session, SshTunnelError> {
    let connection_failed = |reason: String| SshTunnelError::ConnectionFailed {
        host: host.to_string(),
        port,
        reason,
    };

    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| connection_failed(e.to_string()))?
        .next()
        .ok_or_else(|| connection_failed("host did not resolve".to_string()))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| connection_failed(e.to_string()))?;

    let mut session = Session::new().map_err(|e| SshTunnelError::HandshakeFailed(e.to_string()))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis() as u32);
    session
        .handshake()
        .map_err(|e| SshTunnelError::HandshakeFailed(e.to_string()))?;

    authenticate(&mut session, username, auth)?;
    session.set_keepalive(true, KEEPALIVE_SECONDS);
    session.set_timeout(0);

    Ok(session)
}

/// Authenticate using the configured method
fn authenticate(session: &mut Session, username: &str, auth: &SshAuth) -> Result<(), SshTunnelError> {
    let auth_failed = || SshTunnelError::AuthenticationFailed(username.to_string());

    match auth {
        SshAuth::Password(password) => {
            debug!("authenticating with password");
            session
                .userauth_password(username, password)
                .map_err(|_| auth_failed())?;
        }
        SshAuth::PrivateKey { key, passphrase } => {
            let passphrase = passphrase.as_ref().map(|p| p.as_str());
            if key.contains("-----BEGIN") {
                debug!("authenticating with in-memory private key");
                session
                    .userauth_pubkey_memory(username, None, key, passphrase)
                    .map_err(|_| auth_failed())?;
            } else {
                let path = Path::new(key.trim());
                debug!(path = %path.display(), "authenticating with private key file");
                session
                    .userauth_pubkey_file(username, None, path, passphrase)
                    .map_err(|_| auth_failed())?;
            }
        }
        SshAuth::Agent => {
            debug!("authenticating with SSH agent");
            authenticate_with_agent(session, username)?;
        }
    }

    if !session.authenticated() {
        return Err(auth_failed());
    }
    debug!("SSH authentication successful");
    Ok(())
}

fn authenticate_with_agent(session: &mut Session, username: &str) -> Result<(), SshTunnelError> {
    let mut agent = session
        .agent()
        .map_err(|e| SshTunnelError::AgentNotAvailable(e.to_string()))?;
    agent
        .connect()
        .map_err(|e| SshTunnelError::AgentNotAvailable(e.to_string()))?;
    agent
        .list_identities()
        .map_err(|e| SshTunnelError::AgentNotAvailable(format!("failed to list identities: {}", e)))?;
    let identities = agent
        .identities()
        .map_err(|e| SshTunnelError::AgentNotAvailable(e.to_string()))?;

    if identities.is_empty() {
        return Err(SshTunnelError::AgentNotAvailable(
            "no identities in agent".to_string(),
        ));
    }

    for identity in identities {
        if agent.userauth(username, &identity).is_ok() && session.authenticated() {
            debug!("authenticated with agent identity");
            return Ok(());
        }
    }
    Err(SshTunnelError::AuthenticationFailed(username.to_string()))
}

/// Connector that dials real bastions with libssh2
#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Connector;

#[async_trait]
impl BastionConnector for Ssh2Connector {
    async fn connect(
        &self,
        spec: &TunnelSpec,
        auth: SshAuth,
    ) -> Result<Arc<dyn BastionSession>, SshTunnelError> {
        let host = spec.ssh_host.clone();
        let port = spec.ssh_port;
        let username = spec.ssh_user.clone();

        let session = tokio::task::spawn_blocking(move || {
            open_ssh_session(&host, port, &username, &auth, CHANNEL_OPEN_TIMEOUT)
        })
        .await
        .map_err(|e| SshTunnelError::HandshakeFailed(format!("SSH task failed: {}", e)))??;

        session.set_blocking(false);
        info!(ssh_host = %spec.ssh_host, ssh_port = spec.ssh_port, "SSH bastion session established");
        Ok(Arc::new(Ssh2Session { session }))
    }
}

/// Authenticated non-blocking session shared by all forwarded channels
struct Ssh2Session {
    session: Session,
}

impl Ssh2Session {
    fn open_channel(&self, host: &str, port: u16) -> Result<Channel, SshTunnelError> {
        let started = Instant::now();
        loop {
            match self.session.channel_direct_tcpip(host, port, None) {
                Ok(channel) => return Ok(channel),
                Err(e)
                    if matches!(e.code(), ErrorCode::Session(LIBSSH2_ERROR_EAGAIN))
                        && started.elapsed() < CHANNEL_OPEN_TIMEOUT =>
                {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => {
                    return Err(SshTunnelError::PortForwardingFailed {
                        host: host.to_string(),
                        port,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

impl BastionSession for Ssh2Session {
    fn forward(
        &self,
        mut local: TcpStream,
        target_host: &str,
        target_port: u16,
        running: &AtomicBool,
    ) -> Result<(), SshTunnelError> {
        let mut channel = self.open_channel(target_host, target_port)?;
        let forwarding_failed = |reason: String| SshTunnelError::PortForwardingFailed {
            host: target_host.to_string(),
            port: target_port,
            reason,
        };

        local
            .set_nonblocking(true)
            .map_err(|e| forwarding_failed(e.to_string()))?;
        let result = pipe_bidirectional(&mut local, &mut channel, running);

        // best effort; the session is non-blocking so these may report EAGAIN
        let _ = channel.send_eof();
        let _ = channel.close();

        let (sent, received) = result.map_err(|e| forwarding_failed(e.to_string()))?;
        debug!(sent, received, "forwarded connection closed");
        Ok(())
    }

    fn close(&self) -> Result<(), SshTunnelError> {
        self.session.set_blocking(true);
        self.session
            .disconnect(None, "Tunnel closed", None)
            .map_err(|e| {
                warn!(error = %e, "error disconnecting SSH session");
                SshTunnelError::HandshakeFailed(format!("disconnect failed: {}", e))
            })
    }
}
