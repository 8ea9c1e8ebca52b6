//! FTP control connection wrapper

use conduit_core::{
    CONNECT_TIMEOUT, ConduitError, ConnectionConfig, Credential, Endpoint, ExecOutput,
    MetadataNode, NodeKind, Result, run_blocking,
};
use parking_lot::Mutex;
use serde_json::json;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use suppaftp::native_tls::TlsConnector;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream};
use zeroize::Zeroizing;

use crate::command::{FtpCommand, READ_LIMIT, listing_entry, name_and_is_dir};

const ANONYMOUS_USER: &str = "anonymous";

/// One logged-in control connection, plain or upgraded to TLS
pub struct FtpSession {
    stream: Arc<Mutex<Option<NativeTlsFtpStream>>>,
}

impl FtpSession {
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let host = endpoint.host.clone();
        let port = endpoint.port;
        let tls_domain = config.ssl.then(|| config.effective_host());
        let username = credential
            .resolve_username(config.username.as_deref())
            .unwrap_or(ANONYMOUS_USER)
            .to_string();
        let password = Zeroizing::new(credential.password.clone().unwrap_or_default());

        let stream = run_blocking("ftp connect", move || {
            let connect_error =
                |e: String| ConduitError::Connect(format!("Failed to connect to FTP server: {}", e));
            let addr = (host.as_str(), port)
                .to_socket_addrs()
                .map_err(|e| connect_error(e.to_string()))?
                .next()
                .ok_or_else(|| connect_error(format!("{} did not resolve", host)))?;

            let mut stream = NativeTlsFtpStream::connect_timeout(addr, CONNECT_TIMEOUT)
                .map_err(|e| connect_error(e.to_string()))?;
            if let Some(domain) = tls_domain {
                let tls = TlsConnector::new().map_err(|e| connect_error(e.to_string()))?;
                stream = stream
                    .into_secure(NativeTlsConnector::from(tls), &domain)
                    .map_err(|e| connect_error(format!("TLS upgrade failed: {}", e)))?;
            }
            stream.login(username.as_str(), password.as_str()).map_err(|e| {
                ConduitError::Connect(format!("FTP login failed for user '{}': {}", username, e))
            })?;
            Ok(stream)
        })
        .await?;

        tracing::info!("FTP connection established");
        Ok(Self {
            stream: Arc::new(Mutex::new(Some(stream))),
        })
    }

    /// Run one vocabulary command on the control connection
    pub async fn run(&self, input: &str) -> Result<ExecOutput> {
        let command = FtpCommand::parse(input)?;
        tracing::debug!(?command, "FTP command");
        let stream = self.stream.clone();
        run_blocking("ftp", move || {
            let mut guard = stream.lock();
            let ftp = guard
                .as_mut()
                .ok_or_else(|| ConduitError::NotConnected("FTP connection is closed".into()))?;

            let output = match command {
                FtpCommand::List(path) => {
                    let lines = ftp.list(path.as_deref()).map_err(ftp_error)?;
                    ExecOutput::Documents(lines.iter().map(|l| listing_entry(l)).collect())
                }
                FtpCommand::Pwd => ExecOutput::Text(ftp.pwd().map_err(ftp_error)?),
                FtpCommand::Cd(path) => {
                    ftp.cwd(&path).map_err(ftp_error)?;
                    ExecOutput::Text(ftp.pwd().map_err(ftp_error)?)
                }
                FtpCommand::Mkdir(path) => {
                    ftp.mkdir(&path).map_err(ftp_error)?;
                    done("created", &path)
                }
                FtpCommand::Rmdir(path) => {
                    ftp.rmdir(&path).map_err(ftp_error)?;
                    done("removed", &path)
                }
                FtpCommand::Remove(path) => {
                    ftp.rm(&path).map_err(ftp_error)?;
                    done("removed", &path)
                }
                FtpCommand::Rename { from, to } => {
                    ftp.rename(&from, &to).map_err(ftp_error)?;
                    ExecOutput::Json(json!({ "renamed": from, "to": to }))
                }
                FtpCommand::Size(path) => {
                    let size = ftp.size(&path).map_err(ftp_error)?;
                    ExecOutput::Json(json!({ "path": path, "size": size }))
                }
                FtpCommand::Read(path) => {
                    if let Ok(size) = ftp.size(&path) {
                        if size > READ_LIMIT {
                            return Err(ConduitError::Exec(format!(
                                "'{}' is larger than the {} byte read limit",
                                path, READ_LIMIT
                            )));
                        }
                    }
                    let bytes = ftp.retr_as_buffer(&path).map_err(ftp_error)?.into_inner();
                    ExecOutput::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
            };
            Ok(output)
        })
        .await
    }

    /// Entries of the login directory
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let stream = self.stream.clone();
        run_blocking("ftp metadata", move || {
            let mut guard = stream.lock();
            let ftp = guard
                .as_mut()
                .ok_or_else(|| ConduitError::NotConnected("FTP connection is closed".into()))?;
            let mut entries: Vec<(String, bool)> = ftp
                .list(None)
                .map_err(ftp_error)?
                .iter()
                .filter_map(|line| name_and_is_dir(line))
                .filter(|(name, _)| name != "." && name != "..")
                .collect();
            entries.sort();
            Ok(entries
                .into_iter()
                .map(|(name, is_dir)| {
                    let kind = if is_dir {
                        NodeKind::Directory
                    } else {
                        NodeKind::File
                    };
                    MetadataNode::leaf(name, kind)
                })
                .collect())
        })
        .await
    }

    pub async fn close(&self) -> Result<()> {
        let stream = self.stream.clone();
        run_blocking("ftp quit", move || {
            if let Some(mut ftp) = stream.lock().take() {
                ftp.quit().map_err(ftp_error)?;
            }
            Ok(())
        })
        .await
    }
}

fn done(status: &str, path: &str) -> ExecOutput {
    ExecOutput::Json(json!({ "path": path, "status": status }))
}

fn ftp_error(e: FtpError) -> ConduitError {
    ConduitError::Exec(e.to_string())
}
