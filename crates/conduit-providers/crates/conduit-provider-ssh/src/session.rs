//! Authenticated SSH login shared by the shell and SFTP kinds

use conduit_core::{
    CONNECT_TIMEOUT, ConduitError, ConnectionConfig, Credential, Endpoint, ExecOutput,
    MetadataNode, NodeKind, ProtocolKind, Result, run_blocking,
};
use conduit_tunnel::{SshAuth, open_ssh_session};
use parking_lot::Mutex;
use serde_json::json;
use ssh2::Session;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::sftp::{READ_LIMIT, SftpCommand, entry_json, entry_type};

const DIRECTORY_MODE: i32 = 0o755;

/// Upper bound for one blocking libssh2 call (SFTP operations, channel setup)
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound for a remote command to finish writing its output
pub(crate) const EXEC_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Captured result of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecReport {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl ExecReport {
    /// stdout, then any stderr, then the exit status
    pub fn render(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(&self.stderr);
        }
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!("[exit status: {}]", self.exit_status));
        text
    }
}

/// One libssh2 session; calls are serialized and run on blocking threads
pub struct SshSession {
    session: Arc<Mutex<Session>>,
}

impl SshSession {
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let username = credential
            .resolve_username(config.username.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                ConduitError::Validation(format!(
                    "{} connection '{}' requires a username",
                    config.kind.display_name(),
                    config.name
                ))
            })?;
        let auth = SshAuth::for_login(credential);
        let host = endpoint.host.clone();
        let port = endpoint.port;
        let wants_sftp = config.kind == ProtocolKind::Sftp;

        let session = run_blocking("ssh connect", move || {
            let session = open_ssh_session(&host, port, &username, &auth, CONNECT_TIMEOUT)
                .map_err(|e| ConduitError::Connect(e.to_string()))?;
            if wants_sftp {
                session.sftp().map_err(|e| {
                    ConduitError::Connect(format!("SFTP subsystem unavailable: {}", e))
                })?;
            }
            session.set_timeout(OPERATION_TIMEOUT.as_millis() as u32);
            Ok(session)
        })
        .await?;

        tracing::info!("SSH login established");
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
        })
    }

    /// Run `command` remotely and capture its output
    pub async fn exec(&self, command: &str) -> Result<ExecReport> {
        let command = command.trim().to_string();
        if command.is_empty() {
            return Err(ConduitError::Exec("empty command".into()));
        }
        let session = self.session.clone();
        run_blocking("ssh exec", move || {
            let session = session.lock();
            let mut channel = session.channel_session().map_err(ssh_error)?;
            channel.exec(&command).map_err(ssh_error)?;

            // both streams are drained together so a chatty stderr cannot
            // stall the remote side while stdout is still open
            session.set_blocking(false);
            let drained = drain_both(&mut channel.stream(0), &mut channel.stderr(), EXEC_TIMEOUT);
            session.set_blocking(true);
            let (stdout, stderr) = match drained {
                Ok(streams) => streams,
                Err(e) => {
                    let _ = channel.close();
                    tracing::warn!(timeout_secs = EXEC_TIMEOUT.as_secs(), "remote command abandoned");
                    return Err(e);
                }
            };
            channel.wait_close().map_err(ssh_error)?;

            Ok(ExecReport {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_status: channel.exit_status().map_err(ssh_error)?,
            })
        })
        .await
    }

    /// Run one SFTP vocabulary command
    pub async fn sftp(&self, input: &str) -> Result<ExecOutput> {
        let command = SftpCommand::parse(input)?;
        tracing::debug!(?command, "SFTP command");
        let session = self.session.clone();
        run_blocking("sftp", move || {
            let session = session.lock();
            let sftp = session.sftp().map_err(ssh_error)?;
            let output = match command {
                SftpCommand::List(path) => {
                    let mut entries = sftp.readdir(Path::new(&path)).map_err(ssh_error)?;
                    entries.sort_by(|a, b| a.0.cmp(&b.0));
                    ExecOutput::Documents(
                        entries
                            .iter()
                            .map(|(path, stat)| entry_json(&file_name(path), stat))
                            .collect(),
                    )
                }
                SftpCommand::Stat(path) => {
                    let stat = sftp.stat(Path::new(&path)).map_err(ssh_error)?;
                    ExecOutput::Json(entry_json(&path, &stat))
                }
                SftpCommand::Read(path) => {
                    let mut file = sftp.open(Path::new(&path)).map_err(ssh_error)?;
                    let mut bytes = Vec::new();
                    file.by_ref().take(READ_LIMIT + 1).read_to_end(&mut bytes)?;
                    if bytes.len() as u64 > READ_LIMIT {
                        return Err(ConduitError::Exec(format!(
                            "'{}' is larger than the {} byte read limit",
                            path, READ_LIMIT
                        )));
                    }
                    ExecOutput::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                SftpCommand::Mkdir(path) => {
                    sftp.mkdir(Path::new(&path), DIRECTORY_MODE).map_err(ssh_error)?;
                    done("created", &path)
                }
                SftpCommand::Rmdir(path) => {
                    sftp.rmdir(Path::new(&path)).map_err(ssh_error)?;
                    done("removed", &path)
                }
                SftpCommand::Remove(path) => {
                    sftp.unlink(Path::new(&path)).map_err(ssh_error)?;
                    done("removed", &path)
                }
                SftpCommand::Rename { from, to } => {
                    sftp.rename(Path::new(&from), Path::new(&to), None)
                        .map_err(ssh_error)?;
                    ExecOutput::Json(json!({ "renamed": from, "to": to }))
                }
                SftpCommand::Pwd => {
                    let cwd = sftp.realpath(Path::new(".")).map_err(ssh_error)?;
                    ExecOutput::Text(cwd.display().to_string())
                }
            };
            Ok(output)
        })
        .await
    }

    /// Home directory listing
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let session = self.session.clone();
        run_blocking("sftp metadata", move || {
            let session = session.lock();
            let sftp = session.sftp().map_err(ssh_error)?;
            let mut entries: Vec<(PathBuf, ssh2::FileStat)> =
                sftp.readdir(Path::new(".")).map_err(ssh_error)?;
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(entries
                .iter()
                .map(|(path, stat)| {
                    let kind = if entry_type(stat) == "dir" {
                        NodeKind::Directory
                    } else {
                        NodeKind::File
                    };
                    MetadataNode::leaf(file_name(path), kind)
                })
                .collect())
        })
        .await
    }

    pub async fn close(&self) -> Result<()> {
        let session = self.session.clone();
        run_blocking("ssh disconnect", move || {
            session
                .lock()
                .disconnect(None, "conduit disconnect", None)
                .map_err(ssh_error)
        })
        .await
    }
}

/// Read two non-blocking streams in turn until both reach end of file
pub(crate) fn drain_both(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    limit: Duration,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let deadline = Instant::now() + limit;
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut out_open = true;
    let mut err_open = true;
    let mut buf = [0u8; 8192];

    while out_open || err_open {
        let mut progressed = false;
        if out_open {
            out_open = read_available(stdout, &mut buf, &mut out, &mut progressed)?;
        }
        if err_open {
            err_open = read_available(stderr, &mut buf, &mut err, &mut progressed)?;
        }
        if !progressed {
            if Instant::now() >= deadline {
                return Err(ConduitError::Exec(format!(
                    "remote command produced no end of output within {}s",
                    limit.as_secs()
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
    Ok((out, err))
}

/// One read attempt; returns whether the stream is still open
fn read_available(
    stream: &mut impl Read,
    buf: &mut [u8],
    sink: &mut Vec<u8>,
    progressed: &mut bool,
) -> Result<bool> {
    match stream.read(buf) {
        Ok(0) => {
            *progressed = true;
            Ok(false)
        }
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            *progressed = true;
            Ok(true)
        }
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn done(status: &str, path: &str) -> ExecOutput {
    ExecOutput::Json(json!({ "path": path, "status": status }))
}

fn ssh_error(e: ssh2::Error) -> ConduitError {
    ConduitError::Exec(e.to_string())
}
