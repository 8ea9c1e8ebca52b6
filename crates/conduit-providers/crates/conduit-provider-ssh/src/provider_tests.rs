//! Unit tests for the SSH and SFTP provider

use crate::session::drain_both;
use crate::{ExecReport, SshProvider};
use conduit_core::{
    ConduitError, ConnectionConfig, ConnectionProvider, Credential, Endpoint, ProtocolKind,
};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::time::Duration;
use tokio::net::TcpListener;

/// Reader that replays a fixed sequence of chunks and `WouldBlock`s
struct Scripted(VecDeque<Option<&'static str>>);

impl Scripted {
    fn new(steps: &[Option<&'static str>]) -> Self {
        Self(steps.iter().copied().collect())
    }
}

impl Read for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.pop_front() {
            Some(Some(chunk)) => {
                buf[..chunk.len()].copy_from_slice(chunk.as_bytes());
                Ok(chunk.len())
            }
            Some(None) => Err(io::Error::from(ErrorKind::WouldBlock)),
            None => Ok(0),
        }
    }
}

#[test]
fn test_kinds() {
    assert_eq!(SshProvider::new().kind(), ProtocolKind::Ssh);
    assert_eq!(SshProvider::sftp().kind(), ProtocolKind::Sftp);
}

#[test]
fn test_exec_report_render() {
    let report = ExecReport {
        stdout: "total 0".into(),
        stderr: "ls: cannot access 'x'\n".into(),
        exit_status: 2,
    };
    assert_eq!(
        report.render(),
        "total 0\n[stderr]\nls: cannot access 'x'\n[exit status: 2]"
    );

    let quiet = ExecReport {
        stdout: String::new(),
        stderr: String::new(),
        exit_status: 0,
    };
    assert_eq!(quiet.render(), "[exit status: 0]");
}

#[tokio::test]
async fn test_username_required() {
    let provider = SshProvider::new();
    let config = ConnectionConfig::new("box", ProtocolKind::Ssh).with_host("127.0.0.1");
    let err = provider
        .connect(&config, &Credential::password("pw"), &config.direct_endpoint())
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
}

#[tokio::test]
async fn test_closing_listener_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let provider = SshProvider::sftp();
    let config = ConnectionConfig::new("files", ProtocolKind::Sftp)
        .with_host("127.0.0.1")
        .with_username("deploy");
    let err = provider
        .connect(&config, &Credential::password("ssh-s3cret"), &Endpoint::local(port))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Connect(_)));
    assert!(!err.to_string().contains("ssh-s3cret"));
    assert!(!provider.is_connected(config.id));
}

#[tokio::test]
async fn test_operations_without_session() {
    let provider = SshProvider::new();
    let id = uuid::Uuid::new_v4();
    assert!(matches!(
        provider.execute_query(id, None, "uptime").await,
        Err(ConduitError::NotConnected(_))
    ));
    provider.disconnect(id).await.unwrap();
}

#[test]
fn test_drain_reads_stderr_while_stdout_is_pending() {
    let mut stdout = Scripted::new(&[None, None, None, Some("done\n")]);
    let mut stderr = Scripted::new(&[Some("warn 1\n"), Some("warn 2\n")]);
    let (out, err) = drain_both(&mut stdout, &mut stderr, Duration::from_secs(5)).unwrap();
    assert_eq!(out, b"done\n");
    assert_eq!(err, b"warn 1\nwarn 2\n");
}

#[test]
fn test_drain_gives_up_after_limit() {
    struct Silent;
    impl Read for Silent {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::WouldBlock))
        }
    }
    let err = drain_both(&mut Silent, &mut Scripted::new(&[]), Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(err, ConduitError::Exec(_)));
}

#[test]
fn test_drain_surfaces_read_errors() {
    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::ConnectionReset))
        }
    }
    let err = drain_both(&mut Scripted::new(&[]), &mut Broken, Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(err, ConduitError::Io(_)));
}
