//! Unit tests for the Neo4j provider against a canned HTTP endpoint

use crate::Neo4jProvider;
use conduit_core::{
    ConduitError, ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput,
    NodeKind, ProtocolKind,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serve `body` with `status` to every request, returning the bound port
async fn canned_server(status: &'static str, body: serde_json::Value) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let body = body.to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    port
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + length {
                return;
            }
        }
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new("graph", ProtocolKind::Neo4j)
        .with_host("127.0.0.1")
        .with_username("neo4j")
}

#[tokio::test]
async fn test_connect_and_execute_returns_graph() {
    let port = canned_server(
        "200 OK",
        json!({
            "results": [{
                "columns": ["p"],
                "data": [{
                    "row": [{"name": "Ada"}],
                    "graph": {
                        "nodes": [{"id": "1", "elementId": "4:a:1", "labels": ["Person"], "properties": {"name": "Ada"}}],
                        "relationships": []
                    }
                }]
            }],
            "errors": []
        }),
    )
    .await;

    let provider = Neo4jProvider::new();
    let config = config();
    provider
        .connect(&config, &Credential::password("s3cret"), &Endpoint::local(port))
        .await
        .unwrap();
    assert!(provider.is_connected(config.id));

    let output = provider
        .execute_query(config.id, None, "MATCH (p:Person) RETURN p")
        .await
        .unwrap();
    let ExecOutput::Graph(graph) = output else {
        panic!("expected graph output");
    };
    assert_eq!(graph.records, vec![json!({"p": {"name": "Ada"}})]);
    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(graph.nodes[0].id, "4:a:1");

    provider.disconnect(config.id).await.unwrap();
    assert!(!provider.is_connected(config.id));
}

#[tokio::test]
async fn test_metadata_categories() {
    let port = canned_server(
        "200 OK",
        json!({"results": [{"columns": ["name"], "data": [{"row": ["Zeta"]}, {"row": ["Alpha"]}]}], "errors": []}),
    )
    .await;

    let provider = Neo4jProvider::new();
    let config = config();
    provider
        .connect(&config, &Credential::default(), &Endpoint::local(port))
        .await
        .unwrap();

    let nodes = provider.get_metadata(config.id).await.unwrap();
    let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Labels", "Relationship Types", "Property Keys"]);
    let labels = nodes[0].children.as_ref().unwrap();
    assert_eq!(labels[0].name, "Alpha");
    assert_eq!(labels[0].kind, NodeKind::Label);
}

#[tokio::test]
async fn test_unauthorized_is_connect_error_without_secret() {
    let port = canned_server(
        "401 Unauthorized",
        json!({"errors": [{"code": "Neo.ClientError.Security.Unauthorized", "message": "Invalid username or password."}]}),
    )
    .await;

    let provider = Neo4jProvider::new();
    let err = provider
        .connect(&config(), &Credential::password("hunter2"), &Endpoint::local(port))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Connect(_)));
    assert!(err.to_string().contains("401"));
    assert!(!err.to_string().contains("hunter2"));
    assert!(provider.session_ids().is_empty());
}

#[tokio::test]
async fn test_comment_only_script_is_exec_error() {
    let port = canned_server("200 OK", json!({"results": [], "errors": []})).await;
    let provider = Neo4jProvider::new();
    let config = config();
    provider
        .connect(&config, &Credential::default(), &Endpoint::local(port))
        .await
        .unwrap();

    let err = provider
        .execute_query(config.id, None, "// only a comment")
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Exec(_)));
}

#[tokio::test]
async fn test_refused_port_is_connect_error() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let provider = Neo4jProvider::new();
    let err = provider
        .test_connection(&config(), &Credential::default(), &Endpoint::local(port))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Connect(_)));
}

#[tokio::test]
async fn test_execute_without_session() {
    let provider = Neo4jProvider::new();
    assert!(matches!(
        provider.execute_query(uuid::Uuid::new_v4(), None, "RETURN 1").await,
        Err(ConduitError::NotConnected(_))
    ));
}
