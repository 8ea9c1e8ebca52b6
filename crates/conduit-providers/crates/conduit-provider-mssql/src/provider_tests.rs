//! Unit tests for the MS SQL Server provider

use crate::MssqlProvider;
use crate::session::returns_rows;
use conduit_core::{
    ConduitError, ConnectionConfig, ConnectionProvider, Credential, Endpoint, ProtocolKind,
};
use rstest::rstest;
use tokio::net::TcpListener;

#[rstest]
#[case("SELECT 1", true)]
#[case("  with cte AS (SELECT 1 AS x) SELECT * FROM cte", true)]
#[case("EXEC sp_who", true)]
#[case("sp_helpdb", true)]
#[case("INSERT INTO t (a) OUTPUT inserted.id VALUES (1)", true)]
#[case("INSERT INTO t (a) VALUES (1)", false)]
#[case("UPDATE t SET a = 2", false)]
#[case("CREATE TABLE t (a int)", false)]
#[case("SELECTED_STUFF", false)]
#[case("-- recent orders\nSELECT TOP 5 * FROM orders", true)]
#[case("/* cleanup */ DELETE FROM t", false)]
fn test_returns_rows(#[case] sql: &str, #[case] expected: bool) {
    assert_eq!(returns_rows(sql), expected);
}

#[tokio::test]
async fn test_missing_username_is_validation_error() {
    let provider = MssqlProvider::new();
    let config = ConnectionConfig::new("mssql", ProtocolKind::Mssql).with_host("localhost");
    let err = provider
        .connect(&config, &Credential::password("secret"), &Endpoint::local(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
}

#[tokio::test]
async fn test_connect_to_closing_listener_fails_without_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let provider = MssqlProvider::new();
    let config = ConnectionConfig::new("mssql", ProtocolKind::Mssql)
        .with_host("localhost")
        .with_username("sa");
    let err = provider
        .connect(&config, &Credential::password("Str0ng!Pass"), &Endpoint::local(port))
        .await
        .unwrap_err();

    assert!(matches!(err, ConduitError::Connect(_)));
    assert!(!err.to_string().contains("Str0ng!Pass"));
    assert!(!provider.is_connected(config.id));
}

#[tokio::test]
async fn test_operations_without_session() {
    let provider = MssqlProvider::new();
    let id = uuid::Uuid::new_v4();

    provider.disconnect(id).await.unwrap();
    assert!(matches!(
        provider.execute_query(id, None, "SELECT 1").await,
        Err(ConduitError::NotConnected(_))
    ));
}
