//! Unit tests for the Redis provider

use crate::RedisProvider;
use conduit_core::{
    ConduitError, ConnectionConfig, ConnectionProvider, Credential, Endpoint, ProtocolKind,
};

#[tokio::test]
async fn test_non_numeric_database_is_validation_error() {
    let provider = RedisProvider::new();
    let config = ConnectionConfig::new("cache", ProtocolKind::Redis)
        .with_host("localhost")
        .with_database("sessions");
    let err = provider
        .connect(&config, &Credential::default(), &Endpoint::local(6379))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
}

#[tokio::test]
async fn test_refused_port_is_connect_error() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let provider = RedisProvider::new();
    let config = ConnectionConfig::new("cache", ProtocolKind::Redis).with_host("localhost");
    let err = provider
        .connect(&config, &Credential::password("r3dis"), &Endpoint::local(port))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Connect(_)));
    assert!(!err.to_string().contains("r3dis"));
    assert!(provider.session_ids().is_empty());
}

#[tokio::test]
async fn test_execute_without_session() {
    let provider = RedisProvider::new();
    assert!(matches!(
        provider.execute_query(uuid::Uuid::new_v4(), None, "PING").await,
        Err(ConduitError::NotConnected(_))
    ));
}
