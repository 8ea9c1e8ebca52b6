//! Integration tests for the Redis provider
//!
//! These tests require a running Redis server.
//! They are ignored by default and can be run with:
//! ```
//! cargo test --package conduit-provider-redis --test connection_integration -- --ignored
//! ```
//!
//! ```
//! docker run -d --name redis-test -p 6379:6379 redis:7
//! ```

use conduit_core::{ConnectionConfig, ConnectionProvider, Credential, ExecOutput, ProtocolKind};
use conduit_provider_redis::RedisProvider;
use serde_json::json;

fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("redis-test", ProtocolKind::Redis)
        .with_host(std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()))
        .with_port(
            std::env::var("REDIS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(6379),
        )
        .with_database("3")
}

#[tokio::test]
#[ignore = "requires running Redis server"]
async fn test_commands_and_key_listing() {
    let provider = RedisProvider::new();
    let config = test_config();
    provider
        .connect(&config, &Credential::default(), &config.direct_endpoint())
        .await
        .expect("Failed to connect to Redis");

    let output = provider
        .execute_query(
            config.id,
            None,
            "SET conduit:greeting \"hello world\"\nGET conduit:greeting",
        )
        .await
        .unwrap();
    assert_eq!(output, ExecOutput::Json(json!("hello world")));

    let err = provider
        .execute_query(config.id, None, "NOTACOMMAND x")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("NOTACOMMAND"));

    let tree = provider.get_metadata(config.id).await.unwrap();
    assert_eq!(tree[0].name, "db3");
    assert!(tree[0].child("conduit:greeting").is_some());

    provider.disconnect(config.id).await.unwrap();
}
