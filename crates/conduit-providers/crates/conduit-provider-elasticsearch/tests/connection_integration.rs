//! Integration tests for the Elasticsearch provider
//!
//! These tests require a running Elasticsearch node.
//! They are ignored by default and can be run with:
//! ```
//! cargo test --package conduit-provider-elasticsearch --test connection_integration -- --ignored
//! ```
//!
//! ```
//! docker run -d --name es-test -p 9200:9200 -e discovery.type=single-node -e xpack.security.enabled=false elasticsearch:8.13.0
//! ```

use conduit_core::{ConnectionConfig, ConnectionProvider, Credential, ExecOutput, ProtocolKind};
use conduit_provider_elasticsearch::ElasticsearchProvider;

fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("es-test", ProtocolKind::Elasticsearch)
        .with_host(std::env::var("ES_HOST").unwrap_or_else(|_| "localhost".to_string()))
        .with_port(
            std::env::var("ES_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9200),
        )
}

#[tokio::test]
#[ignore = "requires running Elasticsearch node"]
async fn test_index_search_delete() {
    let provider = ElasticsearchProvider::new();
    let config = test_config();
    provider
        .connect(&config, &Credential::default(), &config.direct_endpoint())
        .await
        .expect("Failed to connect to Elasticsearch");

    provider
        .execute_query(config.id, None, r#"index conduit-test {"msg": "hello"}"#)
        .await
        .expect("index failed");

    let output = provider
        .execute_query(
            config.id,
            None,
            r#"search conduit-test {"query": {"match": {"msg": "hello"}}}"#,
        )
        .await
        .expect("search failed");
    let ExecOutput::Documents(hits) = output else {
        panic!("expected documents");
    };
    assert!(!hits.is_empty());

    let metadata = provider.get_metadata(config.id).await.unwrap();
    assert!(metadata.iter().any(|n| n.name == "conduit-test"));

    provider.disconnect(config.id).await.unwrap();
}
