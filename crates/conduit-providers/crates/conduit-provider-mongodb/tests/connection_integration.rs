//! Integration tests for the MongoDB provider
//!
//! These tests require a running MongoDB server.
//! They are ignored by default and can be run with:
//! ```
//! cargo test --package conduit-provider-mongodb --test connection_integration -- --ignored
//! ```
//!
//! ```
//! docker run -d --name mongo-test -p 27017:27017 mongo:7
//! ```

use conduit_core::{ConnectionConfig, ConnectionProvider, Credential, NodeKind, ProtocolKind};
use conduit_provider_mongodb::MongoDbProvider;

fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("mongo-test", ProtocolKind::Mongodb)
        .with_host(std::env::var("MONGO_HOST").unwrap_or_else(|_| "localhost".to_string()))
        .with_port(
            std::env::var("MONGO_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(27017),
        )
        .with_database("conduit_it")
}

#[tokio::test]
#[ignore = "requires running MongoDB server"]
async fn test_insert_then_find() {
    let provider = MongoDbProvider::new();
    let config = test_config();
    provider
        .connect(&config, &Credential::default(), &config.direct_endpoint())
        .await
        .expect("Failed to connect to MongoDB");

    provider
        .execute_query(config.id, None, "db.items.deleteMany({})")
        .await
        .unwrap();
    provider
        .execute_query(config.id, None, "db.items.insertOne({a: 1})")
        .await
        .unwrap();
    let found = provider
        .execute_query(config.id, None, "db.items.find({})")
        .await
        .unwrap();

    let docs = found.as_documents().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["a"], serde_json::json!(1));

    let updated = provider
        .execute_query(
            config.id,
            None,
            r#"db.items.updateMany({status: "a,b"}, {$set: {x: 1}})"#,
        )
        .await
        .unwrap();
    assert!(matches!(updated, conduit_core::ExecOutput::Json(_)));

    let tree = provider.get_metadata(config.id).await.unwrap();
    let db = tree.iter().find(|n| n.name == "conduit_it").unwrap();
    assert_eq!(db.child("items").unwrap().kind, NodeKind::Collection);

    provider.disconnect(config.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires running MongoDB server"]
async fn test_use_applies_to_following_calls_only() {
    let provider = MongoDbProvider::new();
    let config = test_config();
    provider
        .connect(&config, &Credential::default(), &config.direct_endpoint())
        .await
        .expect("Failed to connect to MongoDB");

    provider
        .execute_query(
            config.id,
            None,
            "db.split.deleteMany({});\nuse conduit_it_other;\ndb.split.deleteMany({})",
        )
        .await
        .unwrap();
    provider
        .execute_query(
            config.id,
            None,
            "db.split.insertOne({at: 'default'});\nuse conduit_it_other;\ndb.split.insertOne({at: 'other'})",
        )
        .await
        .unwrap();

    let here = provider
        .execute_query(config.id, None, "db.split.find({})")
        .await
        .unwrap();
    let here = here.as_documents().unwrap();
    assert_eq!(here.len(), 1);
    assert_eq!(here[0]["at"], serde_json::json!("default"));

    let there = provider
        .execute_query(config.id, Some("conduit_it_other"), "db.split.find({})")
        .await
        .unwrap();
    let there = there.as_documents().unwrap();
    assert_eq!(there.len(), 1);
    assert_eq!(there[0]["at"], serde_json::json!("other"));

    provider.disconnect(config.id).await.unwrap();
}
