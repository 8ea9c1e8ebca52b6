//! Integration tests for the MS SQL Server provider
//!
//! These tests require a running SQL Server instance.
//! They are ignored by default and can be run with:
//! ```
//! cargo test --package conduit-provider-mssql --test connection_integration -- --ignored
//! ```
//!
//! ```
//! docker run -d --name mssql-test -e ACCEPT_EULA=Y -e MSSQL_SA_PASSWORD='Conduit!Pass1' -p 1433:1433 mcr.microsoft.com/mssql/server:2022-latest
//! ```

use conduit_core::{ConnectionConfig, ConnectionProvider, Credential, NodeKind, ProtocolKind, Value};
use conduit_provider_mssql::MssqlProvider;

fn test_config() -> (ConnectionConfig, Credential) {
    let config = ConnectionConfig::new("mssql-test", ProtocolKind::Mssql)
        .with_host(std::env::var("MSSQL_HOST").unwrap_or_else(|_| "localhost".to_string()))
        .with_port(
            std::env::var("MSSQL_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1433),
        )
        .with_database("master")
        .with_username(std::env::var("MSSQL_USER").unwrap_or_else(|_| "sa".to_string()))
        .with_param("trust_cert", "true");
    let credential = Credential::password(
        std::env::var("MSSQL_PASSWORD").unwrap_or_else(|_| "Conduit!Pass1".to_string()),
    );
    (config, credential)
}

#[tokio::test]
#[ignore = "requires running SQL Server"]
async fn test_script_keeps_last_result_and_columns() {
    let provider = MssqlProvider::new();
    let (config, credential) = test_config();
    provider
        .connect(&config, &credential, &config.direct_endpoint())
        .await
        .expect("Failed to connect to SQL Server");

    let output = provider
        .execute_query(
            config.id,
            None,
            "CREATE TABLE #items (id INT, price DECIMAL(8,2));\
             INSERT INTO #items VALUES (1, 3.50), (2, 7.25);\
             SELECT id, price FROM #items ORDER BY id;",
        )
        .await
        .expect("script failed");
    let rows = output.as_rows().unwrap();
    assert_eq!(rows.rows.len(), 2);
    assert_eq!(rows.cell(1, "price"), Some(&Value::Decimal("7.25".into())));

    let empty = provider
        .execute_query(config.id, None, "SELECT id FROM #items WHERE id > 10")
        .await
        .unwrap();
    assert_eq!(empty.as_rows().unwrap().columns.len(), 1);

    let tree = provider.get_metadata(config.id).await.unwrap();
    assert!(tree.iter().all(|n| n.kind == NodeKind::Database));

    provider.disconnect(config.id).await.unwrap();
}
