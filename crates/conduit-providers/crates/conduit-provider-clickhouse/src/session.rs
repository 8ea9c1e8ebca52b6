//! ClickHouse session wrapper

use async_trait::async_trait;
use conduit_core::sql_script::{
    SqlDialect, StatementExecutor, strip_leading_comments, use_database_name,
};
use conduit_core::{
    ConduitError, ConnectionConfig, Credential, Endpoint, MetadataNode, NodeKind, QueryResult,
    Result, Value,
};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::format::{ROW_FORMAT, parse_compact_rows};

/// A configured HTTP client; ClickHouse keeps no connection state between
/// requests, so `USE` is applied client-side
pub struct ClickHouseSession {
    client: clickhouse::Client,
    database: String,
}

impl ClickHouseSession {
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let scheme = if config.ssl { "https" } else { "http" };
        let url = format!("{}://{}:{}", scheme, endpoint.host, endpoint.port);
        let database = config
            .database
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let user = credential
            .resolve_username(config.username.as_deref())
            .unwrap_or("default");

        let mut client = clickhouse::Client::default()
            .with_url(url)
            .with_user(user)
            .with_database(&database)
            .with_option("output_format_json_quote_decimals", "1");
        if let Some(password) = credential.password.as_deref() {
            client = client.with_password(password);
        }

        client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to ClickHouse: {}", e)))?;

        tracing::info!(database = %database, "ClickHouse connection established");
        Ok(Self { client, database })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub(crate) fn executor(&self) -> ClickHouseExecutor {
        ClickHouseExecutor {
            client: self.client.clone(),
        }
    }

    /// Databases with their tables and views
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let databases =
            fetch_rows(&self.client, "SELECT name FROM system.databases ORDER BY name").await?;
        let tables = fetch_rows(
            &self.client,
            "SELECT database, name, engine FROM system.tables \
             WHERE database NOT IN ('system', 'INFORMATION_SCHEMA', 'information_schema') \
             ORDER BY database, name",
        )
        .await?;

        let mut by_database: BTreeMap<String, Vec<MetadataNode>> = BTreeMap::new();
        for row in &tables.rows {
            let (Some(db), Some(name)) = (text_cell(row, 0), text_cell(row, 1)) else {
                continue;
            };
            let kind = match text_cell(row, 2) {
                Some("View" | "MaterializedView" | "LiveView") => NodeKind::View,
                _ => NodeKind::Table,
            };
            by_database
                .entry(db.to_string())
                .or_default()
                .push(MetadataNode::leaf(name, kind));
        }

        Ok(databases
            .rows
            .iter()
            .filter_map(|row| text_cell(row, 0))
            .filter(|db| !matches!(*db, "system" | "INFORMATION_SCHEMA" | "information_schema"))
            .map(|db| {
                let children = by_database.remove(db).unwrap_or_default();
                MetadataNode::branch(db, NodeKind::Database, children)
            })
            .collect())
    }
}

pub(crate) struct ClickHouseExecutor {
    client: clickhouse::Client,
}

#[async_trait]
impl StatementExecutor for ClickHouseExecutor {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        if let Some(database) = use_database_name(sql) {
            self.client = self.client.clone().with_database(database);
            return Ok(QueryResult::empty());
        }

        let mut result = if returns_rows(sql) {
            fetch_rows(&self.client, sql).await?
        } else {
            // ClickHouse does not report affected rows over HTTP
            self.client
                .query(sql)
                .execute()
                .await
                .map_err(|e| ConduitError::Exec(e.to_string()))?;
            QueryResult::empty()
        };
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
    }
}

async fn fetch_rows(client: &clickhouse::Client, sql: &str) -> Result<QueryResult> {
    let mut cursor = client
        .query(sql)
        .fetch_bytes(ROW_FORMAT)
        .map_err(|e| ConduitError::Exec(e.to_string()))?;

    let mut body = Vec::new();
    while let Some(chunk) = cursor
        .next()
        .await
        .map_err(|e| ConduitError::Exec(format!("Failed to read query result: {}", e)))?
    {
        body.extend_from_slice(&chunk);
    }

    let result = parse_compact_rows(&body)?;
    tracing::debug!(row_count = result.rows.len(), "query executed successfully");
    Ok(result)
}

fn text_cell(row: &conduit_core::Row, idx: usize) -> Option<&str> {
    match row.get(idx) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Statements answered with a result set
pub(crate) fn returns_rows(sql: &str) -> bool {
    let upper = strip_leading_comments(sql).to_ascii_uppercase();
    let first = upper
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    matches!(
        first,
        "SELECT" | "WITH" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "EXISTS"
    )
}
