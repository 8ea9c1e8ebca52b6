//! PostgreSQL session wrapper

use async_trait::async_trait;
use conduit_core::sql_script::{SqlDialect, StatementExecutor};
use conduit_core::{
    CONNECT_TIMEOUT, ColumnMeta, ConduitError, ConnectionConfig, Credential, Endpoint,
    MetadataNode, NodeKind, QueryResult, Result, Row,
};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

use crate::build_tls_connector;
use crate::values::postgres_to_value;

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }
    format!("{} (code: {})", message, db_error.code().code())
}

/// One live PostgreSQL client and its background connection task
pub struct PostgresSession {
    client: Client,
    connection_task: JoinHandle<()>,
    database: String,
}

impl PostgresSession {
    /// Connect to `endpoint` and round-trip `SELECT 1`
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let database = config
            .database
            .clone()
            .unwrap_or_else(|| "postgres".to_string());

        let mut pg = tokio_postgres::Config::new();
        pg.host(&endpoint.host)
            .port(endpoint.port)
            .dbname(&database)
            .connect_timeout(CONNECT_TIMEOUT)
            .application_name("conduit");
        if let Some(user) = credential.resolve_username(config.username.as_deref()) {
            pg.user(user);
        }
        if let Some(password) = credential.password.as_deref() {
            pg.password(password);
        }

        let connect_error = |e: tokio_postgres::Error| {
            ConduitError::Connect(format!(
                "Failed to connect to PostgreSQL: {}",
                format_postgres_error(&e)
            ))
        };

        let (client, connection_task) = if config.ssl {
            pg.ssl_mode(tokio_postgres::config::SslMode::Require);
            let tls = build_tls_connector(config)?;
            let (client, connection) = pg.connect(tls).await.map_err(connect_error)?;
            let task = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            (client, task)
        } else {
            let (client, connection) = pg.connect(NoTls).await.map_err(connect_error)?;
            let task = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            (client, task)
        };

        let session = Self {
            client,
            connection_task,
            database,
        };
        session.client.simple_query("SELECT 1").await.map_err(|e| {
            ConduitError::Connect(format!(
                "PostgreSQL verification failed: {}",
                format_postgres_error(&e)
            ))
        })?;

        tracing::info!(database = %session.database, "PostgreSQL connection established");
        Ok(session)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Run one statement, returning rows when it produces any
    pub async fn run_statement(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let statement = self.client.prepare(sql).await.map_err(|e| {
            ConduitError::Exec(format!("Failed to prepare query: {}", format_postgres_error(&e)))
        })?;

        if statement.columns().is_empty() {
            let affected = self.client.execute(&statement, &[]).await.map_err(|e| {
                ConduitError::Exec(format_postgres_error(&e))
            })?;
            let mut result = QueryResult::affected(affected);
            result.execution_time_ms = start.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let columns: Vec<ColumnMeta> = statement
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| ColumnMeta::new(col.name(), col.type_().name(), idx))
            .collect();

        let pg_rows = self.client.query(&statement, &[]).await.map_err(|e| {
            ConduitError::Exec(format!("Failed to execute query: {}", format_postgres_error(&e)))
        })?;
        let rows = pg_rows
            .iter()
            .map(|row| Row::new((0..columns.len()).map(|i| postgres_to_value(row, i)).collect()))
            .collect::<Vec<_>>();

        tracing::debug!(row_count = rows.len(), "query executed successfully");
        Ok(QueryResult {
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Databases on the server; the connected one expands to schemas,
    /// tables and views
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let databases = self
            .client
            .query(
                "SELECT datname FROM pg_database WHERE datistemplate = false ORDER BY datname",
                &[],
            )
            .await
            .map_err(|e| ConduitError::Exec(format_postgres_error(&e)))?;

        let objects = self
            .client
            .query(
                "SELECT table_schema::text, table_name::text, table_type::text \
                 FROM information_schema.tables \
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
                 ORDER BY table_schema, table_name",
                &[],
            )
            .await
            .map_err(|e| ConduitError::Exec(format_postgres_error(&e)))?;

        let mut schemas: BTreeMap<String, Vec<MetadataNode>> = BTreeMap::new();
        for row in &objects {
            let schema: String = row.get(0);
            let name: String = row.get(1);
            let table_type: String = row.get(2);
            let kind = if table_type == "VIEW" {
                NodeKind::View
            } else {
                NodeKind::Table
            };
            schemas
                .entry(schema)
                .or_default()
                .push(MetadataNode::leaf(name, kind));
        }

        Ok(databases
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                if name == self.database {
                    let children = std::mem::take(&mut schemas)
                        .into_iter()
                        .map(|(schema, tables)| {
                            MetadataNode::branch(schema, NodeKind::Schema, tables)
                        })
                        .collect();
                    MetadataNode::branch(name, NodeKind::Database, children)
                } else {
                    MetadataNode::leaf(name, NodeKind::Database)
                }
            })
            .collect())
    }

}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        self.connection_task.abort();
    }
}

pub(crate) struct PostgresExecutor<'a>(pub &'a PostgresSession);

#[async_trait]
impl StatementExecutor for PostgresExecutor<'_> {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult> {
        self.0.run_statement(sql).await
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }
}
