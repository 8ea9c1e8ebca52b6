//! MS SQL Server session wrapper

use async_trait::async_trait;
use conduit_core::sql_script::{StatementExecutor, strip_leading_comments};
use conduit_core::{
    ColumnMeta, ConduitError, ConnectionConfig, Credential, Endpoint, MetadataNode, NodeKind,
    QueryResult, Result, Row,
};
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::time::Instant;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, QueryItem};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::values::column_data_to_value;

type TdsClient = Client<Compat<TcpStream>>;

/// One live TDS client
pub struct MssqlSession {
    client: Mutex<Option<TdsClient>>,
}

impl MssqlSession {
    /// Connect to `endpoint`, log in and round-trip `SELECT 1`
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let mut tds = Config::new();
        tds.host(&endpoint.host);
        tds.port(endpoint.port);
        tds.application_name("conduit");
        if let Some(db) = config.database.as_deref() {
            tds.database(db);
        }
        if config.ssl {
            tds.encryption(EncryptionLevel::Required);
        } else {
            tds.encryption(EncryptionLevel::Off);
        }
        if matches!(config.param("trust_cert"), Some("true") | Some("1")) {
            tds.trust_cert();
        }

        let user = credential
            .resolve_username(config.username.as_deref())
            .ok_or_else(|| {
                ConduitError::Validation(
                    "SQL Server connections require a username (integrated auth is not supported)"
                        .into(),
                )
            })?;
        tds.authentication(AuthMethod::sql_server(
            user,
            credential.password.as_deref().unwrap_or(""),
        ));

        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to reach SQL Server: {}", e)))?;
        tcp.set_nodelay(true)?;

        let mut client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to SQL Server: {}", e)))?;

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ConduitError::Connect(format!("SQL Server verification failed: {}", e)))?
            .into_results()
            .await
            .map_err(|e| ConduitError::Connect(format!("SQL Server verification failed: {}", e)))?;

        tracing::info!("SQL Server connection established");
        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }

    pub(crate) async fn lock(&self) -> Result<MssqlExecutor<'_>> {
        let guard = self.client.lock().await;
        if guard.is_none() {
            return Err(ConduitError::NotConnected("SQL Server connection is closed".into()));
        }
        Ok(MssqlExecutor { guard })
    }

    /// Databases on the server; the current one expands to schemas, tables
    /// and views
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let mut executor = self.lock().await?;
        let client = executor.client()?;

        let current = first_column(client, "SELECT DB_NAME()").await?;
        let databases = first_column(client, "SELECT name FROM sys.databases ORDER BY name").await?;
        let objects = client
            .simple_query(
                "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES \
                 ORDER BY TABLE_SCHEMA, TABLE_NAME",
            )
            .await
            .map_err(exec_error)?
            .into_first_result()
            .await
            .map_err(exec_error)?;

        let mut schemas: BTreeMap<String, Vec<MetadataNode>> = BTreeMap::new();
        for row in &objects {
            let schema = row.get::<&str, _>(0).unwrap_or_default().to_string();
            let name = row.get::<&str, _>(1).unwrap_or_default();
            let kind = if row.get::<&str, _>(2) == Some("VIEW") {
                NodeKind::View
            } else {
                NodeKind::Table
            };
            schemas
                .entry(schema)
                .or_default()
                .push(MetadataNode::leaf(name, kind));
        }

        let current = current.into_iter().next();
        Ok(databases
            .into_iter()
            .map(|name| {
                if Some(&name) == current.as_ref() {
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

    pub async fn close(&self) -> Result<()> {
        if let Some(client) = self.client.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| ConduitError::Exec(format!("SQL Server close failed: {}", e)))?;
        }
        Ok(())
    }
}

/// Holds the client lock while a script runs
pub(crate) struct MssqlExecutor<'a> {
    guard: MutexGuard<'a, Option<TdsClient>>,
}

impl MssqlExecutor<'_> {
    fn client(&mut self) -> Result<&mut TdsClient> {
        self.guard
            .as_mut()
            .ok_or_else(|| ConduitError::NotConnected("SQL Server connection is closed".into()))
    }
}

#[async_trait]
impl StatementExecutor for MssqlExecutor<'_> {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let client = self.client()?;

        if !returns_rows(sql) {
            let done = client.execute(sql, &[]).await.map_err(exec_error)?;
            let mut result = QueryResult::affected(done.rows_affected().iter().sum());
            result.execution_time_ms = start.elapsed().as_millis() as u64;
            return Ok(result);
        }

        // A batch may yield several result sets; the last one is kept.
        let mut stream = client.query(sql, &[]).await.map_err(exec_error)?;
        let mut columns = Vec::new();
        let mut rows = Vec::new();
        while let Some(item) = stream.try_next().await.map_err(exec_error)? {
            match item {
                QueryItem::Metadata(meta) => {
                    columns = meta
                        .columns()
                        .iter()
                        .enumerate()
                        .map(|(idx, col)| {
                            ColumnMeta::new(col.name(), format!("{:?}", col.column_type()), idx)
                        })
                        .collect();
                    rows.clear();
                }
                QueryItem::Row(row) => {
                    rows.push(Row::new(row.into_iter().map(column_data_to_value).collect()));
                }
            }
        }

        tracing::debug!(row_count = rows.len(), "query executed successfully");
        Ok(QueryResult {
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn exec_error(e: tiberius::error::Error) -> ConduitError {
    ConduitError::Exec(e.to_string())
}

async fn first_column(client: &mut TdsClient, sql: &str) -> Result<Vec<String>> {
    let rows = client
        .simple_query(sql)
        .await
        .map_err(exec_error)?
        .into_first_result()
        .await
        .map_err(exec_error)?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get::<&str, _>(0).map(str::to_string))
        .collect())
}

/// Whether a statement produces a result set rather than an affected count
pub(crate) fn returns_rows(sql: &str) -> bool {
    let upper = strip_leading_comments(sql).to_ascii_uppercase();
    let first = upper
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    matches!(first, "SELECT" | "WITH" | "EXEC" | "EXECUTE" | "VALUES")
        || first.starts_with("SP_")
        || upper.contains(" OUTPUT ")
}
