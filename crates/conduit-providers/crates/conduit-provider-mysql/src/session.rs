//! MySQL session wrapper

use async_trait::async_trait;
use conduit_core::sql_script::{SqlDialect, StatementExecutor};
use conduit_core::{
    ColumnMeta, ConduitError, ConnectionConfig, Credential, Endpoint,
    MetadataNode, NodeKind, QueryResult, Result, Row, Value,
};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

use crate::ssl_opts_for;

const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

/// One live MySQL/MariaDB connection
///
/// A single connection (not a pool) so a `USE` inside a script carries
/// over to the statements after it.
pub struct MySqlSession {
    conn: Mutex<Option<Conn>>,
}

impl MySqlSession {
    /// Connect to `endpoint` and ping the server
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port, database = config.database.as_deref()))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let builder = OptsBuilder::default()
            .ip_or_hostname(endpoint.host.clone())
            .tcp_port(endpoint.port)
            .db_name(config.database.clone())
            .user(
                credential
                    .resolve_username(config.username.as_deref())
                    .map(str::to_string),
            )
            .pass(credential.password.clone())
            .ssl_opts(ssl_opts_for(config)?);

        let mut conn = Conn::new(builder)
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to MySQL: {}", e)))?;
        conn.ping()
            .await
            .map_err(|e| ConduitError::Connect(format!("MySQL verification failed: {}", e)))?;

        tracing::info!("MySQL connection established");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Lock the connection for a sequence of statements
    pub(crate) async fn lock(&self) -> Result<MySqlExecutor<'_>> {
        let guard = self.conn.lock().await;
        if guard.is_none() {
            return Err(ConduitError::NotConnected("MySQL connection is closed".into()));
        }
        Ok(MySqlExecutor { guard })
    }

    /// Databases with their tables and views
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let mut executor = self.lock().await?;
        let conn = executor.conn()?;

        let databases: Vec<String> = conn.query("SHOW DATABASES").await.map_err(exec_error)?;
        let objects: Vec<(String, String, String)> = conn
            .query(
                "SELECT table_schema, table_name, table_type FROM information_schema.tables \
                 WHERE table_schema NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys') \
                 ORDER BY table_schema, table_name",
            )
            .await
            .map_err(exec_error)?;

        let mut by_schema: BTreeMap<String, Vec<MetadataNode>> = BTreeMap::new();
        for (schema, name, table_type) in objects {
            let kind = if table_type.eq_ignore_ascii_case("VIEW") {
                NodeKind::View
            } else {
                NodeKind::Table
            };
            by_schema
                .entry(schema)
                .or_default()
                .push(MetadataNode::leaf(name, kind));
        }

        Ok(databases
            .into_iter()
            .filter(|db| !SYSTEM_SCHEMAS.contains(&db.as_str()))
            .map(|db| {
                let tables = by_schema.remove(&db).unwrap_or_default();
                MetadataNode::branch(db, NodeKind::Database, tables)
            })
            .collect())
    }

    /// Send COM_QUIT; the session is unusable afterwards
    pub async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.disconnect()
                .await
                .map_err(|e| ConduitError::Exec(format!("MySQL disconnect failed: {}", e)))?;
        }
        Ok(())
    }
}

/// Holds the connection lock while a script runs
pub(crate) struct MySqlExecutor<'a> {
    guard: MutexGuard<'a, Option<Conn>>,
}

impl MySqlExecutor<'_> {
    fn conn(&mut self) -> Result<&mut Conn> {
        self.guard
            .as_mut()
            .ok_or_else(|| ConduitError::NotConnected("MySQL connection is closed".into()))
    }
}

#[async_trait]
impl StatementExecutor for MySqlExecutor<'_> {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let conn = self.conn()?;
        let mut result = conn.query_iter(sql).await.map_err(exec_error)?;

        let column_defs = result.columns().map(|c| c.to_vec()).unwrap_or_default();
        let mysql_rows: Vec<mysql_async::Row> = result.collect().await.map_err(exec_error)?;
        let affected_rows = result.affected_rows();
        result.drop_result().await.map_err(exec_error)?;

        let columns: Vec<ColumnMeta> = column_defs
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                ColumnMeta::new(col.name_str(), format!("{:?}", col.column_type()), idx)
            })
            .collect();
        let types: Vec<ColumnType> = column_defs.iter().map(|c| c.column_type()).collect();

        let rows = mysql_rows
            .into_iter()
            .map(|row| {
                Row::new(
                    row.unwrap()
                        .into_iter()
                        .enumerate()
                        .map(|(idx, value)| {
                            let col_type = types
                                .get(idx)
                                .copied()
                                .unwrap_or(ColumnType::MYSQL_TYPE_STRING);
                            mysql_value_to_value(value, col_type)
                        })
                        .collect(),
                )
            })
            .collect();

        Ok(QueryResult {
            columns,
            rows,
            affected_rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
    }
}

fn exec_error(e: mysql_async::Error) -> ConduitError {
    ConduitError::Exec(e.to_string())
}

/// Convert one text-protocol cell using its column type
pub(crate) fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => s
                    .parse::<i64>()
                    .map(Value::Int64)
                    .or_else(|_| s.parse::<u64>().map(Value::UInt64))
                    .unwrap_or(Value::String(s)),
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(s)
                }
                ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&s)
                    .map(Value::Json)
                    .unwrap_or(Value::String(s)),
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => Value::UInt64(u),
        mysql_async::Value::Float(f) => Value::Float64(f.into()),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            if hour == 0 && min == 0 && sec == 0 && micro == 0 {
                date.map(Value::Date).unwrap_or_else(|| {
                    Value::String(format!("{:04}-{:02}-{:02}", year, month, day))
                })
            } else {
                date.and_then(|d| d.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro))
                    .map(Value::DateTime)
                    .unwrap_or_else(|| {
                        Value::String(format!(
                            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                            year, month, day, hour, min, sec
                        ))
                    })
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}
