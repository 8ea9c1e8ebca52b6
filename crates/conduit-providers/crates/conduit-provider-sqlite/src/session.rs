//! SQLite session wrapper

use async_trait::async_trait;
use conduit_core::sql_script::StatementExecutor;
use conduit_core::{
    ColumnMeta, ConduitError, MetadataNode, NodeKind, QueryResult, Result, Row, Value, run_blocking,
};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// One open SQLite database file
///
/// rusqlite calls block, so every operation runs on the blocking pool with
/// the connection behind a mutex.
pub struct SqliteSession {
    conn: Arc<Mutex<RusqliteConnection>>,
    path: String,
}

impl SqliteSession {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        let expanded = expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                ConduitError::Connect(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if let Some(parent) = expanded.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                return Err(ConduitError::Connect(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
            RusqliteConnection::open_with_flags(&expanded, flags).map_err(|e| {
                ConduitError::Connect(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded.display(),
                    e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| ConduitError::Connect(format!("Failed to enable foreign keys: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: expanded.to_string_lossy().to_string(),
        })
    }

    /// Round-trip a trivial query
    pub fn verify(&self) -> Result<()> {
        self.conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| ConduitError::Connect(format!("SQLite verification failed: {}", e)))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run one statement on the blocking pool
    pub async fn run_statement(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        run_blocking("SQLite statement", move || execute_statement(&conn.lock(), &sql)).await
    }

    /// Database file with its tables and views, each listing its columns
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let conn = self.conn.clone();
        let name = Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.clone());

        run_blocking("SQLite metadata", move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT name, type FROM sqlite_master \
                     WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                     ORDER BY name",
                )
                .map_err(exec_error)?;
            let objects = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                .map_err(exec_error)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(exec_error)?;

            let mut children = Vec::with_capacity(objects.len());
            for (object, object_type) in objects {
                let columns = table_columns(&conn, &object)?;
                let kind = if object_type == "view" {
                    NodeKind::View
                } else {
                    NodeKind::Table
                };
                children.push(MetadataNode::branch(object, kind, columns));
            }
            Ok(vec![MetadataNode::branch(name, NodeKind::Database, children)])
        })
        .await
    }
}

/// Adapter that lets the shared script runner drive a session
pub(crate) struct SqliteExecutor<'a>(pub &'a SqliteSession);

#[async_trait]
impl StatementExecutor for SqliteExecutor<'_> {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult> {
        self.0.run_statement(sql).await
    }
}

fn exec_error(e: rusqlite::Error) -> ConduitError {
    ConduitError::Exec(e.to_string())
}

fn table_columns(conn: &RusqliteConnection, table: &str) -> Result<Vec<MetadataNode>> {
    let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
    let mut stmt = conn.prepare(&pragma).map_err(exec_error)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(exec_error)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(exec_error)?;
    Ok(columns
        .into_iter()
        .map(|c| MetadataNode::leaf(c, NodeKind::Column))
        .collect())
}

fn execute_statement(conn: &RusqliteConnection, sql: &str) -> Result<QueryResult> {
    let start = Instant::now();
    let mut stmt = conn.prepare(sql).map_err(exec_error)?;

    if stmt.column_count() == 0 {
        stmt.raw_execute().map_err(exec_error)?;
        let mut result = QueryResult::affected(conn.changes() as u64);
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        return Ok(result);
    }

    let columns: Vec<ColumnMeta> = stmt
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| ColumnMeta::new(col.name(), col.decl_type().unwrap_or(""), idx))
        .collect();
    let column_count = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([]).map_err(exec_error)?;
    while let Some(row) = cursor.next().map_err(exec_error)? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(sqlite_to_value(row.get_ref(idx).map_err(exec_error)?));
        }
        rows.push(Row::new(values));
    }

    tracing::debug!(row_count = rows.len(), "query executed successfully");
    Ok(QueryResult {
        columns,
        rows,
        affected_rows: 0,
        execution_time_ms: start.elapsed().as_millis() as u64,
    })
}

fn sqlite_to_value(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Expand `~/` and make relative paths absolute
fn expand_path(path: &str) -> Result<PathBuf> {
    if path == ":memory:" || path.starts_with("file:") {
        return Ok(PathBuf::from(path));
    }

    let expanded = if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .ok_or_else(|| ConduitError::Validation("Unable to determine home directory".into()))?
            .join(rest)
    } else if path.starts_with('~') {
        return Err(ConduitError::Validation(
            "User-specific home directories (~user) are not supported".into(),
        ));
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        Ok(std::env::current_dir()?.join(expanded))
    } else {
        Ok(expanded)
    }
}
