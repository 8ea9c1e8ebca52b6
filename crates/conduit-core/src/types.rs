//! Result shapes returned by providers

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// A single cell value from a tabular result
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to a JSON value for callers that render generic data
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int64(v) => Json::from(*v),
            Value::UInt64(v) => Json::from(*v),
            Value::Float64(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Decimal(v) | Value::String(v) => Json::String(v.clone()),
            Value::Bytes(v) => Json::String(format!("<{} bytes>", v.len())),
            Value::Uuid(v) => Json::String(v.to_string()),
            Value::Date(v) => Json::String(v.to_string()),
            Value::Time(v) => Json::String(v.to_string()),
            Value::DateTime(v) => Json::String(v.to_string()),
            Value::DateTimeUtc(v) => Json::String(v.to_rfc3339()),
            Value::Json(v) => v.clone(),
        }
    }

    /// Build a cell from a loosely typed JSON value
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Float64(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) | Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeUtc(v) => write!(f, "{}", v),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Column metadata for a tabular result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    pub name: String,
    /// Data type (backend-specific string)
    pub data_type: String,
    pub ordinal: usize,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ordinal,
        }
    }
}

/// A row from a query result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// Tabular result of one SQL statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    /// Rows affected (for DML statements)
    pub affected_rows: u64,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new empty query result
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
            execution_time_ms: 0,
        }
    }

    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::empty()
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value of the named column in the given row
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// A graph node extracted from a result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: serde_json::Value,
}

/// A graph relationship extracted from a result set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub start_id: String,
    pub end_id: String,
    pub properties: serde_json::Value,
}

/// Flat record list plus the node/edge view of the same data
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphResult {
    pub records: Vec<serde_json::Value>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Output of one `execute_query` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ExecOutput {
    /// Tabular rows (SQL family)
    Rows(QueryResult),
    /// Document list (document stores)
    Documents(Vec<serde_json::Value>),
    /// Graph records with node/edge extraction
    Graph(GraphResult),
    /// Structured service response
    Json(serde_json::Value),
    /// Plain text (shell output, logs)
    Text(String),
    /// Affected item count for write commands
    Affected(u64),
}

impl ExecOutput {
    pub fn as_rows(&self) -> Option<&QueryResult> {
        match self {
            ExecOutput::Rows(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_documents(&self) -> Option<&[serde_json::Value]> {
        match self {
            ExecOutput::Documents(docs) => Some(docs),
            _ => None,
        }
    }

    /// Number of items for history logging
    pub fn item_count(&self) -> u64 {
        match self {
            ExecOutput::Rows(result) if result.rows.is_empty() => result.affected_rows,
            ExecOutput::Rows(result) => result.rows.len() as u64,
            ExecOutput::Documents(docs) => docs.len() as u64,
            ExecOutput::Graph(graph) => graph.records.len() as u64,
            ExecOutput::Json(serde_json::Value::Array(items)) => items.len() as u64,
            ExecOutput::Json(_) | ExecOutput::Text(_) => 1,
            ExecOutput::Affected(n) => *n,
        }
    }
}

/// Kind tag of a metadata tree node
///
/// This vocabulary is closed; tree renderers key icons and menus off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Database,
    Schema,
    Table,
    View,
    Column,
    Collection,
    Index,
    Label,
    Relationship,
    PropertyKey,
    Key,
    Queue,
    Exchange,
    Container,
    Image,
    Volume,
    Network,
    Category,
    Directory,
    File,
}

/// One node of the navigable structure of a backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataNode {
    pub name: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MetadataNode>>,
}

impl MetadataNode {
    /// A node without children
    pub fn leaf(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: None,
        }
    }

    pub fn branch(name: impl Into<String>, kind: NodeKind, children: Vec<MetadataNode>) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Some(children),
        }
    }

    /// Grouping node, e.g. "Containers" under a docker host
    pub fn category(name: impl Into<String>, children: Vec<MetadataNode>) -> Self {
        Self::branch(name, NodeKind::Category, children)
    }

    pub fn child(&self, name: &str) -> Option<&MetadataNode> {
        self.children.as_ref()?.iter().find(|c| c.name == name)
    }
}
