//! Query history capability injected into the broker

use uuid::Uuid;

use crate::ProtocolKind;

/// One finished `execute_query` call
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub connection_id: Uuid,
    pub kind: ProtocolKind,
    pub query: String,
    pub duration_ms: u64,
    pub item_count: Option<u64>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Sink for execution history
pub trait QueryLogger: Send + Sync {
    fn record(&self, record: ExecutionRecord);
}

/// Logger that drops every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopQueryLogger;

impl QueryLogger for NoopQueryLogger {
    fn record(&self, _record: ExecutionRecord) {}
}
