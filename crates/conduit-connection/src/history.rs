//! Bounded in-memory query history

use chrono::{DateTime, Utc};
use conduit_core::{ExecutionRecord, ProtocolKind, QueryLogger};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// Entries kept before the oldest is evicted
pub const MAX_HISTORY_ENTRIES: usize = 1000;

/// One executed query or command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHistoryEntry {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub kind: ProtocolKind,
    pub query: String,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub item_count: Option<u64>,
    pub success: bool,
    pub error: Option<String>,
}

impl From<ExecutionRecord> for QueryHistoryEntry {
    fn from(record: ExecutionRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            success: record.succeeded(),
            connection_id: record.connection_id,
            kind: record.kind,
            query: record.query,
            executed_at: Utc::now(),
            duration_ms: record.duration_ms,
            item_count: record.item_count,
            error: record.error,
        }
    }
}

/// Ring buffer of recent executions, newest last
pub struct QueryHistory {
    entries: Mutex<VecDeque<QueryHistoryEntry>>,
    capacity: usize,
}

impl QueryHistory {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(MAX_HISTORY_ENTRIES))),
            capacity,
        }
    }

    pub fn push(&self, entry: QueryHistoryEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// All entries, most recent first
    pub fn recent(&self) -> Vec<QueryHistoryEntry> {
        self.entries.lock().iter().rev().cloned().collect()
    }

    /// Entries for one connection, most recent first
    pub fn for_connection(&self, connection_id: Uuid) -> Vec<QueryHistoryEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|e| e.connection_id == connection_id)
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over query text
    pub fn search(&self, needle: &str) -> Vec<QueryHistoryEntry> {
        let needle = needle.to_lowercase();
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|e| e.query.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn clear_connection(&self, connection_id: Uuid) {
        self.entries
            .lock()
            .retain(|e| e.connection_id != connection_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryLogger for QueryHistory {
    fn record(&self, record: ExecutionRecord) {
        self.push(record.into());
    }
}
