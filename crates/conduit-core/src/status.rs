//! Ephemeral connection status

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Live/dead state of one connection, rebuilt empty on every start
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub last_connected: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Mark connected now, keeping nothing of a previous error
    pub fn mark_connected(&mut self) {
        self.connected = true;
        self.last_connected = Some(Utc::now());
        self.error = None;
    }

    /// Mark disconnected with a captured failure message
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.connected = false;
        self.error = Some(error.into());
    }

    /// Mark disconnected cleanly; `last_connected` survives
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
        self.error = None;
    }
}
