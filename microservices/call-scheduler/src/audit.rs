//! Audit trail of scheduling decisions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consultline_core::{Result, SessionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Scheduled,
    ScheduleFailed,
    Resumed,
    Expired,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub session_id: SessionId,
    pub event: AuditEvent,
    pub at: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(session_id: &SessionId, event: AuditEvent, at: DateTime<Utc>, details: serde_json::Value) -> Self {
        Self {
            session_id: session_id.clone(),
            event,
            at,
            details,
        }
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Append-only in-memory audit trail
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn events_for(&self, session_id: &SessionId) -> Vec<AuditEvent> {
        self.entries
            .lock()
            .iter()
            .filter(|e| &e.session_id == session_id)
            .map(|e| e.event)
            .collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        tracing::debug!(
            session_id = %entry.session_id,
            event = ?entry.event,
            "Audit entry recorded"
        );
        self.entries.lock().push(entry);
        Ok(())
    }
}
