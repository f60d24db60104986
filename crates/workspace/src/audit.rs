//! Audit trail for workspace side effects.
//!
//! Entries are kept in memory for inspection and forwarded to `tracing` as
//! they are recorded. The in-memory trail is bounded; once full, the oldest
//! entry is evicted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Entries kept by [`AuditLog::new`].
pub const DEFAULT_CAPACITY: usize = 10_000;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub project: String,
    pub event: AuditEvent,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    FileWrite { path: String },
    ShellCommand { command: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("entry_count", &self.count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record an event and forward it to `tracing`.
    pub fn record(
        &self,
        project: &str,
        event: AuditEvent,
        outcome: AuditOutcome,
        details: Option<String>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            project: project.into(),
            event,
            outcome,
            details,
        };

        match entry.outcome {
            AuditOutcome::Success => tracing::info!(
                project = %entry.project,
                event = ?entry.event,
                outcome = ?entry.outcome,
                "Workspace audit"
            ),
            AuditOutcome::Failure | AuditOutcome::Denied => tracing::warn!(
                project = %entry.project,
                event = ?entry.event,
                outcome = ?entry.outcome,
                details = entry.details.as_deref().unwrap_or(""),
                "Workspace audit"
            ),
        }

        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn entries_by_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| e.outcome == outcome)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_filters() {
        let log = AuditLog::new();
        log.record(
            "p1",
            AuditEvent::FileWrite { path: "a.txt".into() },
            AuditOutcome::Success,
            None,
        );
        log.record(
            "p1",
            AuditEvent::ShellCommand { command: "rm -rf /".into() },
            AuditOutcome::Denied,
            Some("not in allowlist".into()),
        );

        assert_eq!(log.count(), 2);
        let denied = log.entries_by_outcome(AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert_eq!(
            denied[0].event,
            AuditEvent::ShellCommand { command: "rm -rf /".into() }
        );

        log.clear();
        assert_eq!(log.count(), 0);
    }

    #[test]
    fn oldest_entries_evicted_at_capacity() {
        let log = AuditLog::with_capacity(2);
        for path in ["a", "b", "c"] {
            log.record(
                "p",
                AuditEvent::FileWrite { path: path.into() },
                AuditOutcome::Success,
                None,
            );
        }

        let kept: Vec<_> = log.entries().into_iter().map(|e| e.event).collect();
        assert_eq!(
            kept,
            vec![
                AuditEvent::FileWrite { path: "b".into() },
                AuditEvent::FileWrite { path: "c".into() },
            ]
        );
    }

    #[test]
    fn entry_serializes_with_tagged_event() {
        let log = AuditLog::new();
        log.record(
            "p",
            AuditEvent::FileWrite { path: "x".into() },
            AuditOutcome::Failure,
            Some("disk full".into()),
        );
        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["event"]["type"], "file_write");
        assert_eq!(json["outcome"], "failure");
    }
}
