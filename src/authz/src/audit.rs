//! Bounded in-memory audit trail
//!
//! Records access checks, soft tenant mismatches on bind, and rebuilds.
//! When full, the oldest entry is dropped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// What an audit entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    AccessCheck,
    TenantMismatch,
    Rebuild,
}

/// Single audit record
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,

    /// Account for checks, binding source for mismatches
    pub subject: String,

    pub action: String,

    /// Resource for checks, binding target for mismatches
    pub target: String,

    pub allowed: Option<bool>,
    pub message: String,
}

impl AuditEntry {
    pub fn new(
        kind: AuditKind,
        subject: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            subject: subject.into(),
            action: action.into(),
            target: target.into(),
            allowed: None,
            message: String::new(),
        }
    }

    pub fn with_outcome(mut self, allowed: bool) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Audit log holding the most recent entries
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Up to `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Entries of one kind, newest first
    pub fn by_kind(&self, kind: AuditKind) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_recent() {
        let log = AuditLog::new(10);
        log.record(AuditEntry::new(AuditKind::AccessCheck, "alice", "read", "/docs/1").with_outcome(true));
        log.record(AuditEntry::new(AuditKind::AccessCheck, "bob", "write", "/docs/1").with_outcome(false));

        let recent = log.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].subject, "bob");
        assert_eq!(recent[0].allowed, Some(false));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = AuditLog::new(2);
        for subject in ["a", "b", "c"] {
            log.record(AuditEntry::new(AuditKind::AccessCheck, subject, "read", "doc"));
        }

        let subjects: Vec<_> = log.recent(10).into_iter().map(|e| e.subject).collect();
        assert_eq!(subjects, vec!["c", "b"]);
    }

    #[test]
    fn test_by_kind() {
        let log = AuditLog::new(10);
        log.record(AuditEntry::new(AuditKind::AccessCheck, "alice", "read", "doc"));
        log.record(
            AuditEntry::new(AuditKind::TenantMismatch, "x", "bind_role_to_account", "reader")
                .with_message("account tenant t2 != role tenant t1"),
        );

        let mismatches = log.by_kind(AuditKind::TenantMismatch);
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].message.contains("t2"));
    }
}
