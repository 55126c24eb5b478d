//! Permission-check audit trail
//!
//! Every capability check appends one entry, allowed or denied. Entries
//! live in a bounded ring buffer owned by the validator instance (oldest
//! evicted first); durable export is a collaborator concern, so the log
//! only hands out in-memory snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Retention bound used when the policy does not specify one
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// One recorded permission check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub plugin: String,
    /// Namespaced action, e.g. `fs:read` or `network:fetch`
    pub action: String,
    pub resource: String,
    pub allowed: bool,
    /// Summary of the granting permission entry, when the check passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl fmt::Display for AuditLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.allowed { "ALLOWED" } else { "DENIED" };
        write!(
            f,
            "[{}] {} {} {} {}",
            self.timestamp.to_rfc3339(),
            status,
            self.plugin,
            self.action,
            self.resource
        )
    }
}

/// Conjunctive filter over audit entries; `None` fields match everything
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub plugin: Option<String>,
    pub action: Option<String>,
    pub allowed: Option<bool>,
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(plugin) = &self.plugin {
            if &entry.plugin != plugin {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(allowed) = self.allowed {
            if entry.allowed != allowed {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Bounded append-only ring buffer of audit entries
///
/// Appends from concurrent contexts are serialized by a single writer
/// lock so no entry is interleaved or lost.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditLogEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, entry: AuditLogEntry) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries matching `filter`, oldest first
    pub fn snapshot(&self, filter: &AuditFilter) -> Vec<AuditLogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}
