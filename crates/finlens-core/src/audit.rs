//! Append-only decision ledger
//!
//! Every resolved categorization and every answered question produces
//! exactly one entry. Entries are never updated; a manual override appends
//! a new entry that points at the one it supersedes.
//!
//! The SQLite implementation lives in `db::audit`; `MemoryLedger` is for
//! tests and embedders that do not persist decisions.

use std::sync::Mutex;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{AuditEntry, AuditKind, NewAuditEntry};

/// Storage seam for the audit ledger
pub trait AuditLedger: Send + Sync {
    /// Append one entry, returning its id
    fn append(&self, entry: &NewAuditEntry) -> Result<i64>;

    /// Most recent entries first
    fn list(&self, limit: usize) -> Result<Vec<AuditEntry>>;

    /// Latest categorization entry recorded for this (trimmed) description,
    /// ignoring ASCII case
    fn latest_categorization(&self, description: &str) -> Result<Option<AuditEntry>>;
}

/// In-memory ledger
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<AuditEntry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::InvalidData("Audit ledger lock poisoned".into()))
    }
}

impl AuditLedger for MemoryLedger {
    fn append(&self, entry: &NewAuditEntry) -> Result<i64> {
        let mut entries = self.lock()?;
        let id = entries.len() as i64 + 1;
        entries.push(AuditEntry {
            id,
            kind: entry.kind,
            method: entry.method.clone(),
            confidence: entry.confidence,
            input_summary: entry.input_summary.clone(),
            output_summary: entry.output_summary.clone(),
            model: entry.model.clone(),
            latency_ms: entry.latency_ms,
            supersedes: entry.supersedes,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    fn list(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let entries = self.lock()?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    fn latest_categorization(&self, description: &str) -> Result<Option<AuditEntry>> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .rev()
            .find(|e| {
                e.kind == AuditKind::Categorization
                    && e.input_summary.eq_ignore_ascii_case(description)
            })
            .cloned())
    }
}
