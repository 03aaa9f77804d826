//! Decision ledger operations (`ai_audit_log`)

use rusqlite::{params, Row};

use super::{parse_datetime, Database};
use crate::audit::AuditLedger;
use crate::error::{Error, Result};
use crate::models::{AuditEntry, AuditKind, NewAuditEntry};

const AUDIT_COLUMNS: &str = "id, kind, method, confidence, input_summary, output_summary, \
                             model, latency_ms, supersedes, timestamp";

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let kind_str: String = row.get(1)?;
    let timestamp_str: String = row.get(9)?;
    let kind = AuditKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            Box::new(Error::InvalidData(format!("unknown audit kind '{}'", kind_str))),
        )
    })?;

    Ok(AuditEntry {
        id: row.get(0)?,
        kind,
        method: row.get(2)?,
        confidence: row.get(3)?,
        input_summary: row.get(4)?,
        output_summary: row.get(5)?,
        model: row.get(6)?,
        latency_ms: row.get(7)?,
        supersedes: row.get(8)?,
        timestamp: parse_datetime(&timestamp_str),
    })
}

impl Database {
    /// Count entries, optionally of one kind
    pub fn count_audit_entries(&self, kind: Option<AuditKind>) -> Result<i64> {
        let conn = self.conn()?;
        let count = match kind {
            Some(kind) => conn.query_row(
                "SELECT COUNT(*) FROM ai_audit_log WHERE kind = ?",
                params![kind.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM ai_audit_log", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    pub fn get_audit_entry(&self, id: i64) -> Result<Option<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ai_audit_log WHERE id = ?",
            AUDIT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], audit_from_row)?;
        let entry = rows.next().transpose()?;
        Ok(entry)
    }
}

impl AuditLedger for Database {
    fn append(&self, entry: &NewAuditEntry) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO ai_audit_log
                (kind, method, confidence, input_summary, output_summary, model, latency_ms, supersedes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.kind.as_str(),
                entry.method,
                entry.confidence,
                entry.input_summary,
                entry.output_summary,
                entry.model,
                entry.latency_ms,
                entry.supersedes,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn list(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;

        // id breaks ties between entries written in the same second
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ai_audit_log ORDER BY id DESC LIMIT ?",
            AUDIT_COLUMNS
        ))?;

        let entries = stmt
            .query_map(params![limit as i64], audit_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn latest_categorization(&self, description: &str) -> Result<Option<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ai_audit_log
             WHERE kind = 'categorization' AND input_summary = ? COLLATE NOCASE
             ORDER BY id DESC LIMIT 1",
            AUDIT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![description], audit_from_row)?;
        let entry = rows.next().transpose()?;
        Ok(entry)
    }
}
