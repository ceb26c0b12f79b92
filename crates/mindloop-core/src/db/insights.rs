//! Insight database operations

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use rusqlite::{params, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Insight, InsightKind, NoteId};
use crate::store::InsightSink;

/// Raw insight columns
struct InsightRow {
    id: i64,
    kind: String,
    note_ids: String,
    payload: String,
    created_at: String,
}

impl InsightRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            note_ids: row.get(2)?,
            payload: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_insight(self) -> Result<Insight> {
        Ok(Insight {
            id: self.id,
            kind: self.kind.parse().map_err(Error::InvalidData)?,
            note_ids: serde_json::from_str(&self.note_ids)?,
            payload: serde_json::from_str(&self.payload)?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl Database {
    /// Store a new insight
    pub fn insert_insight(
        &self,
        kind: InsightKind,
        note_ids: &[NoteId],
        payload: &serde_json::Value,
    ) -> Result<Insight> {
        let conn = self.conn()?;
        // Stored with microsecond precision
        let created_at = Utc::now().trunc_subsecs(6);

        conn.execute(
            "INSERT INTO insights (kind, note_ids, payload, created_at) VALUES (?, ?, ?, ?)",
            params![
                kind.as_str(),
                serde_json::to_string(note_ids)?,
                serde_json::to_string(payload)?,
                format_datetime(&created_at)
            ],
        )?;

        Ok(Insight {
            id: conn.last_insert_rowid(),
            kind,
            note_ids: note_ids.to_vec(),
            payload: payload.clone(),
            created_at,
        })
    }

    /// List insights, newest first, optionally filtered by kind
    pub fn list_insights(&self, kind: Option<InsightKind>, limit: usize) -> Result<Vec<Insight>> {
        let conn = self.conn()?;

        let rows = if let Some(k) = kind {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, kind, note_ids, payload, created_at
                FROM insights
                WHERE kind = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ?
                "#,
            )?;
            let rows = stmt.query_map(params![k.as_str(), limit as i64], InsightRow::from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, kind, note_ids, payload, created_at
                FROM insights
                ORDER BY created_at DESC, id DESC
                LIMIT ?
                "#,
            )?;
            let rows = stmt.query_map(params![limit as i64], InsightRow::from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        rows.into_iter().map(InsightRow::into_insight).collect()
    }

    pub fn insight_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM insights", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl InsightSink for Database {
    async fn create(
        &self,
        kind: InsightKind,
        note_ids: &[NoteId],
        payload: serde_json::Value,
    ) -> Result<Insight> {
        self.insert_insight(kind, note_ids, &payload)
    }
}
