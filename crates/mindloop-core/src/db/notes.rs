//! Note database operations

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::note_query::QueryParts;
use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{BiasSignal, NewNote, Note, NoteFilter, NoteId, NoteSort, Page};
use crate::store::NoteStore;

const NOTE_COLUMNS: &str = "id, created_at, updated_at, modality, content_text, tags, \
     sentiment, arousal, topic_hash, bias_signals, loop_group_id";

/// Raw column values, converted to a `Note` outside the row callback
struct NoteRow {
    id: i64,
    created_at: String,
    updated_at: String,
    modality: String,
    content_text: Option<String>,
    tags: String,
    sentiment: Option<f64>,
    arousal: Option<f64>,
    topic_hash: Option<String>,
    bias_signals: String,
    loop_group_id: Option<String>,
}

impl NoteRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            updated_at: row.get(2)?,
            modality: row.get(3)?,
            content_text: row.get(4)?,
            tags: row.get(5)?,
            sentiment: row.get(6)?,
            arousal: row.get(7)?,
            topic_hash: row.get(8)?,
            bias_signals: row.get(9)?,
            loop_group_id: row.get(10)?,
        })
    }

    fn into_note(self) -> Result<Note> {
        let tags: BTreeSet<String> = serde_json::from_str(&self.tags)?;
        let bias_signals: BTreeMap<BiasSignal, f64> = serde_json::from_str(&self.bias_signals)?;

        Ok(Note {
            id: NoteId(self.id),
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            modality: self.modality.parse().map_err(Error::InvalidData)?,
            content_text: self.content_text,
            tags,
            sentiment: self.sentiment,
            arousal: self.arousal,
            topic_hash: self.topic_hash,
            bias_signals,
            loop_group_id: self.loop_group_id,
        })
    }
}

impl Database {
    /// Create a note; `created_at` defaults to now
    pub fn insert_note(&self, new: &NewNote) -> Result<Note> {
        let conn = self.conn()?;
        let created_at = new.created_at.unwrap_or_else(Utc::now);
        let stamp = format_datetime(&created_at);

        conn.execute(
            r#"
            INSERT INTO notes (created_at, updated_at, modality, content_text, tags)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                stamp,
                stamp,
                new.modality.as_str(),
                new.content_text,
                serde_json::to_string(&new.tags)?
            ],
        )?;
        let id = NoteId(conn.last_insert_rowid());

        self.get_note(id)?
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))
    }

    /// Get a note by id
    pub fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM notes WHERE id = ?", NOTE_COLUMNS);
        let row = conn
            .query_row(&sql, params![id.0], NoteRow::from_row)
            .optional()?;
        row.map(NoteRow::into_note).transpose()
    }

    /// Query notes with a filter, sort order and page
    pub fn query_notes(
        &self,
        filter: &NoteFilter,
        sort: NoteSort,
        page: Page,
    ) -> Result<Vec<Note>> {
        let conn = self.conn()?;
        let parts = QueryParts::build(filter, sort, page);
        let sql = format!(
            "SELECT {} FROM notes {} {} {}",
            NOTE_COLUMNS, parts.where_clause, parts.order_clause, parts.limit_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(parts.param_refs().as_slice(), NoteRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(NoteRow::into_note).collect()
    }

    /// Most recent notes first
    pub fn recent_notes(&self, limit: usize) -> Result<Vec<Note>> {
        self.query_notes(&NoteFilter::all(), NoteSort::CreatedDesc, Page::first(limit))
    }

    /// Total notes, and how many carry an emotion score
    pub fn note_count(&self) -> Result<(i64, i64)> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN sentiment IS NOT NULL AND arousal IS NOT NULL
                                     THEN 1 ELSE 0 END), 0)
            FROM notes
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(counts)
    }

    /// Write the analysis fields and `updated_at` of a note
    pub fn update_note_analysis(&self, note: &Note) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE notes
            SET sentiment = ?,
                arousal = ?,
                topic_hash = ?,
                bias_signals = ?,
                loop_group_id = ?,
                updated_at = ?
            WHERE id = ?
            "#,
            params![
                note.sentiment,
                note.arousal,
                note.topic_hash,
                serde_json::to_string(&note.bias_signals)?,
                note.loop_group_id,
                format_datetime(&note.updated_at),
                note.id.0
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("note {}", note.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl NoteStore for Database {
    async fn fetch(&self, filter: &NoteFilter, sort: NoteSort, page: Page) -> Result<Vec<Note>> {
        self.query_notes(filter, sort, page)
    }

    async fn update(&self, note: &Note) -> Result<()> {
        self.update_note_analysis(note)
    }
}
