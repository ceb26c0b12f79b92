//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `notes` - Note creation, lookup, and the `NoteStore` implementation
//! - `insights` - Insight persistence (`InsightSink`)
//! - `state` - The single analysis watermark record (`StateStore`)
//! - `note_query` - SQL builder for note filters, sort orders and paging
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision and a
//! `Z` suffix, so string comparison in SQL matches time order.

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod insights;
mod note_query;
mod notes;
mod state;

pub use note_query::QueryParts;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Format a timestamp for storage
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("Bad timestamp {:?}: {}", s, e)))
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) a database file and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self { pool };
        db.run_migrations()?;

        Ok(db)
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled connection
    /// sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "mindloop_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the scoring writes
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Journal entries with their analysis fields
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                modality TEXT NOT NULL DEFAULT 'text',
                content_text TEXT,
                tags TEXT NOT NULL DEFAULT '[]',            -- JSON array
                sentiment REAL,                              -- valence in [-1, 1]
                arousal REAL,                                -- [0, 1]
                topic_hash TEXT,
                bias_signals TEXT NOT NULL DEFAULT '{}',    -- JSON object
                loop_group_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_notes_created ON notes(created_at);
            CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at);
            CREATE INDEX IF NOT EXISTS idx_notes_loop_group ON notes(loop_group_id);

            -- Derived findings, immutable once written
            CREATE TABLE IF NOT EXISTS insights (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                note_ids TEXT NOT NULL,                      -- JSON array of note ids
                payload TEXT NOT NULL,                       -- JSON, opaque to the pipeline
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_insights_kind ON insights(kind);
            CREATE INDEX IF NOT EXISTS idx_insights_created ON insights(created_at);

            -- Analysis watermarks (exactly one row)
            CREATE TABLE IF NOT EXISTS analysis_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_emotion_analysis_date TEXT,
                last_comprehensive_analysis_date TEXT
            );

            INSERT OR IGNORE INTO analysis_state (id) VALUES (1);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
