//! Collaborator interfaces consumed by the analysis pipeline
//!
//! The pipeline never touches storage directly. Callers hand the orchestrator
//! implementations of these traits; `db::Database` is the SQLite-backed one.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AnalysisState, Insight, InsightKind, Note, NoteFilter, NoteId, NoteSort, Page};

/// Read/update access to notes
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Fetch notes matching `filter` in `sort` order, restricted to `page`
    async fn fetch(&self, filter: &NoteFilter, sort: NoteSort, page: Page) -> Result<Vec<Note>>;

    /// Persist the analysis fields (sentiment, arousal, topic hash, bias
    /// signals, loop group) and `updated_at` of one note
    async fn update(&self, note: &Note) -> Result<()>;
}

/// Destination for derived insights
#[async_trait]
pub trait InsightSink: Send + Sync {
    /// Create an insight; `payload` is opaque to the pipeline
    async fn create(
        &self,
        kind: InsightKind,
        note_ids: &[NoteId],
        payload: serde_json::Value,
    ) -> Result<Insight>;
}

/// Persistence for the analysis watermarks
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_state(&self) -> Result<AnalysisState>;

    /// Store the state; implementations keep the later of stored and new
    /// timestamps so the watermarks never move backwards
    async fn save_state(&self, state: &AnalysisState) -> Result<()>;
}
