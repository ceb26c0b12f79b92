//! Test utilities for mindloop-core
//!
//! An in-memory store implementing every collaborator trait (with failure
//! switches), plus analyzers that fail, count concurrency, or cancel a run.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::analysis::{CancelHandle, EmotionAnalyzer, EmotionScore, LexicalEmotionAnalyzer};
use crate::error::{Error, Result};
use crate::models::{
    AnalysisState, Insight, InsightKind, Modality, NewNote, Note, NoteFilter, NoteId, NoteSort,
    Page,
};
use crate::store::{InsightSink, NoteStore, StateStore};

/// An unscored text note created (and last updated) at `created_at`
pub fn note_at(id: i64, created_at: DateTime<Utc>, text: &str) -> Note {
    Note {
        id: NoteId(id),
        created_at,
        updated_at: created_at,
        modality: Modality::Text,
        content_text: Some(text.to_string()),
        tags: Default::default(),
        sentiment: None,
        arousal: None,
        topic_hash: None,
        bias_signals: BTreeMap::new(),
        loop_group_id: None,
    }
}

/// The note with an emotion score filled in
pub fn scored(mut note: Note, valence: f64, arousal: f64) -> Note {
    note.sentiment = Some(valence);
    note.arousal = Some(arousal);
    note
}

/// Sort and page notes the way a real store would
pub fn apply_query(
    mut notes: Vec<Note>,
    filter: &NoteFilter,
    sort: NoteSort,
    page: Page,
) -> Vec<Note> {
    notes.retain(|n| filter.matches(n));
    match sort {
        NoteSort::CreatedAsc => {
            notes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        }
        NoteSort::CreatedDesc => {
            notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
        }
        NoteSort::UpdatedAsc => {
            notes.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)))
        }
    }
    notes
        .into_iter()
        .skip(page.offset)
        .take(page.limit.unwrap_or(usize::MAX))
        .collect()
}

/// In-memory note/insight/state store
#[derive(Default)]
pub struct InMemoryStore {
    notes: Mutex<BTreeMap<NoteId, Note>>,
    insights: Mutex<Vec<Insight>>,
    state: Mutex<AnalysisState>,
    next_id: AtomicI64,
    fail_fetch: AtomicBool,
    fail_updates: AtomicBool,
    fail_insights: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a note (timestamps default to now)
    pub fn insert(&self, new: NewNote) -> Note {
        let id = NoteId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let at = new.created_at.unwrap_or_else(Utc::now);
        let note = Note {
            id,
            created_at: at,
            updated_at: at,
            modality: new.modality,
            content_text: new.content_text,
            tags: new.tags,
            sentiment: None,
            arousal: None,
            topic_hash: None,
            bias_signals: BTreeMap::new(),
            loop_group_id: None,
        };
        self.put(note.clone());
        note
    }

    /// Insert or replace a note as-is
    pub fn put(&self, note: Note) {
        self.notes.lock().unwrap().insert(note.id, note);
    }

    pub fn note(&self, id: NoteId) -> Option<Note> {
        self.notes.lock().unwrap().get(&id).cloned()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().values().cloned().collect()
    }

    pub fn insights(&self) -> Vec<Insight> {
        self.insights.lock().unwrap().clone()
    }

    pub fn state(&self) -> AnalysisState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: AnalysisState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make note writes fail the way a lost database connection would
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insights(&self, fail: bool) {
        self.fail_insights.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NoteStore for InMemoryStore {
    async fn fetch(&self, filter: &NoteFilter, sort: NoteSort, page: Page) -> Result<Vec<Note>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::InvalidData("store offline".to_string()));
        }
        Ok(apply_query(self.notes(), filter, sort, page))
    }

    async fn update(&self, note: &Note) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store offline",
            )));
        }
        let mut notes = self.notes.lock().unwrap();
        match notes.get_mut(&note.id) {
            Some(existing) => {
                *existing = note.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("note {}", note.id))),
        }
    }
}

#[async_trait]
impl InsightSink for InMemoryStore {
    async fn create(
        &self,
        kind: InsightKind,
        note_ids: &[NoteId],
        payload: serde_json::Value,
    ) -> Result<Insight> {
        if self.fail_insights.load(Ordering::SeqCst) {
            return Err(Error::InvalidData("insight sink offline".to_string()));
        }
        let mut insights = self.insights.lock().unwrap();
        let insight = Insight {
            id: insights.len() as i64 + 1,
            kind,
            note_ids: note_ids.to_vec(),
            payload,
            created_at: Utc::now(),
        };
        insights.push(insight.clone());
        Ok(insight)
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn load_state(&self) -> Result<AnalysisState> {
        Ok(self.state())
    }

    async fn save_state(&self, state: &AnalysisState) -> Result<()> {
        let mut stored = self.state.lock().unwrap();
        *stored = stored.merged(*state);
        Ok(())
    }
}

/// Lexical analyzer that fails for any text containing `marker`
pub struct FailingAnalyzer {
    marker: String,
    inner: LexicalEmotionAnalyzer,
}

impl FailingAnalyzer {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            inner: LexicalEmotionAnalyzer::new(),
        }
    }
}

#[async_trait]
impl EmotionAnalyzer for FailingAnalyzer {
    async fn analyze(&self, text: &str) -> Result<EmotionScore> {
        if text.contains(&self.marker) {
            return Err(Error::Analyzer("backend unavailable".to_string()));
        }
        self.inner.score(text)
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Analyzer that sleeps per call and records peak concurrency
pub struct CountingAnalyzer {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingAnalyzer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmotionAnalyzer for CountingAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<EmotionScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(EmotionScore::neutral())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Analyzer that triggers `handle` on its `after`-th call (once)
pub struct CancellingAnalyzer {
    handle: CancelHandle,
    after: usize,
    calls: AtomicUsize,
}

impl CancellingAnalyzer {
    pub fn new(handle: CancelHandle, after: usize) -> Self {
        Self {
            handle,
            after,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmotionAnalyzer for CancellingAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<EmotionScore> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.after {
            self.handle.cancel();
        }
        Ok(EmotionScore::neutral())
    }

    fn name(&self) -> &'static str {
        "cancelling"
    }
}
