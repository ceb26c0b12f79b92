//! Domain models for Mindloop

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque note identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a note was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    Text,
    Audio,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

impl std::str::FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "audio" | "voice" => Ok(Self::Audio),
            "image" | "photo" => Ok(Self::Image),
            _ => Err(format!("Unknown modality: {} (valid: text, audio, image)", s)),
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named cognitive-bias categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasSignal {
    Confirmation,
    Availability,
    Anchoring,
    LossAversion,
    SunkCost,
}

impl BiasSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Availability => "availability",
            Self::Anchoring => "anchoring",
            Self::LossAversion => "loss_aversion",
            Self::SunkCost => "sunk_cost",
        }
    }

    /// Human-readable label for messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation bias",
            Self::Availability => "availability bias",
            Self::Anchoring => "anchoring",
            Self::LossAversion => "loss aversion",
            Self::SunkCost => "sunk-cost thinking",
        }
    }

    /// All categories, in a fixed order
    pub fn all() -> &'static [BiasSignal] {
        &[
            Self::Confirmation,
            Self::Availability,
            Self::Anchoring,
            Self::LossAversion,
            Self::SunkCost,
        ]
    }
}

impl std::str::FromStr for BiasSignal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "confirmation" => Ok(Self::Confirmation),
            "availability" => Ok(Self::Availability),
            "anchoring" => Ok(Self::Anchoring),
            "loss_aversion" => Ok(Self::LossAversion),
            "sunk_cost" => Ok(Self::SunkCost),
            _ => Err(format!("Unknown bias signal: {}", s)),
        }
    }
}

impl std::fmt::Display for BiasSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub modality: Modality,
    pub content_text: Option<String>,
    pub tags: BTreeSet<String>,
    /// Valence in [-1, 1], None until scored
    pub sentiment: Option<f64>,
    /// Arousal in [0, 1], None until scored
    pub arousal: Option<f64>,
    pub topic_hash: Option<String>,
    pub bias_signals: BTreeMap<BiasSignal, f64>,
    /// Id of the loop cluster this note was last assigned to
    pub loop_group_id: Option<String>,
}

impl Note {
    /// Non-empty trimmed text, if any
    pub fn text(&self) -> Option<&str> {
        self.content_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn is_scored(&self) -> bool {
        self.sentiment.is_some() && self.arousal.is_some()
    }

    /// The (valence, arousal) pair when both are populated
    pub fn emotion(&self) -> Option<(f64, f64)> {
        Some((self.sentiment?, self.arousal?))
    }
}

/// Input for creating a note
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub modality: Modality,
    pub content_text: Option<String>,
    pub tags: BTreeSet<String>,
    /// Defaults to now when None
    pub created_at: Option<DateTime<Utc>>,
}

impl NewNote {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// Filter for note fetches
///
/// `updated_after` and `include_unscored` combine with OR: a note matches when
/// it changed after the timestamp, or when it has text but no emotion score yet.
/// With neither set, every note matches (subject to `modality`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteFilter {
    pub updated_after: Option<DateTime<Utc>>,
    pub modality: Option<Modality>,
    pub include_unscored: bool,
}

impl NoteFilter {
    /// Every note
    pub fn all() -> Self {
        Self::default()
    }

    /// Notes that still need emotion scoring relative to a watermark
    pub fn pending_since(watermark: Option<DateTime<Utc>>) -> Self {
        Self {
            updated_after: watermark,
            modality: None,
            include_unscored: true,
        }
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = Some(modality);
        self
    }

    /// Evaluate the filter against a note (used by in-memory stores)
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(m) = self.modality {
            if note.modality != m {
                return false;
            }
        }

        let unscored = self.include_unscored && !note.is_scored() && note.text().is_some();
        match self.updated_after {
            Some(after) => note.updated_at > after || unscored,
            None if self.include_unscored => unscored,
            None => true,
        }
    }
}

/// Sort order for note fetches; ties are broken by id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteSort {
    #[default]
    CreatedAsc,
    CreatedDesc,
    UpdatedAsc,
}

/// Paging window for note fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

/// Kinds of persisted insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// A recurring topic
    Loop,
    /// A time-of-day/day-of-week mood pattern
    Biorhythm,
    /// A prevalent cognitive-bias signal
    Bias,
    /// Peak positive, high-energy hours
    Creativity,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::Biorhythm => "biorhythm",
            Self::Bias => "bias",
            Self::Creativity => "creativity",
        }
    }
}

impl std::str::FromStr for InsightKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "loop" => Ok(Self::Loop),
            "biorhythm" => Ok(Self::Biorhythm),
            "bias" => Ok(Self::Bias),
            "creativity" => Ok(Self::Creativity),
            _ => Err(format!("Unknown insight kind: {}", s)),
        }
    }
}

impl std::fmt::Display for InsightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted, derived finding with its evidence notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: i64,
    pub kind: InsightKind,
    pub note_ids: Vec<NoteId>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Watermarks for incremental analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisState {
    pub last_emotion_analysis_date: Option<DateTime<Utc>>,
    pub last_comprehensive_analysis_date: Option<DateTime<Utc>>,
}

impl AnalysisState {
    /// Advance the emotion watermark, never moving it backwards
    pub fn advance_emotion(&mut self, to: DateTime<Utc>) {
        self.last_emotion_analysis_date = Some(max_time(self.last_emotion_analysis_date, to));
    }

    /// Advance the comprehensive watermark, never moving it backwards
    pub fn advance_comprehensive(&mut self, to: DateTime<Utc>) {
        self.last_comprehensive_analysis_date =
            Some(max_time(self.last_comprehensive_analysis_date, to));
    }

    /// Combine two states field-wise, keeping the later timestamp of each
    pub fn merged(self, other: AnalysisState) -> AnalysisState {
        AnalysisState {
            last_emotion_analysis_date: later(
                self.last_emotion_analysis_date,
                other.last_emotion_analysis_date,
            ),
            last_comprehensive_analysis_date: later(
                self.last_comprehensive_analysis_date,
                other.last_comprehensive_analysis_date,
            ),
        }
    }
}

fn max_time(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    match current {
        Some(c) if c > candidate => c,
        _ => candidate,
    }
}

fn later(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn note(updated_at: DateTime<Utc>, text: Option<&str>, scored: bool) -> Note {
        Note {
            id: NoteId(1),
            created_at: updated_at,
            updated_at,
            modality: Modality::Text,
            content_text: text.map(String::from),
            tags: BTreeSet::new(),
            sentiment: scored.then_some(0.1),
            arousal: scored.then_some(0.5),
            topic_hash: None,
            bias_signals: BTreeMap::new(),
            loop_group_id: None,
        }
    }

    #[test]
    fn test_modality_parsing() {
        assert_eq!(Modality::from_str("Voice").unwrap(), Modality::Audio);
        assert_eq!(Modality::Image.as_str(), "image");
        assert!(Modality::from_str("video").is_err());
    }

    #[test]
    fn test_bias_signal_round_trip_names() {
        for signal in BiasSignal::all() {
            assert_eq!(BiasSignal::from_str(signal.as_str()).unwrap(), *signal);
        }
        assert_eq!(BiasSignal::all().len(), 5);
    }

    #[test]
    fn test_pending_filter_matches_updated_and_unscored() {
        let watermark = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let filter = NoteFilter::pending_since(Some(watermark));

        let newer = note(watermark + Duration::seconds(1), Some("hello"), true);
        let older_scored = note(watermark - Duration::hours(1), Some("hello"), true);
        let older_unscored = note(watermark - Duration::hours(1), Some("hello"), false);
        let older_empty = note(watermark - Duration::hours(1), Some("   "), false);

        assert!(filter.matches(&newer));
        assert!(!filter.matches(&older_scored));
        assert!(filter.matches(&older_unscored));
        assert!(!filter.matches(&older_empty));
    }

    #[test]
    fn test_filter_modality() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut audio = note(at, Some("memo"), false);
        audio.modality = Modality::Audio;

        assert!(!NoteFilter::all().with_modality(Modality::Text).matches(&audio));
        assert!(NoteFilter::all().with_modality(Modality::Audio).matches(&audio));
    }

    #[test]
    fn test_state_never_moves_backwards() {
        let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let t0 = t1 - Duration::days(1);

        let mut state = AnalysisState::default();
        state.advance_emotion(t1);
        state.advance_emotion(t0);
        assert_eq!(state.last_emotion_analysis_date, Some(t1));

        let stored = AnalysisState {
            last_emotion_analysis_date: Some(t0),
            last_comprehensive_analysis_date: Some(t1),
        };
        let merged = stored.merged(state);
        assert_eq!(merged.last_emotion_analysis_date, Some(t1));
        assert_eq!(merged.last_comprehensive_analysis_date, Some(t1));
    }
}
