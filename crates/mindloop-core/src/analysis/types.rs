//! Core types for the analysis pipeline

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{BiasSignal, Insight, Modality, NoteId};

/// Valence/arousal pair produced by an emotion analyzer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    /// In [-1, 1]
    pub valence: f64,
    /// In [0, 1]
    pub arousal: f64,
}

impl EmotionScore {
    /// Build a score, clamping both components into range
    pub fn new(valence: f64, arousal: f64) -> Self {
        Self {
            valence: clamp_or(valence, -1.0, 1.0, 0.0),
            arousal: clamp_or(arousal, 0.0, 1.0, 0.5),
        }
    }

    /// Score used when no emotional signal is present
    pub fn neutral() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.5,
        }
    }
}

/// Clamp into [lo, hi], mapping NaN to `fallback`
pub(crate) fn clamp_or(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

/// Clamp a ratio or confidence into [0, 1]
pub(crate) fn unit(value: f64) -> f64 {
    clamp_or(value, 0.0, 1.0, 0.0)
}

/// A group of notes sharing a recurring topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopCluster {
    /// Stable id derived from the topic
    pub id: String,
    pub topic: String,
    pub note_ids: Vec<NoteId>,
    /// Share of considered notes in this cluster, in [0, 1]
    pub strength: f64,
}

/// Result of evaluating a note set for bias signals
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BiasEvaluation {
    pub total_notes: usize,
    /// Notes matching each signal; every signal is present
    matching: BTreeMap<BiasSignal, Vec<NoteId>>,
}

impl BiasEvaluation {
    pub fn new(total_notes: usize, mut matching: BTreeMap<BiasSignal, Vec<NoteId>>) -> Self {
        for signal in BiasSignal::all() {
            matching.entry(*signal).or_default();
        }
        Self {
            total_notes,
            matching,
        }
    }

    /// Evaluation of an empty note set
    pub fn empty() -> Self {
        Self::new(0, BTreeMap::new())
    }

    /// Evidence notes for a signal
    pub fn matching(&self, signal: BiasSignal) -> &[NoteId] {
        self.matching.get(&signal).map(Vec::as_slice).unwrap_or(&[])
    }

    /// matching / total, in [0, 1]; 0 for an empty note set
    pub fn score(&self, signal: BiasSignal) -> f64 {
        if self.total_notes == 0 {
            return 0.0;
        }
        unit(self.matching(signal).len() as f64 / self.total_notes as f64)
    }

    /// Scores for all five signals
    pub fn scores(&self) -> BTreeMap<BiasSignal, f64> {
        BiasSignal::all()
            .iter()
            .map(|s| (*s, self.score(*s)))
            .collect()
    }

    /// Highest-scoring signal; ties resolve to the earlier category
    pub fn dominant(&self) -> Option<(BiasSignal, f64)> {
        BiasSignal::all()
            .iter()
            .map(|s| (*s, self.score(*s)))
            .fold(None, |best, (signal, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((signal, score)),
            })
            .filter(|(_, score)| *score > 0.0)
    }
}

/// Kind of forward-looking prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    PositiveTrend,
    NegativeTrend,
    Stable,
    HighArousal,
    RecurringPattern,
    BiasDetection,
}

impl PredictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PositiveTrend => "positive_trend",
            Self::NegativeTrend => "negative_trend",
            Self::Stable => "stable",
            Self::HighArousal => "high_arousal",
            Self::RecurringPattern => "recurring_pattern",
            Self::BiasDetection => "bias_detection",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ephemeral forward-looking prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction_type: PredictionType,
    pub message: String,
    /// In [0, 1]
    pub confidence: f64,
    pub impact: Impact,
    pub timeframe: String,
}

impl Prediction {
    pub fn new(
        prediction_type: PredictionType,
        message: impl Into<String>,
        confidence: f64,
        impact: Impact,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            prediction_type,
            message: message.into(),
            confidence: unit(confidence),
            impact,
            timeframe: timeframe.into(),
        }
    }
}

/// Bucketing granularity for the pattern aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// 24 buckets keyed by UTC hour 0-23
    Hourly,
    /// 7 buckets keyed by ISO weekday 1 (Monday) - 7 (Sunday)
    Weekly,
    /// `count` consecutive windows of `days` days, key 0 is the most recent
    Rolling { days: u32, count: u32 },
}

/// Aggregate over one bucket of notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: u32,
    /// Notes falling in the bucket
    pub count: usize,
    /// Notes in the bucket with an emotion score
    pub scored_count: usize,
    /// 0 when no scored notes
    pub average_valence: f64,
    /// 0 when no scored notes
    pub average_arousal: f64,
}

/// Corpus-wide aggregate statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatistics {
    pub total_notes: usize,
    pub analyzed_notes: usize,
    pub average_valence: f64,
    pub average_arousal: f64,
    pub hourly: Vec<Bucket>,
    pub weekly: Vec<Bucket>,
    /// Last seven one-day windows, most recent first
    pub daily: Vec<Bucket>,
    pub modality_counts: BTreeMap<Modality, usize>,
}

/// Outcome of an incremental scoring pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringReport {
    /// Notes selected for scoring
    pub total: usize,
    pub scored: usize,
    /// Per-note analyzer or update failures
    pub failed: usize,
    /// Notes without text (nothing to score)
    pub skipped: usize,
    pub batches_completed: usize,
    pub cancelled: bool,
}

impl ScoringReport {
    /// Share of scoreable notes that were scored; 1.0 when nothing was pending
    pub fn coverage(&self) -> f64 {
        let scoreable = self.total - self.skipped;
        if scoreable == 0 {
            1.0
        } else {
            self.scored as f64 / scoreable as f64
        }
    }
}

/// Everything a comprehensive analysis produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub clusters: Vec<LoopCluster>,
    pub statistics: AnalysisStatistics,
    pub insights: Vec<Insight>,
    pub bias_signals: BTreeMap<BiasSignal, f64>,
    pub predictions: Vec<Prediction>,
    pub scoring: ScoringReport,
}

/// Pipeline phase, for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    Idle,
    Fetching,
    Scoring,
    Clustering,
    EvaluatingBias,
    Aggregating,
    Predicting,
    Persisting,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Scoring => "scoring",
            Self::Clustering => "clustering",
            Self::EvaluatingBias => "evaluating_bias",
            Self::Aggregating => "aggregating",
            Self::Predicting => "predicting",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot published on the progress channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisProgress {
    /// In [0, 1], non-decreasing within a run
    pub fraction: f64,
    pub is_analyzing: bool,
    pub phase: AnalysisPhase,
}

impl Default for AnalysisProgress {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            is_analyzing: false,
            phase: AnalysisPhase::Idle,
        }
    }
}
