//! Mindloop Core Library
//!
//! Incremental metacognitive analysis for a personal journal:
//! - Emotion scoring of notes (valence/arousal)
//! - Recurring-topic ("loop") clustering
//! - Cognitive-bias signal evaluation
//! - Time-bucketed statistics and trend predictions
//! - An orchestrator that runs it all incrementally with bounded concurrency
//! - SQLite storage implementing the collaborator traits
//! - TOML configuration for every threshold

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

/// Test utilities: in-memory store and instrumented analyzers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analysis::{
    AnalysisOrchestrator, AnalysisPhase, AnalysisProgress, AnalysisResult, AnalysisStatistics,
    BiasDetector, BiasEvaluation, Bucket, CancelHandle, EmotionAnalyzer, EmotionScore,
    Granularity, Impact, KeywordLoopDetector, LexicalBiasDetector, LexicalEmotionAnalyzer,
    LoopCluster, LoopDetector, ManualPressure, PatternAggregator, Prediction, PredictionEngine,
    PredictionType, PressureSource, ResourcePressure, ScoringReport, TrendPredictionEngine,
};
pub use config::AnalysisConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use models::{
    AnalysisState, BiasSignal, Insight, InsightKind, Modality, NewNote, Note, NoteFilter, NoteId,
    NoteSort, Page,
};
pub use store::{InsightSink, NoteStore, StateStore};
