//! Metacognitive analysis pipeline
//!
//! Stages, leaf first:
//! - `emotion`: per-note valence/arousal scoring
//! - `loops`: recurring-topic clustering
//! - `bias`: cognitive-bias signal evaluation
//! - `patterns`: hourly/weekly/rolling statistics
//! - `prediction`: trend, recurrence and bias-tendency predictions
//!
//! `AnalysisOrchestrator` wires them together over the store traits in
//! `crate::store`, with bounded concurrency, cancellation and watermarks.

pub mod bias;
pub mod control;
pub mod emotion;
pub mod loops;
pub mod orchestrator;
pub mod patterns;
pub mod prediction;
mod types;

pub use bias::{BiasDetector, LexicalBiasDetector};
pub use control::{CancelHandle, ManualPressure, PressureSource, ResourcePressure};
pub use emotion::{EmotionAnalyzer, LexicalEmotionAnalyzer};
pub use loops::{KeywordLoopDetector, LoopDetector};
pub use orchestrator::{plan_insights, AnalysisOrchestrator, InsightDraft};
pub use patterns::PatternAggregator;
pub use prediction::{PredictionEngine, TrendPredictionEngine};
pub use types::*;
