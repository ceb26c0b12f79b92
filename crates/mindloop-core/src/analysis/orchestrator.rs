//! Analysis orchestrator - drives notes through the analysis stages
//!
//! A run moves through `Fetching -> Scoring -> Clustering -> EvaluatingBias ->
//! Aggregating -> Predicting -> Persisting`. Scoring is incremental (only notes
//! changed since the emotion watermark, plus notes that never got a score);
//! every later stage recomputes over the full corpus.
//!
//! Watermark rules:
//! - The emotion watermark advances to the scoring completion time when
//!   scoring finishes, or to the end of the last completed batch when the run
//!   is cancelled. It never passes the original `updated_at` of a previously
//!   scored note left unreached by a cancelled run, so such notes are fetched
//!   again next time.
//! - A previously scored note that fails to rescore has its scores cleared,
//!   which keeps it pending without holding the watermark back.
//! - A store failure while scoring aborts the run and leaves it untouched.
//! - The comprehensive watermark only advances after insights are persisted.
//! - Both only move forward.

use std::slice;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::models::{InsightKind, Note, NoteFilter, NoteId, NoteSort, Page};
use crate::store::{InsightSink, NoteStore, StateStore};

use super::bias::{BiasDetector, LexicalBiasDetector};
use super::control::{CancelHandle, ManualPressure, PressureSource, ProgressTracker};
use super::emotion::{EmotionAnalyzer, LexicalEmotionAnalyzer};
use super::loops::{topic_hash, KeywordLoopDetector, LoopDetector};
use super::patterns::PatternAggregator;
use super::prediction::{PredictionEngine, TrendPredictionEngine};
use super::types::{
    AnalysisPhase, AnalysisProgress, AnalysisResult, AnalysisStatistics, BiasEvaluation, Bucket,
    LoopCluster, Prediction, PredictionType, ScoringReport,
};

/// Progress weights of the post-fetch phases
const SCORING_WEIGHT: f64 = 0.25;
const CLUSTERING_WEIGHT: f64 = 0.25;
const BIAS_WEIGHT: f64 = 0.25;
const AGGREGATION_WEIGHT: f64 = 0.15;
const PREDICTION_WEIGHT: f64 = 0.10;

/// Outcome of scoring one note
enum NoteOutcome {
    Scored,
    Failed,
}

/// An insight ready to be handed to the sink
#[derive(Debug, Clone, PartialEq)]
pub struct InsightDraft {
    pub kind: InsightKind,
    pub note_ids: Vec<NoteId>,
    pub payload: serde_json::Value,
}

/// Coordinates scoring, clustering, bias evaluation, aggregation and
/// prediction over a note store
pub struct AnalysisOrchestrator {
    notes: Arc<dyn NoteStore>,
    insights: Arc<dyn InsightSink>,
    state: Arc<dyn StateStore>,
    analyzer: Arc<dyn EmotionAnalyzer>,
    loop_detector: Arc<dyn LoopDetector>,
    bias_detector: Arc<dyn BiasDetector>,
    prediction_engine: Arc<dyn PredictionEngine>,
    pressure: Arc<dyn PressureSource>,
    config: AnalysisConfig,
    cancel: CancelHandle,
    progress: watch::Sender<AnalysisProgress>,
    run_lock: Mutex<()>,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator with the bundled stage implementations
    ///
    /// Fails with `Error::Config` when a setting is out of range.
    pub fn new(
        notes: Arc<dyn NoteStore>,
        insights: Arc<dyn InsightSink>,
        state: Arc<dyn StateStore>,
        config: AnalysisConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (progress, _) = watch::channel(AnalysisProgress::default());
        Ok(Self {
            notes,
            insights,
            state,
            analyzer: Arc::new(LexicalEmotionAnalyzer::new()),
            loop_detector: Arc::new(KeywordLoopDetector::with_config(config.loops.clone())),
            bias_detector: Arc::new(LexicalBiasDetector::with_config(config.bias.clone())),
            prediction_engine: Arc::new(TrendPredictionEngine::with_thresholds(
                config.predictions.clone(),
            )),
            pressure: Arc::new(ManualPressure::new()),
            config,
            cancel: CancelHandle::new(),
            progress,
            run_lock: Mutex::new(()),
        })
    }

    /// Create an orchestrator over a single store that provides notes,
    /// insights and state (e.g. `db::Database`)
    pub fn for_store<S>(store: Arc<S>, config: AnalysisConfig) -> Result<Self>
    where
        S: NoteStore + InsightSink + StateStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn EmotionAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_loop_detector(mut self, detector: Arc<dyn LoopDetector>) -> Self {
        self.loop_detector = detector;
        self
    }

    pub fn with_bias_detector(mut self, detector: Arc<dyn BiasDetector>) -> Self {
        self.bias_detector = detector;
        self
    }

    pub fn with_prediction_engine(mut self, engine: Arc<dyn PredictionEngine>) -> Self {
        self.prediction_engine = engine;
        self
    }

    pub fn with_pressure_source(mut self, source: Arc<dyn PressureSource>) -> Self {
        self.pressure = source;
        self
    }

    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Handle for cancelling the current run from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Progress updates for the current and future runs
    pub fn subscribe(&self) -> watch::Receiver<AnalysisProgress> {
        self.progress.subscribe()
    }

    pub fn is_analyzing(&self) -> bool {
        self.progress.borrow().is_analyzing
    }

    /// Score notes changed since the last scoring pass
    ///
    /// Cancellation and timeout are reported through `ScoringReport::cancelled`.
    pub async fn run_incremental_scoring(&self) -> Result<ScoringReport> {
        let _guard = self.run_lock.try_lock().map_err(|_| Error::AlreadyRunning)?;
        self.cancel.reset();
        let deadline = Instant::now() + self.config.settings.timeout_interval;

        let mut progress = ProgressTracker::start(&self.progress);
        let outcome = self.score_pending(&mut progress, deadline).await;
        progress.finish(outcome.as_ref().is_ok_and(|r| !r.cancelled));
        outcome
    }

    /// Incremental scoring followed by a full-corpus pass that persists insights
    pub async fn run_comprehensive_analysis(&self) -> Result<AnalysisResult> {
        let _guard = self.run_lock.try_lock().map_err(|_| Error::AlreadyRunning)?;
        self.cancel.reset();
        let deadline = Instant::now() + self.config.settings.timeout_interval;

        let mut progress = ProgressTracker::start(&self.progress);
        let outcome = self.comprehensive(&mut progress, deadline).await;
        progress.finish(outcome.is_ok());

        match &outcome {
            Ok(result) => tracing::info!(
                notes = result.statistics.total_notes,
                clusters = result.clusters.len(),
                insights = result.insights.len(),
                predictions = result.predictions.len(),
                "Comprehensive analysis complete"
            ),
            Err(e) => tracing::warn!(error = %e, "Comprehensive analysis did not complete"),
        }
        outcome
    }

    /// Current predictions over the stored corpus (read-only)
    pub async fn predict(&self) -> Result<Vec<Prediction>> {
        let corpus = self.fetch_all(&NoteFilter::all(), NoteSort::CreatedAsc).await?;
        let clusters = self
            .loop_detector
            .cluster(&corpus)
            .map_err(|e| Error::stage("clustering", e))?;
        let bias = self
            .bias_detector
            .evaluate(&corpus)
            .map_err(|e| Error::stage("bias", e))?;

        Ok(self
            .prediction_engine
            .predict(&corpus, &clusters, &bias, Utc::now()))
    }

    fn should_stop(&self, deadline: Instant) -> bool {
        if self.cancel.is_cancelled() {
            tracing::info!("Analysis cancelled");
            return true;
        }
        if Instant::now() >= deadline {
            tracing::warn!(
                timeout_secs = self.config.settings.timeout_interval.as_secs_f64(),
                "Analysis timed out"
            );
            return true;
        }
        false
    }

    /// Read every note matching `filter`, one page at a time
    async fn fetch_all(&self, filter: &NoteFilter, sort: NoteSort) -> Result<Vec<Note>> {
        let page_size = self.config.settings.fetch_page_size;
        let mut all: Vec<Note> = Vec::new();

        loop {
            let page = self
                .notes
                .fetch(filter, sort, Page::new(page_size, all.len()))
                .await
                .map_err(|e| Error::Fetch(e.to_string()))?;
            let fetched = page.len();
            all.extend(page);
            if fetched < page_size {
                break;
            }
        }

        Ok(all)
    }

    async fn score_pending(
        &self,
        progress: &mut ProgressTracker<'_>,
        deadline: Instant,
    ) -> Result<ScoringReport> {
        let mut state = self
            .state
            .load_state()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let watermark = state.last_emotion_analysis_date;

        let pending = self
            .fetch_all(&NoteFilter::pending_since(watermark), NoteSort::UpdatedAsc)
            .await?;
        let (scoreable, skipped): (Vec<Note>, Vec<Note>) =
            pending.into_iter().partition(|n| n.text().is_some());

        let mut report = ScoringReport {
            total: scoreable.len() + skipped.len(),
            skipped: skipped.len(),
            ..Default::default()
        };
        tracing::debug!(
            pending = report.total,
            skipped = report.skipped,
            watermark = ?watermark,
            "Fetched notes for scoring"
        );

        progress.segment(0.0, SCORING_WEIGHT);
        progress.report(AnalysisPhase::Scoring, 0.0);

        let batch_size = self.config.settings.batch_size;
        let batch_count = scoreable.len().div_ceil(batch_size);
        let mut last_batch_end: Option<DateTime<Utc>> = None;
        // Previously scored notes a cancelled run never reached
        let mut not_rescored: Vec<DateTime<Utc>> = Vec::new();

        for (index, batch) in scoreable.chunks(batch_size).enumerate() {
            if self.should_stop(deadline) {
                report.cancelled = true;
                not_rescored.extend(
                    scoreable[index * batch_size..]
                        .iter()
                        .filter(|n| n.is_scored())
                        .map(|n| n.updated_at),
                );
                break;
            }

            let concurrency = self
                .pressure
                .pressure()
                .effective_concurrency(self.config.settings.max_concurrent_operations);

            let mut scoring = Vec::with_capacity(batch.len());
            for note in batch {
                scoring.push(self.score_note(note));
            }
            let outcomes: Vec<Result<NoteOutcome>> = stream::iter(scoring)
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome? {
                    NoteOutcome::Scored => report.scored += 1,
                    NoteOutcome::Failed => report.failed += 1,
                }
            }

            report.batches_completed += 1;
            last_batch_end = Some(Utc::now());
            tracing::debug!(
                batch = index + 1,
                of = batch_count,
                concurrency,
                scored = report.scored,
                failed = report.failed,
                "Scoring batch complete"
            );
            progress.report(
                AnalysisPhase::Scoring,
                (index + 1) as f64 / batch_count as f64,
            );
        }

        let reached = if report.cancelled {
            last_batch_end
        } else {
            Some(Utc::now())
        };
        let limit = not_rescored
            .iter()
            .min()
            .map(|t| *t - Duration::microseconds(1));

        if let Some(mut advance_to) = reached {
            if let Some(limit) = limit {
                advance_to = advance_to.min(limit);
            }
            state.advance_emotion(advance_to);
            self.state.save_state(&state).await?;
        }

        progress.report(AnalysisPhase::Scoring, 1.0);
        tracing::info!(
            total = report.total,
            scored = report.scored,
            failed = report.failed,
            skipped = report.skipped,
            batches = report.batches_completed,
            cancelled = report.cancelled,
            "Incremental scoring complete"
        );

        Ok(report)
    }

    /// Score one note and write it back
    ///
    /// Per-note failures stay with the note; anything else is returned.
    async fn score_note(&self, note: &Note) -> Result<NoteOutcome> {
        match self.try_score_note(note).await {
            Ok(()) => Ok(NoteOutcome::Scored),
            Err(e) if e.is_per_note() => {
                tracing::warn!(
                    note = %note.id,
                    analyzer = self.analyzer.name(),
                    error = %e,
                    "Failed to score note"
                );
                if note.is_scored() && !matches!(e, Error::NotFound(_)) {
                    self.clear_scores(note).await?;
                }
                Ok(NoteOutcome::Failed)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop stale scores so the note stays pending until it scores again
    async fn clear_scores(&self, note: &Note) -> Result<()> {
        let mut cleared = note.clone();
        cleared.sentiment = None;
        cleared.arousal = None;
        cleared.topic_hash = None;
        cleared.bias_signals.clear();
        self.notes.update(&cleared).await
    }

    async fn try_score_note(&self, note: &Note) -> Result<()> {
        let text = note
            .text()
            .ok_or_else(|| Error::InvalidData(format!("note {} has no text", note.id)))?;
        let score = self.analyzer.analyze(text).await?;

        let mut updated = note.clone();
        updated.sentiment = Some(score.valence);
        updated.arousal = Some(score.arousal);
        updated.topic_hash = self.loop_detector.topic_of(text).map(|t| topic_hash(&t));
        // Evaluated after scoring: loss aversion also looks at sentiment
        updated.bias_signals = self
            .bias_detector
            .evaluate(slice::from_ref(&updated))?
            .scores();
        updated.updated_at = Utc::now();

        self.notes.update(&updated).await
    }

    async fn comprehensive(
        &self,
        progress: &mut ProgressTracker<'_>,
        deadline: Instant,
    ) -> Result<AnalysisResult> {
        let scoring = self.score_pending(progress, deadline).await?;
        if scoring.cancelled {
            return Err(Error::Cancelled {
                batches_completed: scoring.batches_completed,
            });
        }
        self.checkpoint(deadline, &scoring)?;

        let mut corpus = self.fetch_all(&NoteFilter::all(), NoteSort::CreatedAsc).await?;
        let now = Utc::now();

        // Clustering
        progress.segment(SCORING_WEIGHT, CLUSTERING_WEIGHT);
        progress.report(AnalysisPhase::Clustering, 0.0);
        let clusters = self
            .loop_detector
            .cluster(&corpus)
            .map_err(|e| Error::stage("clustering", e))?;
        self.assign_loop_groups(&mut corpus, &clusters)
            .await
            .map_err(|e| Error::stage("clustering", e))?;
        tracing::debug!(clusters = clusters.len(), "Clustering stage complete");
        progress.report(AnalysisPhase::Clustering, 1.0);
        self.checkpoint(deadline, &scoring)?;

        // Bias
        progress.segment(SCORING_WEIGHT + CLUSTERING_WEIGHT, BIAS_WEIGHT);
        progress.report(AnalysisPhase::EvaluatingBias, 0.0);
        let bias = self
            .bias_detector
            .evaluate(&corpus)
            .map_err(|e| Error::stage("bias", e))?;
        progress.report(AnalysisPhase::EvaluatingBias, 1.0);
        self.checkpoint(deadline, &scoring)?;

        // Aggregation
        progress.segment(
            SCORING_WEIGHT + CLUSTERING_WEIGHT + BIAS_WEIGHT,
            AGGREGATION_WEIGHT,
        );
        progress.report(AnalysisPhase::Aggregating, 0.0);
        let statistics = PatternAggregator::new(now).statistics(&corpus);
        progress.report(AnalysisPhase::Aggregating, 1.0);
        self.checkpoint(deadline, &scoring)?;

        // Prediction and persistence share the last segment
        progress.segment(1.0 - PREDICTION_WEIGHT, PREDICTION_WEIGHT);
        progress.report(AnalysisPhase::Predicting, 0.0);
        let predictions = self
            .prediction_engine
            .predict(&corpus, &clusters, &bias, now);
        progress.report(AnalysisPhase::Predicting, 0.5);
        self.checkpoint(deadline, &scoring)?;

        let mut result = AnalysisResult {
            clusters,
            statistics,
            insights: Vec::new(),
            bias_signals: bias.scores(),
            predictions,
            scoring,
        };

        progress.report(AnalysisPhase::Persisting, 0.5);
        let drafts = plan_insights(
            &self.config,
            &corpus,
            &result.clusters,
            &result.statistics,
            &bias,
            &result.predictions,
        );

        for draft in drafts {
            match self
                .insights
                .create(draft.kind, &draft.note_ids, draft.payload)
                .await
            {
                Ok(insight) => result.insights.push(insight),
                Err(e) => {
                    return Err(Error::Persist {
                        message: e.to_string(),
                        result: Box::new(result),
                    })
                }
            }
        }

        let saved = async {
            let mut state = self.state.load_state().await?;
            state.advance_comprehensive(Utc::now());
            self.state.save_state(&state).await
        }
        .await;
        if let Err(e) = saved {
            return Err(Error::Persist {
                message: e.to_string(),
                result: Box::new(result),
            });
        }

        progress.report(AnalysisPhase::Persisting, 1.0);
        Ok(result)
    }

    /// Stop between stages on cancellation or timeout
    fn checkpoint(&self, deadline: Instant, scoring: &ScoringReport) -> Result<()> {
        if self.should_stop(deadline) {
            return Err(Error::Cancelled {
                batches_completed: scoring.batches_completed,
            });
        }
        Ok(())
    }

    /// Record each note's cluster (the highest-ranked one containing it)
    ///
    /// Only changed notes are written, and `updated_at` is left alone so the
    /// notes are not picked up for rescoring.
    async fn assign_loop_groups(
        &self,
        corpus: &mut [Note],
        clusters: &[LoopCluster],
    ) -> Result<()> {
        let mut changed = 0usize;
        for note in corpus.iter_mut() {
            let group = clusters
                .iter()
                .find(|c| c.note_ids.contains(&note.id))
                .map(|c| c.id.clone());
            if note.loop_group_id != group {
                note.loop_group_id = group;
                self.notes.update(note).await?;
                changed += 1;
            }
        }
        tracing::debug!(changed, "Loop groups assigned");
        Ok(())
    }
}

/// Decide which insights a finished pass produces
///
/// - the top loop clusters become `Loop` insights
/// - a negative trend becomes a `Biorhythm` insight
/// - a dominant bias above the bias ratio becomes a `Bias` insight
/// - the best positive, high-energy hour becomes a `Creativity` insight
pub fn plan_insights(
    config: &AnalysisConfig,
    corpus: &[Note],
    clusters: &[LoopCluster],
    statistics: &AnalysisStatistics,
    bias: &BiasEvaluation,
    predictions: &[Prediction],
) -> Vec<InsightDraft> {
    let mut drafts = Vec::new();

    for cluster in clusters.iter().take(config.insights.max_loop_insights) {
        drafts.push(InsightDraft {
            kind: InsightKind::Loop,
            note_ids: cluster.note_ids.clone(),
            payload: json!({
                "cluster_id": cluster.id,
                "topic": cluster.topic,
                "strength": cluster.strength,
                "size": cluster.note_ids.len(),
            }),
        });
    }

    if let Some(trend) = predictions
        .iter()
        .find(|p| p.prediction_type == PredictionType::NegativeTrend)
    {
        let mut analyzed: Vec<&Note> = corpus.iter().filter(|n| n.is_scored()).collect();
        analyzed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let evidence = analyzed
            .iter()
            .take(config.predictions.trend_window * 2)
            .map(|n| n.id)
            .collect();

        let lowest = |buckets: &[Bucket]| {
            buckets
                .iter()
                .filter(|b| b.scored_count > 0)
                .min_by(|a, b| a.average_valence.total_cmp(&b.average_valence))
                .map(|b| b.key)
        };

        drafts.push(InsightDraft {
            kind: InsightKind::Biorhythm,
            note_ids: evidence,
            payload: json!({
                "message": trend.message,
                "confidence": trend.confidence,
                "lowest_hour": lowest(&statistics.hourly),
                "lowest_weekday": lowest(&statistics.weekly),
            }),
        });
    }

    if let Some((signal, ratio)) = bias.dominant() {
        if ratio > config.predictions.bias_ratio {
            drafts.push(InsightDraft {
                kind: InsightKind::Bias,
                note_ids: bias.matching(signal).to_vec(),
                payload: json!({
                    "signal": signal.as_str(),
                    "label": signal.label(),
                    "score": ratio,
                }),
            });
        }
    }

    let c = &config.insights;
    let peak = statistics
        .hourly
        .iter()
        .filter(|b| {
            b.scored_count >= c.creativity_min_notes
                && b.average_valence >= c.creativity_min_valence
                && b.average_arousal >= c.creativity_min_arousal
        })
        .fold(None, |best: Option<&Bucket>, b| match best {
            Some(current)
                if current.average_valence + current.average_arousal
                    >= b.average_valence + b.average_arousal =>
            {
                Some(current)
            }
            _ => Some(b),
        });
    if let Some(bucket) = peak {
        let note_ids = corpus
            .iter()
            .filter(|n| n.is_scored() && n.created_at.hour() == bucket.key)
            .map(|n| n.id)
            .collect();
        drafts.push(InsightDraft {
            kind: InsightKind::Creativity,
            note_ids,
            payload: json!({
                "hour": bucket.key,
                "average_valence": bucket.average_valence,
                "average_arousal": bucket.average_arousal,
                "notes": bucket.scored_count,
            }),
        });
    }

    drafts
}
