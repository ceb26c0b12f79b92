//! Forward-looking predictions
//!
//! Three independent heuristics, each optional:
//! - trend: average emotion of the latest analyzed notes against the window before
//! - recurring pattern: the top loop topic showing up more often lately
//! - bias tendency: a dominant bias signal above the configured ratio
//!
//! Missing data yields fewer predictions, never an error.

use chrono::{DateTime, Duration, Utc};

use crate::config::PredictionThresholds;
use crate::models::Note;

use super::loops::contains_keyword;
use super::types::{BiasEvaluation, Impact, LoopCluster, Prediction, PredictionType};

/// Confidence ceiling for trend predictions
const TREND_CONFIDENCE_CAP: f64 = 0.9;
/// Deltas above this are high impact
const HIGH_IMPACT_DELTA: f64 = 0.4;

/// Produces predictions from the analyzed corpus and derived findings
pub trait PredictionEngine: Send + Sync {
    fn predict(
        &self,
        notes: &[Note],
        clusters: &[LoopCluster],
        bias: &BiasEvaluation,
        now: DateTime<Utc>,
    ) -> Vec<Prediction>;
}

/// Moving-window delta heuristics
#[derive(Debug, Clone, Default)]
pub struct TrendPredictionEngine {
    thresholds: PredictionThresholds,
}

impl TrendPredictionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: PredictionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn trend(&self, notes: &[Note]) -> Option<Prediction> {
        let t = &self.thresholds;
        if notes.len() < t.trend_min_notes {
            return None;
        }

        let mut analyzed: Vec<(&Note, (f64, f64))> = notes
            .iter()
            .filter_map(|n| n.emotion().map(|e| (n, e)))
            .collect();
        analyzed.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let recent = &analyzed[..t.trend_window.min(analyzed.len())];
        let prior = analyzed
            .get(t.trend_window..(2 * t.trend_window).min(analyzed.len()))
            .unwrap_or(&[]);
        if recent.len() < t.trend_window || prior.len() < t.trend_window {
            return None;
        }

        let (rv, ra) = mean(recent);
        let (pv, pa) = mean(prior);
        let dv = rv - pv;
        let da = ra - pa;

        let trending = |prediction_type, message: &str, delta: f64| {
            let impact = if delta.abs() > HIGH_IMPACT_DELTA {
                Impact::High
            } else {
                Impact::Medium
            };
            Prediction::new(
                prediction_type,
                message,
                (0.5 + delta.abs()).min(TREND_CONFIDENCE_CAP),
                impact,
                "next few days",
            )
        };

        let prediction = if dv > t.valence_delta {
            trending(
                PredictionType::PositiveTrend,
                "Your mood has been lifting across recent entries.",
                dv,
            )
        } else if dv < -t.valence_delta {
            trending(
                PredictionType::NegativeTrend,
                "Recent entries are trending more negative than before.",
                dv,
            )
        } else if da > t.arousal_delta {
            trending(
                PredictionType::HighArousal,
                "Your energy and intensity have been rising lately.",
                da,
            )
        } else {
            Prediction::new(
                PredictionType::Stable,
                "Your emotional state has been steady.",
                0.5,
                Impact::Low,
                "next few days",
            )
        };

        tracing::debug!(
            delta_valence = dv,
            delta_arousal = da,
            prediction = %prediction.prediction_type,
            "Trend computed"
        );
        Some(prediction)
    }

    pub fn recurring_pattern(
        &self,
        notes: &[Note],
        clusters: &[LoopCluster],
        now: DateTime<Utc>,
    ) -> Option<Prediction> {
        let t = &self.thresholds;
        let top = clusters.first()?;
        let cutoff = Duration::try_days(t.recurrence_window_days)
            .and_then(|window| now.checked_sub_signed(window));

        let (mut recent, mut prior) = (0usize, 0usize);
        for note in notes {
            if !note.text().is_some_and(|text| contains_keyword(text, &top.topic)) {
                continue;
            }
            if cutoff.map_or(true, |c| note.created_at >= c) {
                recent += 1;
            } else {
                prior += 1;
            }
        }

        let ratio = recent as f64 / prior.max(1) as f64;
        if ratio <= t.recurrence_ratio || recent < t.recurrence_min_count {
            return None;
        }

        Some(Prediction::new(
            PredictionType::RecurringPattern,
            format!(
                "\"{}\" keeps coming up: {} mentions in the last {} days.",
                top.topic, recent, t.recurrence_window_days
            ),
            (0.5 + ratio * 0.1).min(t.recurrence_confidence_cap),
            Impact::Medium,
            format!("next {} days", t.recurrence_window_days),
        ))
    }

    pub fn bias_tendency(&self, bias: &BiasEvaluation) -> Option<Prediction> {
        let t = &self.thresholds;
        let (signal, ratio) = bias.dominant()?;
        if ratio <= t.bias_ratio {
            return None;
        }

        Some(Prediction::new(
            PredictionType::BiasDetection,
            format!(
                "Signs of {} appear in {:.0}% of your entries.",
                signal.label(),
                ratio * 100.0
            ),
            ratio.min(t.bias_confidence_cap),
            if ratio > 0.5 { Impact::High } else { Impact::Medium },
            "ongoing",
        ))
    }
}

fn mean(window: &[(&Note, (f64, f64))]) -> (f64, f64) {
    let n = window.len() as f64;
    let (v, a) = window
        .iter()
        .fold((0.0, 0.0), |(v, a), (_, (nv, na))| (v + nv, a + na));
    (v / n, a / n)
}

impl PredictionEngine for TrendPredictionEngine {
    fn predict(
        &self,
        notes: &[Note],
        clusters: &[LoopCluster],
        bias: &BiasEvaluation,
        now: DateTime<Utc>,
    ) -> Vec<Prediction> {
        [
            self.trend(notes),
            self.recurring_pattern(notes, clusters, now),
            self.bias_tendency(bias),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
