//! Run control: cancellation, resource pressure and progress reporting

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use super::types::{AnalysisPhase, AnalysisProgress};

/// Cooperative cancellation flag shared with callers
///
/// Checked between scoring batches and between stages. In-flight analyses
/// always finish.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag (done at the start of each run)
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Host resource pressure level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourcePressure {
    #[default]
    Nominal,
    Elevated,
    Critical,
}

impl ResourcePressure {
    /// Concurrency allowed at this level, given the configured maximum
    pub fn effective_concurrency(&self, max: usize) -> usize {
        match self {
            Self::Nominal => max.max(1),
            Self::Elevated => (max / 2).max(1),
            Self::Critical => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
        }
    }
}

/// Reports current resource pressure; sampled once per scoring batch
pub trait PressureSource: Send + Sync {
    fn pressure(&self) -> ResourcePressure;
}

/// Pressure level set by the host (e.g. from memory warnings)
#[derive(Debug, Default)]
pub struct ManualPressure(AtomicU8);

impl ManualPressure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, level: ResourcePressure) {
        let raw = match level {
            ResourcePressure::Nominal => 0,
            ResourcePressure::Elevated => 1,
            ResourcePressure::Critical => 2,
        };
        self.0.store(raw, Ordering::SeqCst);
    }
}

impl PressureSource for ManualPressure {
    fn pressure(&self) -> ResourcePressure {
        match self.0.load(Ordering::SeqCst) {
            0 => ResourcePressure::Nominal,
            1 => ResourcePressure::Elevated,
            _ => ResourcePressure::Critical,
        }
    }
}

/// Publishes progress for one run, never letting the fraction go backwards
pub(crate) struct ProgressTracker<'a> {
    tx: &'a watch::Sender<AnalysisProgress>,
    base: f64,
    scale: f64,
}

impl<'a> ProgressTracker<'a> {
    /// Track a run whose phases cover the whole [0, 1] range
    pub(crate) fn start(tx: &'a watch::Sender<AnalysisProgress>) -> Self {
        tx.send_replace(AnalysisProgress {
            fraction: 0.0,
            is_analyzing: true,
            phase: AnalysisPhase::Fetching,
        });
        Self {
            tx,
            base: 0.0,
            scale: 1.0,
        }
    }

    /// Report `fraction` of the current segment as done
    pub(crate) fn report(&self, phase: AnalysisPhase, fraction: f64) {
        let value = (self.base + self.scale * fraction.clamp(0.0, 1.0)).min(1.0);
        self.tx.send_modify(|p| {
            p.fraction = p.fraction.max(value);
            p.phase = phase;
        });
    }

    /// Mark the segment `[base, base + weight)` as the current one
    pub(crate) fn segment(&mut self, base: f64, weight: f64) {
        self.base = base;
        self.scale = weight;
    }

    /// Final value: full on success, last reported value otherwise
    pub(crate) fn finish(self, completed: bool) {
        self.tx.send_modify(|p| {
            if completed {
                p.fraction = 1.0;
            }
            p.is_analyzing = false;
            p.phase = AnalysisPhase::Idle;
        });
    }
}
