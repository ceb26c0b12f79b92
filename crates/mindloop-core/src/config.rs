//! Analysis configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Explicit path, or the override in the data dir
//!    (~/.local/share/mindloop/config/analysis.toml)
//! 2. Embedded defaults (compiled into binary)
//!
//! Every threshold used by the detectors and the prediction engine lives here
//! so it can be tuned without a rebuild.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Upper bound for any day-based window (about a century)
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/analysis.toml");

/// Orchestrator execution settings
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    /// Notes per scoring batch
    pub batch_size: usize,
    /// Upper bound on in-flight emotion analyses within a batch
    pub max_concurrent_operations: usize,
    /// Budget for a single invocation; exceeding it cancels the run
    pub timeout_interval: Duration,
    /// Page size used when reading notes from the store
    pub fetch_page_size: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrent_operations: 3,
            timeout_interval: Duration::from_secs(30),
            fetch_page_size: 200,
        }
    }
}

/// Keyword clustering parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LoopDetectorConfig {
    /// Tokens shorter than this are ignored
    pub min_keyword_len: usize,
    /// Number of candidate topics kept
    pub top_k: usize,
    /// Clusters with fewer member notes are discarded
    pub min_cluster_size: usize,
    /// Only consider notes created within this many days of the newest note
    pub lookback_days: Option<u32>,
}

impl Default for LoopDetectorConfig {
    fn default() -> Self {
        Self {
            min_keyword_len: 4,
            top_k: 5,
            min_cluster_size: 2,
            lookback_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiasDetectorConfig {
    /// Notes scoring below this valence count toward loss aversion
    pub negative_valence_threshold: f64,
}

impl Default for BiasDetectorConfig {
    fn default() -> Self {
        Self {
            negative_valence_threshold: -0.3,
        }
    }
}

/// Heuristic thresholds for the prediction engine
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionThresholds {
    /// Notes per trend window (recent and prior)
    pub trend_window: usize,
    /// Minimum total notes before a trend is attempted
    pub trend_min_notes: usize,
    pub valence_delta: f64,
    pub arousal_delta: f64,
    pub recurrence_window_days: i64,
    pub recurrence_ratio: f64,
    pub recurrence_min_count: usize,
    pub recurrence_confidence_cap: f64,
    pub bias_ratio: f64,
    pub bias_confidence_cap: f64,
}

impl Default for PredictionThresholds {
    fn default() -> Self {
        Self {
            trend_window: 3,
            trend_min_notes: 5,
            valence_delta: 0.2,
            arousal_delta: 0.2,
            recurrence_window_days: 7,
            recurrence_ratio: 1.5,
            recurrence_min_count: 3,
            recurrence_confidence_cap: 0.8,
            bias_ratio: 0.3,
            bias_confidence_cap: 0.8,
        }
    }
}

/// Which derived findings are persisted as insights
#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    pub max_loop_insights: usize,
    pub creativity_min_notes: usize,
    pub creativity_min_valence: f64,
    pub creativity_min_arousal: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            max_loop_insights: 3,
            creativity_min_notes: 3,
            creativity_min_valence: 0.3,
            creativity_min_arousal: 0.5,
        }
    }
}

/// Complete analysis configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    pub settings: AnalysisSettings,
    pub loops: LoopDetectorConfig,
    pub bias: BiasDetectorConfig,
    pub predictions: PredictionThresholds,
    pub insights: InsightConfig,
}

impl AnalysisConfig {
    /// Load configuration (explicit path or data-dir override, then embedded defaults)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let override_path = path.map(Path::to_path_buf).or_else(default_config_path);

        let content = match override_path {
            Some(p) if p.exists() => {
                tracing::debug!(path = %p.display(), "Loading analysis config");
                fs::read_to_string(&p)
                    .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?
            }
            Some(p) if path.is_some() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            _ => DEFAULT_CONFIG.to_string(),
        };

        parse_config(&content)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    /// Check every setting is usable; fields are public, so programmatic
    /// configs are checked again when the orchestrator is built
    pub fn validate(&self) -> Result<()> {
        validate(self)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("mindloop").join("config").join("analysis.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    settings: Option<RawSettings>,
    loops: Option<RawLoops>,
    bias: Option<RawBias>,
    predictions: Option<RawPredictions>,
    insights: Option<RawInsights>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    batch_size: Option<usize>,
    max_concurrent_operations: Option<usize>,
    timeout_secs: Option<u64>,
    fetch_page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawLoops {
    min_keyword_len: Option<usize>,
    top_k: Option<usize>,
    min_cluster_size: Option<usize>,
    lookback_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawBias {
    negative_valence_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPredictions {
    trend_window: Option<usize>,
    trend_min_notes: Option<usize>,
    valence_delta: Option<f64>,
    arousal_delta: Option<f64>,
    recurrence_window_days: Option<i64>,
    recurrence_ratio: Option<f64>,
    recurrence_min_count: Option<usize>,
    recurrence_confidence_cap: Option<f64>,
    bias_ratio: Option<f64>,
    bias_confidence_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawInsights {
    max_loop_insights: Option<usize>,
    creativity_min_notes: Option<usize>,
    creativity_min_valence: Option<f64>,
    creativity_min_arousal: Option<f64>,
}

/// Overwrite `$target` with `$value` when present
macro_rules! apply {
    ($target:expr, $value:expr) => {
        if let Some(v) = $value {
            $target = v;
        }
    };
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<AnalysisConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AnalysisConfig::default();

    if let Some(s) = raw.settings {
        apply!(config.settings.batch_size, s.batch_size);
        apply!(
            config.settings.max_concurrent_operations,
            s.max_concurrent_operations
        );
        apply!(
            config.settings.timeout_interval,
            s.timeout_secs.map(Duration::from_secs)
        );
        apply!(config.settings.fetch_page_size, s.fetch_page_size);
    }

    if let Some(l) = raw.loops {
        apply!(config.loops.min_keyword_len, l.min_keyword_len);
        apply!(config.loops.top_k, l.top_k);
        apply!(config.loops.min_cluster_size, l.min_cluster_size);
        if l.lookback_days.is_some() {
            config.loops.lookback_days = l.lookback_days;
        }
    }

    if let Some(b) = raw.bias {
        apply!(
            config.bias.negative_valence_threshold,
            b.negative_valence_threshold
        );
    }

    if let Some(p) = raw.predictions {
        let t = &mut config.predictions;
        apply!(t.trend_window, p.trend_window);
        apply!(t.trend_min_notes, p.trend_min_notes);
        apply!(t.valence_delta, p.valence_delta);
        apply!(t.arousal_delta, p.arousal_delta);
        apply!(t.recurrence_window_days, p.recurrence_window_days);
        apply!(t.recurrence_ratio, p.recurrence_ratio);
        apply!(t.recurrence_min_count, p.recurrence_min_count);
        apply!(t.recurrence_confidence_cap, p.recurrence_confidence_cap);
        apply!(t.bias_ratio, p.bias_ratio);
        apply!(t.bias_confidence_cap, p.bias_confidence_cap);
    }

    if let Some(i) = raw.insights {
        apply!(config.insights.max_loop_insights, i.max_loop_insights);
        apply!(config.insights.creativity_min_notes, i.creativity_min_notes);
        apply!(
            config.insights.creativity_min_valence,
            i.creativity_min_valence
        );
        apply!(
            config.insights.creativity_min_arousal,
            i.creativity_min_arousal
        );
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AnalysisConfig) -> Result<()> {
    let s = &config.settings;
    if s.batch_size == 0 {
        return Err(Error::Config("batch_size must be at least 1".to_string()));
    }
    if s.max_concurrent_operations == 0 {
        return Err(Error::Config(
            "max_concurrent_operations must be at least 1".to_string(),
        ));
    }
    if s.fetch_page_size == 0 {
        return Err(Error::Config("fetch_page_size must be at least 1".to_string()));
    }
    if s.timeout_interval.is_zero() {
        return Err(Error::Config("timeout_secs must be positive".to_string()));
    }

    let l = &config.loops;
    if l.top_k == 0 || l.min_cluster_size == 0 {
        return Err(Error::Config(
            "loops.top_k and loops.min_cluster_size must be at least 1".to_string(),
        ));
    }
    if let Some(days) = l.lookback_days {
        if days == 0 || i64::from(days) > MAX_WINDOW_DAYS {
            return Err(Error::Config(format!(
                "loops.lookback_days must be within 1..={}",
                MAX_WINDOW_DAYS
            )));
        }
    }

    if !(-1.0..=1.0).contains(&config.bias.negative_valence_threshold) {
        return Err(Error::Config(
            "bias.negative_valence_threshold must be within [-1, 1]".to_string(),
        ));
    }

    let p = &config.predictions;
    if p.trend_window == 0 {
        return Err(Error::Config(
            "predictions.trend_window must be at least 1".to_string(),
        ));
    }
    if !(1..=MAX_WINDOW_DAYS).contains(&p.recurrence_window_days) {
        return Err(Error::Config(format!(
            "predictions.recurrence_window_days must be within 1..={}",
            MAX_WINDOW_DAYS
        )));
    }
    for (name, cap) in [
        ("recurrence_confidence_cap", p.recurrence_confidence_cap),
        ("bias_confidence_cap", p.bias_confidence_cap),
        ("bias_ratio", p.bias_ratio),
    ] {
        if !(0.0..=1.0).contains(&cap) {
            return Err(Error::Config(format!(
                "predictions.{} must be within [0, 1]",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = AnalysisConfig::embedded().unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = parse_config(
            r#"
            [settings]
            batch_size = 25

            [loops]
            lookback_days = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.settings.batch_size, 25);
        assert_eq!(config.settings.max_concurrent_operations, 3);
        assert_eq!(config.loops.lookback_days, Some(30));
        assert_eq!(config.predictions.recurrence_ratio, 1.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            parse_config("[settings]\nbatch_size = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[predictions]\nbias_ratio = 1.5"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[unknown]\nkey = 1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_window_days_are_bounded() {
        assert!(matches!(
            parse_config("[loops]\nlookback_days = 100000000"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[loops]\nlookback_days = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[predictions]\nrecurrence_window_days = 100000000"),
            Err(Error::Config(_))
        ));
        assert!(parse_config("[loops]\nlookback_days = 36500").is_ok());
    }

    #[test]
    fn test_validate_programmatic_config() {
        let mut config = AnalysisConfig::default();
        assert!(config.validate().is_ok());

        config.settings.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        fs::write(&path, "[settings]\ntimeout_secs = 5\n").unwrap();

        let config = AnalysisConfig::load(Some(&path)).unwrap();
        assert_eq!(config.settings.timeout_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = AnalysisConfig::load(Some(Path::new("/nonexistent/mindloop.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
