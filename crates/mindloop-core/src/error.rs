//! Error types for Mindloop

use thiserror::Error;

use crate::analysis::AnalysisResult;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Emotion analyzer backend failure for a single note
    #[error("Analyzer error: {0}")]
    Analyzer(String),

    /// Note store could not be read
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A comprehensive-pass stage (clustering, bias, aggregation, prediction) failed
    #[error("{stage} stage failed: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },

    /// Insights could not be written; the computed result is carried along
    #[error("Insight persistence failed: {message}")]
    Persist {
        message: String,
        result: Box<AnalysisResult>,
    },

    /// The run was cancelled or exceeded its timeout before finishing
    #[error("Analysis cancelled after {batches_completed} completed batch(es)")]
    Cancelled { batches_completed: usize },

    #[error("An analysis run is already in progress")]
    AlreadyRunning,
}

impl Error {
    pub(crate) fn stage(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Stage {
            stage,
            message: err.to_string(),
        }
    }

    /// Whether the error belongs to a single note and should not abort a run
    pub fn is_per_note(&self) -> bool {
        matches!(
            self,
            Error::Analyzer(_) | Error::InvalidData(_) | Error::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
