//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mindloop_core::{InsightKind, Modality};

/// Mindloop - Notice the loops in your own thinking
#[derive(Parser)]
#[command(name = "mindloop")]
#[command(about = "Incremental metacognitive analysis for a personal journal", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Analysis config file
    ///
    /// Defaults to ~/.local/share/mindloop/config/analysis.toml when present,
    /// otherwise the built-in thresholds.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Write a journal note
    Add {
        /// Note text (omit for a textless audio/image note)
        #[arg(short, long)]
        text: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Note modality: text, audio, image
        #[arg(short, long, default_value = "text")]
        modality: Modality,
    },

    /// List recent notes with their scores
    Notes {
        /// Maximum number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Score notes that are new or changed since the last run
    Score,

    /// Run scoring, loop detection, bias evaluation, statistics and predictions
    Analyze {
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show predictions for the current corpus without persisting anything
    Predict,

    /// List stored insights
    Insights {
        /// Only this kind: loop, biorhythm, bias, creativity
        #[arg(short, long)]
        kind: Option<InsightKind>,

        /// Maximum number of insights to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show database and watermark status
    Status,
}
