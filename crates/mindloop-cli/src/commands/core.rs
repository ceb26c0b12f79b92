//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `resolve_db_path` - Pick the database location
//! - `open_db` - Shared utility to open the database
//! - `open_orchestrator` - Database plus analysis config, wired into the pipeline
//! - `cmd_init` - Initialize the database

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use mindloop_core::{AnalysisConfig, AnalysisOrchestrator, Database};

const DB_FILE: &str = "mindloop.db";

/// Explicit --db path, else the platform data directory, else the working directory
pub fn resolve_db_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    dirs::data_local_dir()
        .map(|d| d.join("mindloop").join(DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DB_FILE))
}

pub fn open_db(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn open_orchestrator(db_path: &Path, config: Option<&Path>) -> Result<AnalysisOrchestrator> {
    let config = AnalysisConfig::load(config).context("Failed to load analysis config")?;
    tracing::debug!(
        db = %db_path.display(),
        batch_size = config.settings.batch_size,
        max_concurrent = config.settings.max_concurrent_operations,
        "Opening analysis pipeline"
    );
    let db = Arc::new(open_db(db_path)?);
    AnalysisOrchestrator::for_store(db, config).context("Invalid analysis config")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    let (total, scored) = db.note_count()?;
    if total > 0 {
        println!("   Existing notes: {} ({} scored)", total, scored);
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Write a note: mindloop add --text \"...\"");
    println!("  2. Analyze: mindloop analyze");

    Ok(())
}
