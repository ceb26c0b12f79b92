//! Mindloop CLI - metacognitive journal analysis
//!
//! Usage:
//!   mindloop init                     Initialize database
//!   mindloop add --text "..."         Write a note
//!   mindloop score                    Score new and changed notes
//!   mindloop analyze                  Run the full analysis pipeline
//!   mindloop predict                  Show predictions without persisting

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let db_path = commands::resolve_db_path(cli.db.as_deref());

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path),
        Commands::Add {
            text,
            tags,
            modality,
        } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_add(&db, text.as_deref(), &tags, modality)
        }
        Commands::Notes { limit } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_notes(&db, limit)
        }
        Commands::Score => {
            let orchestrator = commands::open_orchestrator(&db_path, cli.config.as_deref())?;
            commands::cmd_score(&orchestrator).await
        }
        Commands::Analyze { json } => {
            let orchestrator = commands::open_orchestrator(&db_path, cli.config.as_deref())?;
            commands::cmd_analyze(&orchestrator, json).await
        }
        Commands::Predict => {
            let orchestrator = commands::open_orchestrator(&db_path, cli.config.as_deref())?;
            commands::cmd_predict(&orchestrator).await
        }
        Commands::Insights { kind, limit } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_insights(&db, kind, limit)
        }
        Commands::Status => commands::cmd_status(&db_path),
    }
}
