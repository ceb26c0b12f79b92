//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::Path;

use clap::Parser;
use mindloop_core::{Database, InsightKind, Modality, NewNote};
use serde_json::json;

use crate::cli::{Cli, Commands};
use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_add_with_tags() {
    let cli = Cli::try_parse_from([
        "mindloop", "add", "--text", "hello", "--tag", "work", "--tag", "sleep",
    ])
    .unwrap();

    match cli.command {
        Commands::Add {
            text,
            tags,
            modality,
        } => {
            assert_eq!(text.as_deref(), Some("hello"));
            assert_eq!(tags, vec!["work", "sleep"]);
            assert_eq!(modality, Modality::Text);
        }
        _ => panic!("expected add"),
    }
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "mindloop", "analyze", "--json", "--db", "/tmp/j.db", "-v",
    ])
    .unwrap();

    assert!(cli.verbose);
    assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/j.db")));
    assert!(matches!(cli.command, Commands::Analyze { json: true }));
}

#[test]
fn test_parse_insight_kind() {
    let cli = Cli::try_parse_from(["mindloop", "insights", "--kind", "bias"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Insights {
            kind: Some(InsightKind::Bias),
            limit: 20
        }
    ));

    assert!(Cli::try_parse_from(["mindloop", "insights", "--kind", "mood"]).is_err());
    assert!(Cli::try_parse_from(["mindloop", "add", "--modality", "video"]).is_err());
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long sentence here", 10), "a long ...");
    // Multi-byte characters are never split
    assert_eq!(truncate("héllo wörld ünïcode", 8), "héllo...");
}

#[test]
fn test_resolve_db_path_prefers_explicit() {
    let explicit = Path::new("/tmp/explicit.db");
    assert_eq!(commands::resolve_db_path(Some(explicit)), explicit);
    assert!(commands::resolve_db_path(None).ends_with("mindloop.db"));
}

// ========== Note Command Tests ==========

#[test]
fn test_cmd_add() {
    let db = setup_test_db();
    let tags = vec!["morning".to_string()];
    commands::cmd_add(&db, Some("  Slept well  "), &tags, Modality::Text).unwrap();

    let notes = db.recent_notes(10).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content_text.as_deref(), Some("Slept well"));
    assert!(notes[0].tags.contains("morning"));
}

#[test]
fn test_cmd_add_requires_text_for_text_notes() {
    let db = setup_test_db();
    assert!(commands::cmd_add(&db, None, &[], Modality::Text).is_err());
    assert!(commands::cmd_add(&db, Some("   "), &[], Modality::Text).is_err());

    // Textless voice memo is fine
    commands::cmd_add(&db, None, &[], Modality::Audio).unwrap();
    assert_eq!(db.note_count().unwrap(), (1, 0));
}

#[test]
fn test_cmd_notes() {
    let db = setup_test_db();
    assert!(commands::cmd_notes(&db, 10).is_ok());

    db.insert_note(&NewNote::text("A note")).unwrap();
    assert!(commands::cmd_notes(&db, 10).is_ok());
}

#[test]
fn test_format_scores() {
    let db = setup_test_db();
    let mut note = db.insert_note(&NewNote::text("x")).unwrap();
    assert_eq!(commands::format_scores(&note), "unscored");

    note.sentiment = Some(-0.25);
    note.arousal = Some(0.5);
    assert_eq!(commands::format_scores(&note), "v -0.25  a 0.50");
}

#[test]
fn test_cmd_insights() {
    let db = setup_test_db();
    assert!(commands::cmd_insights(&db, None, 10).is_ok());

    let note = db.insert_note(&NewNote::text("work")).unwrap();
    db.insert_insight(InsightKind::Loop, &[note.id], &json!({"topic": "work"}))
        .unwrap();
    assert!(commands::cmd_insights(&db, Some(InsightKind::Loop), 10).is_ok());
}

// ========== Pipeline Command Tests ==========

#[tokio::test]
async fn test_cmd_score_and_analyze() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("journal.db");

    {
        let db = commands::open_db(&db_path).unwrap();
        db.insert_note(&NewNote::text("Grateful for a calm walk")).unwrap();
        db.insert_note(&NewNote::text("Work deadline stress again"))
            .unwrap();
        db.insert_note(&NewNote::text("Work meeting ran late")).unwrap();
    }

    let orchestrator = commands::open_orchestrator(&db_path, None).unwrap();
    commands::cmd_score(&orchestrator).await.unwrap();
    commands::cmd_analyze(&orchestrator, false).await.unwrap();
    commands::cmd_analyze(&orchestrator, true).await.unwrap();
    commands::cmd_predict(&orchestrator).await.unwrap();

    let db = commands::open_db(&db_path).unwrap();
    assert_eq!(db.note_count().unwrap(), (3, 3));
    assert!(db
        .get_analysis_state()
        .unwrap()
        .last_comprehensive_analysis_date
        .is_some());
    assert!(!db.list_insights(Some(InsightKind::Loop), 10).unwrap().is_empty());
}

#[test]
fn test_open_orchestrator_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let result = commands::open_orchestrator(
        &dir.path().join("j.db"),
        Some(Path::new("/nonexistent/analysis.toml")),
    );
    assert!(result.is_err());
}

// ========== Status Tests ==========

#[test]
fn test_cmd_init_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("journal.db");

    // Uninitialized database is reported, not an error
    commands::cmd_status(&db_path).unwrap();

    commands::cmd_init(&db_path).unwrap();
    assert!(db_path.exists());
    commands::cmd_status(&db_path).unwrap();
}
