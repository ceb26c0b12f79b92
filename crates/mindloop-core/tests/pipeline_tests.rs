//! Integration tests for mindloop-core
//!
//! These tests run the full scoring -> clustering -> prediction -> insight
//! workflow against the SQLite store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mindloop_core::{
    AnalysisConfig, AnalysisOrchestrator, Database, InsightKind, NewNote, PredictionType,
};

fn orchestrator(db: &Arc<Database>) -> AnalysisOrchestrator {
    AnalysisOrchestrator::for_store(db.clone(), AnalysisConfig::default()).unwrap()
}

// =============================================================================
// Scoring
// =============================================================================

#[tokio::test]
async fn test_scoring_persists_analysis_fields() {
    let db = Arc::new(Database::in_memory().expect("Failed to create database"));
    db.insert_note(&NewNote::text("So happy and grateful for this calm morning"))
        .unwrap();
    db.insert_note(&NewNote::text("Furious and anxious, nobody ever listens"))
        .unwrap();

    let report = orchestrator(&db).run_incremental_scoring().await.unwrap();
    assert_eq!(report.scored, 2);
    assert_eq!(db.note_count().unwrap(), (2, 2));

    let notes = db.recent_notes(10).unwrap();
    let upset = notes
        .iter()
        .find(|n| n.text().unwrap().starts_with("Furious"))
        .unwrap();
    assert!(upset.sentiment.unwrap() < 0.0);
    assert!(upset.arousal.unwrap() > 0.5);
    assert!(upset.topic_hash.is_some());
    assert_eq!(
        upset.bias_signals[&mindloop_core::BiasSignal::Confirmation],
        1.0
    );

    let state = db.get_analysis_state().unwrap();
    assert!(state.last_emotion_analysis_date.is_some());
    assert!(state.last_comprehensive_analysis_date.is_none());
}

#[tokio::test]
async fn test_incremental_runs_only_touch_new_notes() {
    let db = Arc::new(Database::in_memory().unwrap());
    let orch = orchestrator(&db);

    for i in 0..25 {
        db.insert_note(&NewNote::text(format!("Entry number {} felt good", i)))
            .unwrap();
    }
    let first = orch.run_incremental_scoring().await.unwrap();
    assert_eq!(first.scored, 25);
    assert_eq!(first.batches_completed, 3);

    let watermark = db.get_analysis_state().unwrap().last_emotion_analysis_date;

    let idle = orch.run_incremental_scoring().await.unwrap();
    assert_eq!(idle.total, 0);

    db.insert_note(&NewNote::text("One more")).unwrap();
    let next = orch.run_incremental_scoring().await.unwrap();
    assert_eq!(next.scored, 1);

    let advanced = db.get_analysis_state().unwrap().last_emotion_analysis_date;
    assert!(advanced > watermark);
}

// =============================================================================
// Comprehensive analysis
// =============================================================================

#[tokio::test]
async fn test_work_loop_scenario() {
    let db = Arc::new(Database::in_memory().unwrap());
    let now = Utc::now();

    db.insert_note(&NewNote::text("Another day at work").at(now - Duration::days(10)))
        .unwrap();
    for i in 0..5 {
        db.insert_note(&NewNote::text("Another day at work").at(now - Duration::hours(i * 20)))
            .unwrap();
    }
    for (i, word) in ["garden", "piano", "cooking", "running", "reading", "painting"]
        .iter()
        .enumerate()
    {
        db.insert_note(&NewNote::text(*word).at(now - Duration::hours(3 + i as i64 * 17)))
            .unwrap();
    }

    let result = orchestrator(&db).run_comprehensive_analysis().await.unwrap();

    assert_eq!(result.statistics.total_notes, 12);
    assert_eq!(result.clusters.len(), 1);
    assert_eq!(result.clusters[0].topic, "work");
    assert!((result.clusters[0].strength - 0.5).abs() < 1e-9);

    let recurring = result
        .predictions
        .iter()
        .find(|p| p.prediction_type == PredictionType::RecurringPattern)
        .expect("recurring pattern prediction");
    assert!((recurring.confidence - 0.8).abs() < 1e-9);

    let loops = db.list_insights(Some(InsightKind::Loop), 10).unwrap();
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].note_ids.len(), 6);

    // Cluster membership is written back to the notes
    let grouped = db
        .recent_notes(20)
        .unwrap()
        .into_iter()
        .filter(|n| n.loop_group_id.as_deref() == Some(result.clusters[0].id.as_str()))
        .count();
    assert_eq!(grouped, 6);
}

#[tokio::test]
async fn test_empty_database() {
    let db = Arc::new(Database::in_memory().unwrap());
    let result = orchestrator(&db).run_comprehensive_analysis().await.unwrap();

    assert!(result.clusters.is_empty());
    assert!(result.insights.is_empty());
    assert!(result.predictions.is_empty());
    assert_eq!(result.statistics.total_notes, 0);
    assert!(result.bias_signals.values().all(|s| *s == 0.0));
    assert!(db
        .get_analysis_state()
        .unwrap()
        .last_comprehensive_analysis_date
        .is_some());
}

#[tokio::test]
async fn test_negative_trend_produces_biorhythm_insight() {
    let db = Arc::new(Database::in_memory().unwrap());
    let now = Utc::now();
    let texts = [
        "Wonderful, happy, grateful day",
        "Joyful and proud of the team",
        "Great calm evening, loved it",
        "Sad and exhausted",
        "Terrible, awful meeting, so upset",
        "Lonely and depressed tonight",
    ];
    for (i, text) in texts.iter().enumerate() {
        db.insert_note(&NewNote::text(*text).at(now - Duration::hours(12 - i as i64)))
            .unwrap();
    }

    let result = orchestrator(&db).run_comprehensive_analysis().await.unwrap();

    assert!(result
        .predictions
        .iter()
        .any(|p| p.prediction_type == PredictionType::NegativeTrend));
    let biorhythm = db.list_insights(Some(InsightKind::Biorhythm), 10).unwrap();
    assert_eq!(biorhythm.len(), 1);
    assert_eq!(biorhythm[0].note_ids.len(), 6);
}

#[tokio::test]
async fn test_predict_after_analysis() {
    let db = Arc::new(Database::in_memory().unwrap());
    for text in [
        "Already spent so much on this project",
        "We've come this far, can't quit",
        "Already invested two years",
    ] {
        db.insert_note(&NewNote::text(text)).unwrap();
    }
    let orch = orchestrator(&db);
    orch.run_comprehensive_analysis().await.unwrap();

    let predictions = orch.predict().await.unwrap();
    let bias = predictions
        .iter()
        .find(|p| p.prediction_type == PredictionType::BiasDetection)
        .expect("bias prediction");
    assert!((bias.confidence - 0.8).abs() < 1e-9);
    assert!(bias.message.contains("sunk-cost"));

    let insights = db.list_insights(Some(InsightKind::Bias), 10).unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].payload["signal"], "sunk_cost");
}

#[tokio::test]
async fn test_reopened_database_keeps_watermarks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.db");
    let path = path.to_str().unwrap();

    {
        let db = Arc::new(Database::new(path).unwrap());
        db.insert_note(&NewNote::text("persisted entry")).unwrap();
        orchestrator(&db).run_comprehensive_analysis().await.unwrap();
    }

    let db = Arc::new(Database::new(path).unwrap());
    let state = db.get_analysis_state().unwrap();
    assert!(state.last_emotion_analysis_date.is_some());
    assert!(state.last_comprehensive_analysis_date.is_some());

    let report = orchestrator(&db).run_incremental_scoring().await.unwrap();
    assert_eq!(report.total, 0);
}
