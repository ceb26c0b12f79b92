//! Analysis pipeline commands (score, analyze, predict, insights)

use anyhow::Result;
use mindloop_core::{
    AnalysisOrchestrator, AnalysisPhase, AnalysisResult, Database, Error, InsightKind, Prediction,
    ScoringReport,
};
use tokio::task::JoinHandle;

use super::truncate;

/// Cancel the run on Ctrl-C; completed batches stay persisted
fn cancel_on_interrupt(orchestrator: &AnalysisOrchestrator) -> JoinHandle<()> {
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("   ⏹  Cancelling after the current batch...");
            cancel.cancel();
        }
    })
}

/// Print a line to stderr each time the pipeline enters a new phase
fn report_progress(orchestrator: &AnalysisOrchestrator) -> JoinHandle<()> {
    let mut rx = orchestrator.subscribe();
    tokio::spawn(async move {
        let mut last_phase = AnalysisPhase::Idle;
        while rx.changed().await.is_ok() {
            let progress = *rx.borrow_and_update();
            if progress.is_analyzing && progress.phase != last_phase {
                eprintln!(
                    "   ⏳ {:<16} {:>3.0}%",
                    progress.phase.as_str(),
                    progress.fraction * 100.0
                );
                last_phase = progress.phase;
            }
        }
    })
}

fn print_scoring(report: &ScoringReport) {
    println!("   Notes pending: {}", report.total);
    println!("   ✅ Scored: {}", report.scored);
    if report.failed > 0 {
        println!("   ⚠️  Failed: {} (retried on the next run)", report.failed);
    }
    if report.skipped > 0 {
        println!("   Skipped (no text): {}", report.skipped);
    }
    println!("   Coverage: {:.0}%", report.coverage() * 100.0);
}

fn print_prediction(prediction: &Prediction) {
    println!(
        "   [{}] {} ({:.0}% confidence, {})",
        prediction.impact,
        prediction.message,
        prediction.confidence * 100.0,
        prediction.timeframe
    );
}

pub async fn cmd_score(orchestrator: &AnalysisOrchestrator) -> Result<()> {
    println!("🧠 Scoring new and changed notes...");

    let interrupt = cancel_on_interrupt(orchestrator);
    let result = orchestrator.run_incremental_scoring().await;
    interrupt.abort();
    let report = result?;

    println!();
    print_scoring(&report);
    if report.cancelled {
        println!();
        println!(
            "⚠️  Cancelled after {} batches. Run 'mindloop score' again to continue.",
            report.batches_completed
        );
    }

    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!();
    println!("📊 Analysis Results");
    println!("   ─────────────────────────────────────────────────────────────");
    print_scoring(&result.scoring);

    let stats = &result.statistics;
    println!();
    println!(
        "   Notes: {} ({} analyzed)",
        stats.total_notes, stats.analyzed_notes
    );
    if stats.analyzed_notes > 0 {
        println!("   Average valence: {:+.2}", stats.average_valence);
        println!("   Average arousal: {:.2}", stats.average_arousal);
    }

    if !result.clusters.is_empty() {
        println!();
        println!("   🔁 Loops");
        for cluster in &result.clusters {
            println!(
                "      {:<20} {:>3.0}% of notes ({} notes)",
                truncate(&cluster.topic, 20),
                cluster.strength * 100.0,
                cluster.note_ids.len()
            );
        }
    }

    let signals: Vec<_> = result
        .bias_signals
        .iter()
        .filter(|(_, score)| **score > 0.0)
        .collect();
    if !signals.is_empty() {
        println!();
        println!("   🧩 Bias signals");
        for (signal, score) in signals {
            println!("      {:<20} {:>3.0}%", signal.label(), score * 100.0);
        }
    }

    if !result.predictions.is_empty() {
        println!();
        println!("   🔮 Predictions");
        for prediction in &result.predictions {
            print_prediction(prediction);
        }
    }

    println!();
    println!("💡 {} insights saved", result.insights.len());
}

pub async fn cmd_analyze(orchestrator: &AnalysisOrchestrator, json: bool) -> Result<()> {
    if !json {
        println!("🧠 Running comprehensive analysis...");
    }

    let interrupt = cancel_on_interrupt(orchestrator);
    let progress = report_progress(orchestrator);
    let outcome = orchestrator.run_comprehensive_analysis().await;
    interrupt.abort();
    progress.abort();

    match outcome {
        Ok(result) if json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Ok(result) => {
            print_result(&result);
            Ok(())
        }
        Err(Error::Cancelled { batches_completed }) => {
            println!();
            println!(
                "⚠️  Analysis cancelled after {} scoring batches. Scores so far are saved.",
                batches_completed
            );
            Ok(())
        }
        Err(Error::Persist { message, result }) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Err(anyhow::anyhow!(
                "Analysis finished but results could not be saved: {}",
                message
            ))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn cmd_predict(orchestrator: &AnalysisOrchestrator) -> Result<()> {
    let predictions = orchestrator.predict().await?;

    if predictions.is_empty() {
        println!("🔮 No predictions yet. Keep journaling and run 'mindloop score'.");
        return Ok(());
    }

    println!();
    println!("🔮 Predictions");
    println!("   ─────────────────────────────────────────────────────────────");
    for prediction in &predictions {
        print_prediction(prediction);
    }
    println!();

    Ok(())
}

pub fn cmd_insights(db: &Database, kind: Option<InsightKind>, limit: usize) -> Result<()> {
    let insights = db.list_insights(kind, limit)?;

    if insights.is_empty() {
        println!("No insights yet. Run 'mindloop analyze' first.");
        return Ok(());
    }

    println!();
    println!("💡 Insights");
    println!("   ─────────────────────────────────────────────────────────────");
    for insight in &insights {
        println!(
            "   #{:<4} {:<10} {}  {} notes",
            insight.id,
            insight.kind.as_str(),
            insight.created_at.format("%Y-%m-%d %H:%M"),
            insight.note_ids.len()
        );
        println!(
            "         {}",
            truncate(&serde_json::to_string(&insight.payload)?, 70)
        );
    }
    println!();

    Ok(())
}
