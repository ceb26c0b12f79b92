//! Status command implementation

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};

use super::open_db;

fn format_watermark(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string())
}

pub fn cmd_status(db_path: &Path) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Mindloop Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if !db_path.exists() {
        println!("   Size: (database not initialized)");
        println!();
        println!("   Run 'mindloop init' to create it.");
        println!();
        return Ok(());
    }

    if let Ok(metadata) = fs::metadata(db_path) {
        let size_kb = metadata.len() as f64 / 1024.0;
        if size_kb < 1024.0 {
            println!("   Size: {:.1} KB", size_kb);
        } else {
            println!("   Size: {:.1} MB", size_kb / 1024.0);
        }
    }

    match open_db(db_path) {
        Ok(db) => {
            let (total, scored) = db.note_count()?;
            let state = db.get_analysis_state()?;

            println!();
            println!("   Notes: {} ({} scored)", total, scored);
            println!("   Insights: {}", db.insight_count()?);
            println!();
            println!(
                "   Last scoring run:       {}",
                format_watermark(state.last_emotion_analysis_date)
            );
            println!(
                "   Last full analysis:     {}",
                format_watermark(state.last_comprehensive_analysis_date)
            );
        }
        Err(e) => {
            println!();
            println!("   ❌ Error opening database: {}", e);
        }
    }

    println!();
    Ok(())
}
