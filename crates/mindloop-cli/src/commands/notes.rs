//! Note command implementations (add, list)

use anyhow::{bail, Result};
use chrono::Local;
use mindloop_core::{Database, Modality, NewNote, Note};

use super::truncate;

pub fn cmd_add(
    db: &Database,
    text: Option<&str>,
    tags: &[String],
    modality: Modality,
) -> Result<()> {
    let text = text.map(str::trim).filter(|t| !t.is_empty());
    if text.is_none() && modality == Modality::Text {
        bail!("A text note needs --text");
    }

    let new = NewNote {
        modality,
        content_text: text.map(str::to_string),
        tags: tags.iter().cloned().collect(),
        created_at: None,
    };
    let note = db.insert_note(&new)?;

    println!("📝 Added note #{} ({})", note.id, note.modality);
    if !note.tags.is_empty() {
        let tags: Vec<&str> = note.tags.iter().map(String::as_str).collect();
        println!("   Tags: {}", tags.join(", "));
    }
    println!("   Run 'mindloop score' to analyze it.");

    Ok(())
}

/// One-line summary of a note's scores
pub fn format_scores(note: &Note) -> String {
    match note.emotion() {
        Some((valence, arousal)) => format!("v {:+.2}  a {:.2}", valence, arousal),
        None => "unscored".to_string(),
    }
}

pub fn cmd_notes(db: &Database, limit: usize) -> Result<()> {
    let notes = db.recent_notes(limit)?;

    if notes.is_empty() {
        println!("No notes yet. Add one with: mindloop add --text \"...\"");
        return Ok(());
    }

    println!();
    println!("📓 Recent Notes");
    println!("   ─────────────────────────────────────────────────────────────");
    for note in &notes {
        let when = note.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let text = note
            .text()
            .map(|t| truncate(t, 50))
            .unwrap_or_else(|| format!("({})", note.modality));
        let marker = if note.loop_group_id.is_some() { " 🔁" } else { "" };
        println!(
            "   #{:<5} {}  {:<18} {}{}",
            note.id,
            when,
            format_scores(note),
            text,
            marker
        );
    }
    println!();

    Ok(())
}
