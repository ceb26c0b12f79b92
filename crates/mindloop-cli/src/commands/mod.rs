//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (database path, open_db, open_orchestrator)
//! - `notes` - Note commands (add, list)
//! - `analysis` - Pipeline commands (score, analyze, predict, insights)
//! - `status` - Database and watermark status

pub mod analysis;
pub mod core;
pub mod notes;
pub mod status;

// Re-export command functions for main.rs
pub use analysis::*;
pub use core::*;
pub use notes::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
