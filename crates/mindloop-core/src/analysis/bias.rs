//! Cognitive-bias signal evaluation
//!
//! Each category is an independent rule over a single note; a category's score
//! is the fraction of notes matching its rule. All five categories are always
//! evaluated.

use std::collections::BTreeMap;

use crate::config::BiasDetectorConfig;
use crate::error::Result;
use crate::models::{BiasSignal, Note, NoteId};

use super::types::BiasEvaluation;

/// Evaluates a note set for bias-signal prevalence
pub trait BiasDetector: Send + Sync {
    fn evaluate(&self, notes: &[Note]) -> Result<BiasEvaluation>;
}

/// Absolute qualifiers (all-or-nothing thinking)
const ABSOLUTIST: &[&str] = &[
    "always",
    "never",
    "everyone",
    "everybody",
    "nobody",
    "no one",
    "nothing",
    "everything",
    "completely",
    "totally",
    "entirely",
    "definitely",
    "certainly",
    "obviously",
    "proves",
    "i knew it",
];

/// Recency and vividness markers
const AVAILABILITY: &[&str] = &[
    "just saw",
    "just read",
    "just heard",
    "heard about",
    "on the news",
    "saw on",
    "read about",
    "happened to a friend",
    "happens all the time",
    "everyone is talking",
    "going viral",
    "recently",
    "the other day",
];

/// Reference-point markers
const ANCHORING: &[&str] = &[
    "at first",
    "first impression",
    "initially",
    "originally",
    "the original",
    "started at",
    "compared to",
    "used to be",
    "was supposed to",
    "expected it to",
];

/// Loss and fear-of-losing markers
const LOSS: &[&str] = &[
    "lose",
    "losing",
    "lost",
    "loss",
    "miss out",
    "missing out",
    "can't afford",
    "risk",
    "give up",
    "giving up",
    "regret",
];

/// Prior-investment markers
const SUNK_COST: &[&str] = &[
    "already spent",
    "already invested",
    "already paid",
    "put so much",
    "come this far",
    "came this far",
    "too late to",
    "waste of",
    "wasted",
    "so many years",
    "after all this time",
    "after all the",
];

/// Lowercased text with words separated by single spaces and padded,
/// so phrase markers match on word boundaries
fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .filter(|w| !w.is_empty())
        .map(|w| w.replace('\u{2019}', "'").to_lowercase())
        .collect();
    format!(" {} ", words.join(" "))
}

fn has_marker(normalized: &str, markers: &[&str]) -> bool {
    markers
        .iter()
        .any(|m| normalized.contains(&format!(" {} ", m)))
}

/// Rule-based lexical bias detector
#[derive(Debug, Clone, Default)]
pub struct LexicalBiasDetector {
    config: BiasDetectorConfig,
}

impl LexicalBiasDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BiasDetectorConfig) -> Self {
        Self { config }
    }

    /// Whether a single note matches a signal's rule
    pub fn matches(&self, note: &Note, signal: BiasSignal) -> bool {
        let text = note.text().map(normalize);
        let lexical = |markers: &[&str]| text.as_deref().is_some_and(|t| has_marker(t, markers));

        match signal {
            BiasSignal::Confirmation => lexical(ABSOLUTIST),
            BiasSignal::Availability => lexical(AVAILABILITY),
            BiasSignal::Anchoring => lexical(ANCHORING),
            BiasSignal::LossAversion => {
                lexical(LOSS)
                    || note
                        .sentiment
                        .is_some_and(|v| v < self.config.negative_valence_threshold)
            }
            BiasSignal::SunkCost => lexical(SUNK_COST),
        }
    }
}

impl BiasDetector for LexicalBiasDetector {
    fn evaluate(&self, notes: &[Note]) -> Result<BiasEvaluation> {
        let mut matching: BTreeMap<BiasSignal, Vec<NoteId>> = BTreeMap::new();

        for signal in BiasSignal::all() {
            let ids = notes
                .iter()
                .filter(|n| self.matches(n, *signal))
                .map(|n| n.id)
                .collect();
            matching.insert(*signal, ids);
        }

        Ok(BiasEvaluation::new(notes.len(), matching))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::note_at;
    use chrono::Utc;

    fn note(id: i64, text: &str) -> Note {
        note_at(id, Utc::now(), text)
    }

    #[test]
    fn test_empty_notes_zero_filled() {
        let eval = LexicalBiasDetector::new().evaluate(&[]).unwrap();
        let scores = eval.scores();
        assert_eq!(scores.len(), 5);
        assert!(scores.values().all(|s| *s == 0.0));
    }

    #[test]
    fn test_each_rule_independently() {
        let detector = LexicalBiasDetector::new();
        let cases = [
            ("Nobody ever listens, it always goes wrong", BiasSignal::Confirmation),
            ("I just saw a story on the news about crashes", BiasSignal::Availability),
            ("At first the offer seemed low", BiasSignal::Anchoring),
            ("I'm scared to lose this job", BiasSignal::LossAversion),
            ("We've come this far, can't stop now", BiasSignal::SunkCost),
        ];

        for (text, expected) in cases {
            let n = note(1, text);
            assert!(detector.matches(&n, expected), "{:?} should match {:?}", text, expected);
        }
    }

    #[test]
    fn test_markers_respect_word_boundaries() {
        let detector = LexicalBiasDetector::new();
        // "closer" contains "lose" but is not a loss marker
        assert!(!detector.matches(&note(1, "getting closer to home"), BiasSignal::LossAversion));
        assert!(!detector.matches(&note(1, "a riskless plan"), BiasSignal::LossAversion));
    }

    #[test]
    fn test_negative_affect_counts_as_loss_aversion() {
        let detector = LexicalBiasDetector::new();
        let mut n = note(1, "Walked home.");
        assert!(!detector.matches(&n, BiasSignal::LossAversion));

        n.sentiment = Some(-0.6);
        n.arousal = Some(0.4);
        assert!(detector.matches(&n, BiasSignal::LossAversion));
    }

    #[test]
    fn test_scores_are_fractions() {
        let notes = vec![
            note(1, "I always mess this up"),
            note(2, "Everyone hates me, always"),
            note(3, "Nice walk in the park"),
            note(4, "Already spent too much on this car"),
        ];

        let eval = LexicalBiasDetector::new().evaluate(&notes).unwrap();
        assert_eq!(eval.total_notes, 4);
        assert!((eval.score(BiasSignal::Confirmation) - 0.5).abs() < 1e-9);
        assert!((eval.score(BiasSignal::SunkCost) - 0.25).abs() < 1e-9);
        assert_eq!(eval.score(BiasSignal::Anchoring), 0.0);
        assert_eq!(eval.matching(BiasSignal::Confirmation), &[NoteId(1), NoteId(2)]);
    }

    #[test]
    fn test_single_note_signals_have_all_keys() {
        let signals = LexicalBiasDetector::new()
            .evaluate(&[note(1, "never again")])
            .unwrap()
            .scores();
        assert_eq!(signals.len(), 5);
        assert_eq!(signals[&BiasSignal::Confirmation], 1.0);
        assert_eq!(signals[&BiasSignal::SunkCost], 0.0);
    }
}
