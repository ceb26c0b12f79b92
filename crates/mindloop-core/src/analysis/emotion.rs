//! Emotion scoring
//!
//! `EmotionAnalyzer` is the per-note scoring seam. The bundled
//! `LexicalEmotionAnalyzer` is a deterministic weighted-lexicon scorer; a
//! model-backed analyzer can be swapped in by implementing the trait.

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::EmotionScore;

/// Scores a span of text for valence and arousal
#[async_trait]
pub trait EmotionAnalyzer: Send + Sync {
    /// Score non-empty text.
    ///
    /// Absence of emotional signal yields `EmotionScore::neutral()`, not an
    /// error. Errors mean the analyzer itself is unavailable.
    async fn analyze(&self, text: &str) -> Result<EmotionScore>;

    /// Human-readable name (for logs)
    fn name(&self) -> &'static str;
}

const POSITIVE: &[(&str, f64)] = &[
    ("happy", 2.0),
    ("joy", 2.5),
    ("joyful", 2.5),
    ("grateful", 2.5),
    ("thankful", 2.0),
    ("love", 2.5),
    ("loved", 2.5),
    ("excited", 2.0),
    ("proud", 2.0),
    ("calm", 1.5),
    ("peaceful", 2.0),
    ("relaxed", 1.5),
    ("hopeful", 2.0),
    ("good", 1.5),
    ("great", 2.0),
    ("wonderful", 2.5),
    ("amazing", 2.5),
    ("fun", 1.5),
    ("glad", 1.5),
    ("content", 1.5),
    ("inspired", 2.0),
    ("motivated", 1.5),
    ("confident", 1.5),
    ("success", 2.0),
    ("win", 1.5),
    ("enjoyed", 2.0),
    ("beautiful", 2.0),
    ("laugh", 1.5),
    ("laughed", 1.5),
    ("better", 1.0),
    ("nice", 1.0),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("sad", 2.0),
    ("angry", 2.5),
    ("furious", 3.0),
    ("anxious", 2.0),
    ("anxiety", 2.0),
    ("worried", 2.0),
    ("stressed", 2.0),
    ("stress", 1.5),
    ("tired", 1.0),
    ("exhausted", 2.0),
    ("lonely", 2.0),
    ("afraid", 2.0),
    ("scared", 2.0),
    ("frustrated", 2.0),
    ("annoyed", 1.5),
    ("upset", 2.0),
    ("hate", 2.5),
    ("terrible", 2.5),
    ("awful", 2.5),
    ("bad", 1.5),
    ("hurt", 2.0),
    ("guilty", 2.0),
    ("ashamed", 2.5),
    ("depressed", 3.0),
    ("overwhelmed", 2.0),
    ("disappointed", 2.0),
    ("failure", 2.5),
    ("failed", 2.0),
    ("cry", 2.0),
    ("cried", 2.0),
    ("worse", 1.5),
    ("panic", 2.5),
];

const HIGH_AROUSAL: &[(&str, f64)] = &[
    ("excited", 2.0),
    ("thrilled", 2.5),
    ("furious", 3.0),
    ("angry", 2.0),
    ("panic", 3.0),
    ("anxious", 2.0),
    ("stressed", 1.5),
    ("energized", 2.0),
    ("rush", 1.5),
    ("urgent", 2.0),
    ("scared", 2.0),
    ("amazing", 1.0),
    ("overwhelmed", 2.0),
    ("racing", 1.5),
    ("shaking", 2.0),
    ("can't", 0.5),
];

const LOW_AROUSAL: &[(&str, f64)] = &[
    ("calm", 2.0),
    ("peaceful", 2.0),
    ("relaxed", 2.0),
    ("tired", 1.5),
    ("exhausted", 1.5),
    ("sleepy", 2.0),
    ("bored", 2.0),
    ("quiet", 1.5),
    ("slow", 1.0),
    ("rest", 1.0),
    ("content", 1.0),
    ("numb", 2.0),
    ("lazy", 1.5),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "didn't", "isn't", "wasn't", "aren't", "can't", "won't",
    "hardly", "without",
];

const INTENSIFIERS: &[&str] = &[
    "very",
    "really",
    "so",
    "extremely",
    "incredibly",
    "super",
    "totally",
];

/// Normalization constant for the valence sum (larger = slower saturation)
const VALENCE_ALPHA: f64 = 15.0;
/// Normalization constant for the arousal sum
const AROUSAL_ALPHA: f64 = 8.0;

fn weight(lexicon: &[(&str, f64)], token: &str) -> Option<f64> {
    lexicon.iter().find(|(t, _)| *t == token).map(|(_, w)| *w)
}

/// Lowercase word tokens, keeping apostrophes inside words
fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|t| t.trim_matches(|c: char| c == '\'' || c == '\u{2019}'))
        .filter(|t| !t.is_empty())
        .map(|t| t.replace('\u{2019}', "'").to_lowercase())
        .collect()
}

/// Deterministic weighted-lexicon emotion scorer
#[derive(Debug, Clone, Default)]
pub struct LexicalEmotionAnalyzer;

impl LexicalEmotionAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous scoring used by `analyze`
    pub fn score(&self, text: &str) -> Result<EmotionScore> {
        if text.trim().is_empty() {
            return Err(Error::InvalidData("cannot score empty text".to_string()));
        }

        let tokens = tokens(text);
        let mut valence_sum = 0.0;
        let mut arousal_sum = 0.0;
        let mut matched = false;

        for (i, token) in tokens.iter().enumerate() {
            let window = &tokens[i.saturating_sub(2)..i];
            let negated = window.iter().any(|t| NEGATORS.contains(&t.as_str()));
            let boost = if window.iter().any(|t| INTENSIFIERS.contains(&t.as_str())) {
                1.5
            } else {
                1.0
            };

            if let Some(w) = weight(POSITIVE, token) {
                valence_sum += if negated { -0.75 * w } else { w * boost };
                matched = true;
            }
            if let Some(w) = weight(NEGATIVE, token) {
                valence_sum -= if negated { -0.5 * w } else { w * boost };
                matched = true;
            }
            if let Some(w) = weight(HIGH_AROUSAL, token) {
                arousal_sum += w * boost;
                matched = true;
            }
            if let Some(w) = weight(LOW_AROUSAL, token) {
                arousal_sum -= w * boost;
                matched = true;
            }
        }

        if !matched {
            return Ok(EmotionScore::neutral());
        }

        let exclamations = text.matches('!').count().min(3) as f64;
        arousal_sum += 0.5 * exclamations;

        let valence = valence_sum / (valence_sum * valence_sum + VALENCE_ALPHA).sqrt();
        let arousal = 0.5 + 0.5 * arousal_sum / (arousal_sum * arousal_sum + AROUSAL_ALPHA).sqrt();

        Ok(EmotionScore::new(valence, arousal))
    }
}

#[async_trait]
impl EmotionAnalyzer for LexicalEmotionAnalyzer {
    async fn analyze(&self, text: &str) -> Result<EmotionScore> {
        self.score(text)
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> EmotionScore {
        LexicalEmotionAnalyzer::new().score(text).unwrap()
    }

    #[test]
    fn test_neutral_when_no_terms() {
        assert_eq!(score("Went to the store and bought bread."), EmotionScore::neutral());
    }

    #[test]
    fn test_empty_text_is_error() {
        assert!(matches!(
            LexicalEmotionAnalyzer::new().score("   "),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_positive_and_negative() {
        let happy = score("I feel happy and grateful today");
        let sad = score("I feel sad and lonely, everything is awful");

        assert!(happy.valence > 0.3, "got {}", happy.valence);
        assert!(sad.valence < -0.3, "got {}", sad.valence);
    }

    #[test]
    fn test_negation_flips_valence() {
        assert!(score("I am not happy").valence < 0.0);
        assert!(score("I was not sad at all").valence > 0.0);
    }

    #[test]
    fn test_intensifier_strengthens() {
        assert!(score("very happy").valence > score("happy").valence);
    }

    #[test]
    fn test_arousal_direction() {
        let calm = score("calm, quiet and relaxed evening");
        let panic = score("panic! my heart was racing and I was shaking");

        assert!(calm.arousal < 0.5);
        assert!(panic.arousal > 0.7);
    }

    #[test]
    fn test_deterministic_and_in_range() {
        let texts = [
            "Totally furious furious furious!!!",
            "happy happy happy happy happy happy happy",
            "sleepy bored numb tired",
            "Don\u{2019}t worry, be happy",
        ];
        for text in texts {
            let a = score(text);
            let b = score(text);
            assert_eq!(a, b);
            assert!((-1.0..=1.0).contains(&a.valence));
            assert!((0.0..=1.0).contains(&a.arousal));
        }
    }

    #[test]
    fn test_tokenizer_handles_apostrophes() {
        assert_eq!(tokens("Don't STOP"), vec!["don't", "stop"]);
        assert_eq!(tokens("'quoted'"), vec!["quoted"]);
    }

    #[tokio::test]
    async fn test_async_analyze() {
        let analyzer = LexicalEmotionAnalyzer::new();
        let result = analyzer.analyze("great day").await.unwrap();
        assert!(result.valence > 0.0);
        assert_eq!(analyzer.name(), "lexical");
    }
}
