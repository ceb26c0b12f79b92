//! Loop detection - recurring topics across the note corpus
//!
//! Keywords are extracted per note (lowercased tokens of at least
//! `min_keyword_len` characters, minus a stop-word list), counted by the number
//! of notes they appear in, and the top-K become candidate topics. Each topic
//! collects the notes containing it; clusters below `min_cluster_size` are
//! dropped.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::config::LoopDetectorConfig;
use crate::error::Result;
use crate::models::{Note, NoteId};

use super::types::{unit, LoopCluster};

/// Clusters notes into recurring-topic groups
pub trait LoopDetector: Send + Sync {
    /// Compute loop clusters over the full note set
    fn cluster(&self, notes: &[Note]) -> Result<Vec<LoopCluster>>;

    /// The most prominent keyword of a single text, if any
    fn topic_of(&self, text: &str) -> Option<String>;
}

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "also", "always", "another", "anything", "around", "because",
    "been", "before", "being", "could", "didn", "does", "doing", "done", "each", "even", "every",
    "everything", "feel", "feeling", "felt", "from", "getting", "going", "gonna", "good", "have",
    "having", "here", "into", "just", "know", "like", "made", "make", "many", "maybe", "more",
    "most", "much", "need", "nothing", "only", "other", "over", "really", "said", "same", "should",
    "since", "some", "something", "still", "such", "take", "than", "that", "their", "them", "then",
    "there", "these", "they", "thing", "things", "think", "this", "those", "thought", "through",
    "today", "tomorrow", "very", "want", "wanted", "well", "went", "were", "what", "when", "where",
    "which", "while", "will", "with", "would", "yesterday", "your",
];

/// Lowercase alphanumeric tokens
fn raw_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Candidate topic keywords of a text, in order of appearance (with repeats)
pub fn extract_keywords(text: &str, min_len: usize) -> Vec<String> {
    raw_tokens(text)
        .filter(|t| t.chars().count() >= min_len)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Whether `text` contains `keyword` as a whole token (case-insensitive)
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    raw_tokens(text).any(|t| t == keyword)
}

/// Stable hex hash of a topic keyword, used for `Note::topic_hash`
pub fn topic_hash(topic: &str) -> String {
    let digest = Sha256::digest(topic.to_lowercase().as_bytes());
    hex::encode(digest)
}

/// Stable cluster id for a topic
pub fn cluster_id(topic: &str) -> String {
    let digest = Sha256::digest(format!("loop:{}", topic.to_lowercase()).as_bytes());
    hex::encode(&digest[..8])
}

/// Keyword-frequency loop detector
#[derive(Debug, Clone, Default)]
pub struct KeywordLoopDetector {
    config: LoopDetectorConfig,
}

/// Per-keyword accumulator
struct KeywordStats {
    notes: Vec<NoteId>,
    first_seen: DateTime<Utc>,
    first_index: usize,
}

impl KeywordLoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LoopDetectorConfig) -> Self {
        Self { config }
    }

    /// Notes eligible for clustering, oldest first
    fn considered<'a>(&self, notes: &'a [Note]) -> Vec<&'a Note> {
        let mut eligible: Vec<&Note> = notes.iter().filter(|n| n.text().is_some()).collect();
        eligible.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        if let (Some(days), Some(newest)) = (self.config.lookback_days, eligible.last()) {
            // A window reaching past the representable range covers every note
            let cutoff = Duration::try_days(i64::from(days))
                .and_then(|window| newest.created_at.checked_sub_signed(window));
            if let Some(cutoff) = cutoff {
                eligible.retain(|n| n.created_at >= cutoff);
            }
        }

        eligible
    }
}

impl LoopDetector for KeywordLoopDetector {
    fn cluster(&self, notes: &[Note]) -> Result<Vec<LoopCluster>> {
        let considered = self.considered(notes);
        if considered.is_empty() {
            return Ok(vec![]);
        }

        let mut stats: HashMap<String, KeywordStats> = HashMap::new();
        for (index, note) in considered.iter().enumerate() {
            let keywords: BTreeSet<String> = note
                .text()
                .map(|t| extract_keywords(t, self.config.min_keyword_len))
                .unwrap_or_default()
                .into_iter()
                .collect();

            for keyword in keywords {
                let entry = stats.entry(keyword).or_insert_with(|| KeywordStats {
                    notes: Vec::new(),
                    first_seen: note.created_at,
                    first_index: index,
                });
                entry.notes.push(note.id);
            }
        }

        let mut ranked: Vec<(String, KeywordStats)> = stats.into_iter().collect();
        // Frequency desc, then earliest first occurrence, then keyword for total order
        ranked.sort_by(|(ka, a), (kb, b)| {
            b.notes
                .len()
                .cmp(&a.notes.len())
                .then(a.first_seen.cmp(&b.first_seen))
                .then(a.first_index.cmp(&b.first_index))
                .then(ka.cmp(kb))
        });
        ranked.truncate(self.config.top_k);

        let total = considered.len() as f64;
        let clusters: Vec<LoopCluster> = ranked
            .into_iter()
            .filter(|(_, s)| s.notes.len() >= self.config.min_cluster_size)
            .map(|(topic, s)| LoopCluster {
                id: cluster_id(&topic),
                strength: unit(s.notes.len() as f64 / total),
                note_ids: s.notes,
                topic,
            })
            .collect();

        tracing::debug!(
            considered = considered.len(),
            clusters = clusters.len(),
            "Loop detection complete"
        );

        Ok(clusters)
    }

    fn topic_of(&self, text: &str) -> Option<String> {
        let keywords = extract_keywords(text, self.config.min_keyword_len);
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (i, k) in keywords.iter().enumerate() {
            counts.entry(k.as_str()).or_insert((0, i)).0 += 1;
        }

        counts
            .into_iter()
            .max_by(|(_, (ca, ia)), (_, (cb, ib))| ca.cmp(cb).then(ib.cmp(ia)))
            .map(|(k, _)| k.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::note_at;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_keywords_filters() {
        let kw = extract_keywords("I really think the Work meeting at 1030 ran long", 4);
        assert_eq!(kw, vec!["work", "meeting", "long"]);
    }

    #[test]
    fn test_contains_keyword_is_token_based() {
        assert!(contains_keyword("Work, again.", "work"));
        assert!(!contains_keyword("a long workout", "work"));
    }

    #[test]
    fn test_cluster_strength_and_membership() {
        let notes = vec![
            note_at(1, base(), "Stressful work deadline"),
            note_at(2, base() + Duration::hours(1), "Family dinner was lovely"),
            note_at(3, base() + Duration::hours(2), "More work, more deadline pressure"),
            note_at(4, base() + Duration::hours(3), "Work again"),
        ];

        let clusters = KeywordLoopDetector::new().cluster(&notes).unwrap();

        assert_eq!(clusters[0].topic, "work");
        assert_eq!(clusters[0].note_ids, vec![NoteId(1), NoteId(3), NoteId(4)]);
        assert!((clusters[0].strength - 0.75).abs() < 1e-9);

        assert_eq!(clusters[1].topic, "deadline");
        assert!((clusters[1].strength - 0.5).abs() < 1e-9);

        // Single-note keywords are discarded
        assert!(clusters.iter().all(|c| c.note_ids.len() >= 2));
    }

    #[test]
    fn test_ties_broken_by_first_occurrence() {
        let notes = vec![
            note_at(1, base(), "garden"),
            note_at(2, base() + Duration::hours(1), "piano"),
            note_at(3, base() + Duration::hours(2), "piano"),
            note_at(4, base() + Duration::hours(3), "garden"),
        ];

        let clusters = KeywordLoopDetector::new().cluster(&notes).unwrap();
        let topics: Vec<&str> = clusters.iter().map(|c| c.topic.as_str()).collect();
        assert_eq!(topics, vec!["garden", "piano"]);
    }

    #[test]
    fn test_top_k_limit() {
        let config = LoopDetectorConfig {
            top_k: 1,
            ..Default::default()
        };
        let notes = vec![
            note_at(1, base(), "garden piano"),
            note_at(2, base() + Duration::hours(1), "garden piano"),
        ];
        let clusters = KeywordLoopDetector::with_config(config)
            .cluster(&notes)
            .unwrap();
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_lookback_window() {
        let config = LoopDetectorConfig {
            lookback_days: Some(7),
            ..Default::default()
        };
        let notes = vec![
            note_at(1, base() - Duration::days(30), "running"),
            note_at(2, base(), "running"),
            note_at(3, base() + Duration::days(1), "running"),
        ];
        let clusters = KeywordLoopDetector::with_config(config)
            .cluster(&notes)
            .unwrap();
        assert_eq!(clusters[0].note_ids, vec![NoteId(2), NoteId(3)]);
        assert_eq!(clusters[0].strength, 1.0);
    }

    #[test]
    fn test_oversized_lookback_covers_everything() {
        let config = LoopDetectorConfig {
            lookback_days: Some(u32::MAX),
            ..Default::default()
        };
        let notes = vec![
            note_at(1, base() - Duration::days(3000), "running"),
            note_at(2, base(), "running"),
        ];
        let clusters = KeywordLoopDetector::with_config(config)
            .cluster(&notes)
            .unwrap();
        assert_eq!(clusters[0].note_ids, vec![NoteId(1), NoteId(2)]);
    }

    #[test]
    fn test_empty_and_textless() {
        let detector = KeywordLoopDetector::new();
        assert!(detector.cluster(&[]).unwrap().is_empty());

        let mut audio = note_at(1, base(), "");
        audio.content_text = None;
        assert!(detector.cluster(&[audio]).unwrap().is_empty());
    }

    #[test]
    fn test_topic_of() {
        let detector = KeywordLoopDetector::new();
        assert_eq!(
            detector.topic_of("Sleep was bad. Need better sleep routine"),
            Some("sleep".to_string())
        );
        assert_eq!(detector.topic_of("the and a"), None);
        // Tie resolves to the first keyword in the text
        assert_eq!(
            detector.topic_of("garden piano"),
            Some("garden".to_string())
        );
    }

    #[test]
    fn test_hashes_are_stable() {
        assert_eq!(topic_hash("Work"), topic_hash("work"));
        assert_eq!(topic_hash("work").len(), 64);
        assert_eq!(cluster_id("work").len(), 16);
        assert_ne!(cluster_id("work"), cluster_id("family"));
    }
}
