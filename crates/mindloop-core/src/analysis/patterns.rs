//! Time-bucketed statistics over notes
//!
//! Averages only include notes that already carry an emotion score. Empty
//! buckets report zero averages.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc};

use crate::models::Note;

use super::types::{AnalysisStatistics, Bucket, Granularity};

/// Running sums for one bucket
#[derive(Default, Clone, Copy)]
struct Accumulator {
    count: usize,
    scored: usize,
    valence: f64,
    arousal: f64,
}

impl Accumulator {
    fn add(&mut self, note: &Note) {
        self.count += 1;
        if let Some((v, a)) = note.emotion() {
            self.scored += 1;
            self.valence += v;
            self.arousal += a;
        }
    }

    fn into_bucket(self, key: u32) -> Bucket {
        let (average_valence, average_arousal) = if self.scored == 0 {
            (0.0, 0.0)
        } else {
            let n = self.scored as f64;
            (self.valence / n, self.arousal / n)
        };
        Bucket {
            key,
            count: self.count,
            scored_count: self.scored,
            average_valence,
            average_arousal,
        }
    }
}

/// Computes hourly, weekly and rolling-window buckets
///
/// Rolling windows end at the close of the anchor's UTC day, so results are
/// stable for repeated runs within the same day.
#[derive(Debug, Clone, Copy)]
pub struct PatternAggregator {
    window_end: DateTime<Utc>,
}

impl PatternAggregator {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        let next_day = anchor.date_naive() + Duration::days(1);
        Self {
            window_end: next_day.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    pub fn aggregate(&self, notes: &[Note], granularity: Granularity) -> Vec<Bucket> {
        match granularity {
            Granularity::Hourly => {
                let mut acc = [Accumulator::default(); 24];
                for note in notes {
                    acc[note.created_at.hour() as usize].add(note);
                }
                acc.iter()
                    .enumerate()
                    .map(|(hour, a)| a.into_bucket(hour as u32))
                    .collect()
            }
            Granularity::Weekly => {
                let mut acc = [Accumulator::default(); 7];
                for note in notes {
                    let day = note.created_at.weekday().number_from_monday();
                    acc[(day - 1) as usize].add(note);
                }
                acc.iter()
                    .enumerate()
                    .map(|(i, a)| a.into_bucket(i as u32 + 1))
                    .collect()
            }
            Granularity::Rolling { days, count } => {
                let mut acc = vec![Accumulator::default(); count as usize];
                if days > 0 {
                    let span = Duration::days(days as i64);
                    for note in notes {
                        if note.created_at >= self.window_end {
                            continue;
                        }
                        let age = self.window_end - note.created_at;
                        let index = (age.num_seconds() / span.num_seconds()) as usize;
                        if let Some(a) = acc.get_mut(index) {
                            a.add(note);
                        }
                    }
                }
                acc.into_iter()
                    .enumerate()
                    .map(|(i, a)| a.into_bucket(i as u32))
                    .collect()
            }
        }
    }

    /// Corpus-wide statistics
    pub fn statistics(&self, notes: &[Note]) -> AnalysisStatistics {
        let mut overall = Accumulator::default();
        let mut modality_counts = BTreeMap::new();
        for note in notes {
            overall.add(note);
            *modality_counts.entry(note.modality).or_insert(0) += 1;
        }
        let summary = overall.into_bucket(0);

        AnalysisStatistics {
            total_notes: notes.len(),
            analyzed_notes: summary.scored_count,
            average_valence: summary.average_valence,
            average_arousal: summary.average_arousal,
            hourly: self.aggregate(notes, Granularity::Hourly),
            weekly: self.aggregate(notes, Granularity::Weekly),
            daily: self.aggregate(notes, Granularity::Rolling { days: 1, count: 7 }),
            modality_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Modality;
    use crate::test_utils::{note_at, scored};
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        // 2026-06-01 is a Monday
        Utc.with_ymd_and_hms(2026, 6, d, h, 30, 0).unwrap()
    }

    #[test]
    fn test_hourly_buckets() {
        let notes = vec![
            scored(note_at(1, at(1, 9), "a"), 0.5, 0.6),
            scored(note_at(2, at(2, 9), "b"), -0.1, 0.4),
            note_at(3, at(3, 9), "unscored"),
            scored(note_at(4, at(3, 22), "c"), 0.2, 0.2),
        ];
        let buckets = PatternAggregator::new(at(3, 23)).aggregate(&notes, Granularity::Hourly);

        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[9].count, 3);
        assert_eq!(buckets[9].scored_count, 2);
        assert!((buckets[9].average_valence - 0.2).abs() < 1e-9);
        assert!((buckets[9].average_arousal - 0.5).abs() < 1e-9);
        assert_eq!(buckets[22].count, 1);
        assert_eq!(buckets[0].average_valence, 0.0);
        assert!(buckets.iter().all(|b| !b.average_valence.is_nan()));
    }

    #[test]
    fn test_weekly_keys_start_monday() {
        let notes = vec![
            scored(note_at(1, at(1, 9), "monday"), 0.5, 0.5),
            scored(note_at(2, at(7, 9), "sunday"), -0.5, 0.5),
        ];
        let buckets = PatternAggregator::new(at(7, 23)).aggregate(&notes, Granularity::Weekly);

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].key, 1);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[6].key, 7);
        assert_eq!(buckets[6].average_valence, -0.5);
    }

    #[test]
    fn test_rolling_windows() {
        let notes = vec![
            note_at(1, at(10, 8), "today"),
            note_at(2, at(9, 8), "yesterday"),
            note_at(3, at(8, 23), "two days ago"),
            note_at(4, at(1, 8), "old"),
        ];
        let aggregator = PatternAggregator::new(at(10, 12));
        let buckets = aggregator.aggregate(&notes, Granularity::Rolling { days: 1, count: 3 });

        assert_eq!(buckets.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 1, 1]);

        let weekly = aggregator.aggregate(&notes, Granularity::Rolling { days: 7, count: 2 });
        assert_eq!(weekly[0].count, 3);
        assert_eq!(weekly[1].count, 1);
    }

    #[test]
    fn test_statistics_empty() {
        let stats = PatternAggregator::new(at(1, 0)).statistics(&[]);
        assert_eq!(stats.total_notes, 0);
        assert_eq!(stats.analyzed_notes, 0);
        assert_eq!(stats.average_valence, 0.0);
        assert_eq!(stats.hourly.len(), 24);
        assert_eq!(stats.weekly.len(), 7);
        assert_eq!(stats.daily.len(), 7);
    }

    #[test]
    fn test_statistics_counts_modalities() {
        let mut audio = note_at(2, at(1, 10), "memo");
        audio.modality = Modality::Audio;
        let notes = vec![scored(note_at(1, at(1, 9), "a"), 0.4, 0.6), audio];

        let stats = PatternAggregator::new(at(1, 12)).statistics(&notes);
        assert_eq!(stats.total_notes, 2);
        assert_eq!(stats.analyzed_notes, 1);
        assert_eq!(stats.modality_counts[&Modality::Text], 1);
        assert_eq!(stats.modality_counts[&Modality::Audio], 1);
        assert!((stats.average_valence - 0.4).abs() < 1e-9);
    }
}
