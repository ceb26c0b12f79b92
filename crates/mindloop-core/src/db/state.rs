//! Analysis watermark persistence

use async_trait::async_trait;
use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::AnalysisState;
use crate::store::StateStore;

impl Database {
    /// Read the watermark record
    pub fn get_analysis_state(&self) -> Result<AnalysisState> {
        let conn = self.conn()?;
        let (emotion, comprehensive): (Option<String>, Option<String>) = conn.query_row(
            r#"
            SELECT last_emotion_analysis_date, last_comprehensive_analysis_date
            FROM analysis_state
            WHERE id = 1
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(AnalysisState {
            last_emotion_analysis_date: emotion.as_deref().map(parse_datetime).transpose()?,
            last_comprehensive_analysis_date: comprehensive
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
        })
    }

    /// Write the watermark record, keeping the later of stored and new values
    ///
    /// Runs in one IMMEDIATE transaction so concurrent writers cannot move a
    /// watermark backwards.
    pub fn save_analysis_state(&self, state: &AnalysisState) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        tx.execute(
            r#"
            UPDATE analysis_state
            SET last_emotion_analysis_date = CASE
                    WHEN ?1 IS NULL THEN last_emotion_analysis_date
                    WHEN last_emotion_analysis_date IS NULL
                      OR last_emotion_analysis_date < ?1 THEN ?1
                    ELSE last_emotion_analysis_date
                END,
                last_comprehensive_analysis_date = CASE
                    WHEN ?2 IS NULL THEN last_comprehensive_analysis_date
                    WHEN last_comprehensive_analysis_date IS NULL
                      OR last_comprehensive_analysis_date < ?2 THEN ?2
                    ELSE last_comprehensive_analysis_date
                END
            WHERE id = 1
            "#,
            params![
                state.last_emotion_analysis_date.as_ref().map(format_datetime),
                state
                    .last_comprehensive_analysis_date
                    .as_ref()
                    .map(format_datetime)
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for Database {
    async fn load_state(&self) -> Result<AnalysisState> {
        self.get_analysis_state()
    }

    async fn save_state(&self, state: &AnalysisState) -> Result<()> {
        self.save_analysis_state(state)
    }
}
