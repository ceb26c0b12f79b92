//! Note query builder for constructing dynamic SQL
//!
//! Translates a `NoteFilter`, `NoteSort` and `Page` into SQL fragments and
//! parameters, mirroring `NoteFilter::matches`.

use crate::models::{NoteFilter, NoteSort, Page};

use super::format_datetime;

/// SQL components for a note query
pub struct QueryParts {
    /// WHERE clause including "WHERE" keyword (empty if no conditions)
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: &'static str,
    /// LIMIT/OFFSET clause (empty when unpaged)
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

/// A note still waiting for its first emotion score
const UNSCORED: &str = "((sentiment IS NULL OR arousal IS NULL) \
     AND content_text IS NOT NULL AND TRIM(content_text) != '')";

impl QueryParts {
    pub fn build(filter: &NoteFilter, sort: NoteSort, page: Page) -> Self {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(modality) = filter.modality {
            conditions.push("modality = ?".to_string());
            params.push(Box::new(modality.as_str()));
        }

        match (filter.updated_after, filter.include_unscored) {
            (Some(after), true) => {
                conditions.push(format!("(updated_at > ? OR {})", UNSCORED));
                params.push(Box::new(format_datetime(&after)));
            }
            (Some(after), false) => {
                conditions.push("updated_at > ?".to_string());
                params.push(Box::new(format_datetime(&after)));
            }
            (None, true) => conditions.push(UNSCORED.to_string()),
            (None, false) => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let order_clause = match sort {
            NoteSort::CreatedAsc => "ORDER BY created_at ASC, id ASC",
            NoteSort::CreatedDesc => "ORDER BY created_at DESC, id DESC",
            NoteSort::UpdatedAsc => "ORDER BY updated_at ASC, id ASC",
        };

        let limit_clause = match page.limit {
            Some(limit) => {
                params.push(Box::new(limit as i64));
                params.push(Box::new(page.offset as i64));
                "LIMIT ? OFFSET ?".to_string()
            }
            // SQLite needs a LIMIT to accept OFFSET; -1 means unbounded
            None if page.offset > 0 => {
                params.push(Box::new(page.offset as i64));
                "LIMIT -1 OFFSET ?".to_string()
            }
            None => String::new(),
        };

        Self {
            where_clause,
            order_clause,
            limit_clause,
            params,
        }
    }

    /// Borrowed parameter list for rusqlite
    pub fn param_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Modality;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_unfiltered_query() {
        let parts = QueryParts::build(&NoteFilter::all(), NoteSort::CreatedAsc, Page::all());
        assert!(parts.where_clause.is_empty());
        assert!(parts.limit_clause.is_empty());
        assert!(parts.params.is_empty());
    }

    #[test]
    fn test_pending_query() {
        let wm = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let parts = QueryParts::build(
            &NoteFilter::pending_since(Some(wm)).with_modality(Modality::Text),
            NoteSort::UpdatedAsc,
            Page::new(50, 100),
        );

        assert!(parts.where_clause.starts_with("WHERE modality = ?"));
        assert!(parts.where_clause.contains("updated_at > ? OR"));
        assert_eq!(parts.order_clause, "ORDER BY updated_at ASC, id ASC");
        assert_eq!(parts.limit_clause, "LIMIT ? OFFSET ?");
        // modality, watermark, limit, offset
        assert_eq!(parts.params.len(), 4);
    }
}
