//! Core data models flowing through the harvest pipeline.
//!
//! A [`RawHit`] is what the search provider returns; a [`JobRecord`] is the
//! normalized row persisted to the store.

use serde::{Deserialize, Serialize};

/// Number of columns in a persisted row.
pub const RECORD_COLUMNS: usize = 6;

/// A single organic result as returned by the search provider.
///
/// Extra provider fields (position, sitelinks, date) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl RawHit {
    pub fn new(title: &str, link: &str, snippet: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            snippet: Some(snippet.to_string()),
        }
    }
}

/// A normalized job listing, one spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    /// Capture date of the run, shared by every record in it.
    pub timestamp: String,
    pub company: String,
    pub platform: String,
    pub title: String,
    /// Identity key within a partition.
    pub link: String,
    pub snippet: String,
}

impl JobRecord {
    /// Render as the fixed row `[timestamp, company, platform, title, link, snippet]`.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.company.clone(),
            self.platform.clone(),
            self.title.clone(),
            self.link.clone(),
            self.snippet.clone(),
        ]
    }

    /// The cell at a zero-based column of [`to_row`](Self::to_row).
    pub fn column(&self, index: usize) -> Option<&str> {
        match index {
            0 => Some(&self.timestamp),
            1 => Some(&self.company),
            2 => Some(&self.platform),
            3 => Some(&self.title),
            4 => Some(&self.link),
            5 => Some(&self.snippet),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_hit_ignores_extra_fields() {
        let hit: RawHit = serde_json::from_str(
            r#"{"title":"EM","link":"https://x.io/1","position":3,"sitelinks":[]}"#,
        )
        .unwrap();
        assert_eq!(hit.title.as_deref(), Some("EM"));
        assert_eq!(hit.snippet, None);
    }

    #[test]
    fn test_row_matches_column_accessor() {
        let record = JobRecord {
            timestamp: "2026-10-19".into(),
            company: "Acme".into(),
            platform: "greenhouse".into(),
            title: "Engineering Manager".into(),
            link: "https://boards.greenhouse.io/acme/jobs/1".into(),
            snippet: "Remote".into(),
        };
        let row = record.to_row();
        assert_eq!(row.len(), RECORD_COLUMNS);
        for (i, cell) in row.iter().enumerate() {
            assert_eq!(record.column(i), Some(cell.as_str()));
        }
        assert_eq!(record.column(RECORD_COLUMNS), None);
    }
}
