//! Search query composition.
//!
//! Each (site, category) pair yields one query of the form
//! `site:<domain> <keyword-expression> after:<YYYY-MM-DD>`. The keyword
//! expression is passed through verbatim; the search engine interprets
//! the boolean syntax.

use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Earliest publication date in scope for a run.
///
/// Written in config either as a relative offset (`"14d"`) or a fixed
/// calendar date (`"2026-01-01"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Recency {
    Date(NaiveDate),
    DaysAgo(u32),
}

impl Default for Recency {
    fn default() -> Self {
        Recency::DaysAgo(14)
    }
}

impl Recency {
    /// Resolve to an absolute date relative to `today`.
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match *self {
            Recency::Date(date) => date,
            Recency::DaysAgo(days) => today
                .checked_sub_days(Days::new(days as u64))
                .unwrap_or(NaiveDate::MIN),
        }
    }
}

impl FromStr for Recency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(days) = s.strip_suffix('d') {
            let days = days
                .parse::<u32>()
                .with_context(|| format!("invalid recency offset: '{}'", s))?;
            return Ok(Recency::DaysAgo(days));
        }
        match NaiveDate::parse_from_str(s, DATE_FORMAT) {
            Ok(date) => Ok(Recency::Date(date)),
            Err(_) => bail!(
                "invalid recency '{}': expected '<N>d' or a YYYY-MM-DD date",
                s
            ),
        }
    }
}

impl TryFrom<String> for Recency {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recency::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Recency::DaysAgo(days) => write!(f, "{}d", days),
        }
    }
}

/// A search query for one site and one role category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub site: String,
    pub keywords: String,
    pub cutoff: NaiveDate,
}

impl SearchQuery {
    pub fn new(site: &str, keywords: &str, cutoff: NaiveDate) -> Self {
        Self {
            site: site.trim().to_string(),
            keywords: keywords.trim().to_string(),
            cutoff,
        }
    }

    /// The query string sent to the search provider.
    pub fn render(&self) -> String {
        format!(
            "site:{} {} after:{}",
            self.site,
            self.keywords,
            self.cutoff.format(DATE_FORMAT)
        )
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
