//! Google Sheets backend for [`TabularStore`].
//!
//! Each partition is a tab of one spreadsheet. Uses the Sheets v4 REST API
//! directly:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read column | `GET  {base}/spreadsheets/{id}/values/{tab}!E:E` |
//! | append rows | `POST {base}/spreadsheets/{id}/values/{tab}!A1:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS` |
//!
//! Requests carry a bearer token from an [`AccessTokenSource`]. Appends land
//! after the last row of the table anchored at `A1`, so existing rows are
//! never overwritten.
//!
//! Values are sent as `USER_ENTERED` so dates and numbers are parsed, but a
//! cell that starts with a formula sigil (`=`, `+`, `-`, `@`) is prefixed with
//! `'` and stored as literal text. Titles and snippets come from the web.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::credentials::AccessTokenSource;
use crate::store::{column_letter, TabularStore};

pub struct SheetsStore {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    tokens: Box<dyn AccessTokenSource>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsStore {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        spreadsheet_id: &str,
        tokens: Box<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tokens,
        }
    }

    /// Build `{base}/spreadsheets/{id}/values/{last_segment}` with each
    /// segment percent-encoded.
    fn values_url(&self, last_segment: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid sheets base URL: {}", self.base_url))?;
        let id = self.spreadsheet_id.as_str();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets base URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["spreadsheets", id, "values", last_segment]);
        Ok(url)
    }
}

/// A1-notation sheet reference, quoted when the tab name needs it.
pub fn sheet_ref(tab: &str) -> String {
    if !tab.is_empty() && tab.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        tab.to_string()
    } else {
        format!("'{}'", tab.replace('\'', "''"))
    }
}

/// Keep Sheets from evaluating `cell` as a formula.
fn escape_formula(cell: &str) -> String {
    if cell.starts_with(['=', '+', '-', '@']) {
        format!("'{}", cell)
    } else {
        cell.to_string()
    }
}

fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn read_column(&self, partition: &str, column: usize) -> Result<Vec<String>> {
        let letter = column_letter(column);
        let range = format!("{}!{}:{}", sheet_ref(partition), letter, letter);
        let url = self.values_url(&range)?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Sheets read of {} failed", range))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Sheets API error {} reading {}: {}", status, range, body);
        }

        let parsed: ValueRange = response
            .json()
            .await
            .with_context(|| format!("Invalid Sheets response for {}", range))?;

        Ok(parsed
            .values
            .iter()
            .map(|row| row.first().map(cell_to_string).unwrap_or_default())
            .collect())
    }

    async fn append_rows(&self, partition: &str, rows: &[Vec<String>]) -> Result<()> {
        let range = format!("{}!A1", sheet_ref(partition));
        let mut url = self.values_url(&format!("{}:append", range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let values: Vec<Vec<String>> = rows
            .iter()
            .map(|row| row.iter().map(|cell| escape_formula(cell)).collect())
            .collect();
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "majorDimension": "ROWS",
                "values": values,
            }))
            .send()
            .await
            .with_context(|| format!("Sheets append to {} failed", partition))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Sheets API error {} on append: {}", status, body);
        }

        tracing::debug!(partition, rows = rows.len(), "appended rows");
        Ok(())
    }
}
