//! Configuration parsing and validation.
//!
//! Non-secret settings (sites, role categories, pagination, store layout)
//! live in a TOML file. Secrets are read from the environment by
//! [`Secrets::from_env`], optionally seeded from a `.env` file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::credentials::{CredentialProvider, FileCredentials, InlineCredentials};
use crate::models::RECORD_COLUMNS;
use crate::query::Recency;

pub const SERPER_API_KEY_VAR: &str = "SERPER_API_KEY";
pub const SPREADSHEET_ID_VAR: &str = "SPREADSHEET_ID";
pub const CREDENTIALS_JSON_VAR: &str = "GOOGLE_CREDENTIALS_JSON";
pub const CREDENTIALS_FILE_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const DEFAULT_CREDENTIALS_FILE: &str = "service_account_credentials.json";

/// Largest page Serper serves per request.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub sites: Vec<String>,
    pub categories: Vec<CategoryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// A page with fewer hits than this is treated as the last one.
    /// Unset means half of `page_size`.
    #[serde(default)]
    pub early_stop_threshold: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub recency: Recency,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            locale: default_locale(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            early_stop_threshold: None,
            timeout_secs: default_timeout_secs(),
            recency: Recency::default(),
        }
    }
}

fn default_endpoint() -> String {
    "https://google.serper.dev/search".to_string()
}
fn default_locale() -> String {
    "us".to_string()
}
fn default_page_size() -> u32 {
    10
}
fn default_max_pages() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl SearchConfig {
    /// Hit count below which a page ends pagination.
    pub fn stop_threshold(&self) -> usize {
        let half = self.page_size as usize / 2;
        self.early_stop_threshold.unwrap_or(half)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Zero-based column holding the listing link (the identity key).
    #[serde(default = "default_key_column")]
    pub key_column: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key_column: default_key_column(),
        }
    }
}

fn default_base_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}
fn default_key_column() -> usize {
    4
}

/// A role category: one sheet tab and the keyword expression searched for it.
#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub tab: String,
    pub query: String,
}

impl Config {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            bail!("sites must list at least one domain");
        }
        if let Some(site) = self.sites.iter().find(|s| s.trim().is_empty()) {
            bail!("sites contains an empty domain: '{}'", site);
        }

        if self.categories.is_empty() {
            bail!("at least one [[categories]] entry is required");
        }
        let mut tabs = HashSet::new();
        for category in &self.categories {
            if category.tab.trim().is_empty() {
                bail!("categories.tab must not be empty");
            }
            if category.query.trim().is_empty() {
                bail!("empty categories.query for tab '{}'", category.tab);
            }
            if !tabs.insert(category.tab.as_str()) {
                bail!("duplicate category tab: '{}'", category.tab);
            }
        }

        let search = &self.search;
        if search.page_size == 0 || search.page_size > MAX_PAGE_SIZE {
            bail!(
                "search.page_size must be between 1 and {} (got {})",
                MAX_PAGE_SIZE,
                search.page_size
            );
        }
        if search.max_pages == 0 {
            bail!("search.max_pages must be > 0");
        }
        if let Some(threshold) = search.early_stop_threshold {
            if threshold > search.page_size as usize {
                bail!(
                    "search.early_stop_threshold ({}) must not exceed search.page_size ({})",
                    threshold,
                    search.page_size
                );
            }
        }

        if self.store.key_column >= RECORD_COLUMNS {
            bail!(
                "store.key_column must be < {} (got {})",
                RECORD_COLUMNS,
                self.store.key_column
            );
        }

        Ok(())
    }

    /// Look up a category by tab name.
    pub fn category(&self, tab: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.tab == tab)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml(&content)
}

/// Secrets supplied by the environment.
///
/// All fields are required; a run never starts with a partial set.
pub struct Secrets {
    pub serper_api_key: String,
    pub spreadsheet_id: String,
    pub credentials: Box<dyn CredentialProvider>,
}

impl Secrets {
    /// Read secrets from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), Path::new("."))
    }

    /// Read secrets through `lookup`, resolving the default credentials file
    /// relative to `base_dir`.
    ///
    /// Every missing variable is reported in a single error.
    pub fn from_lookup<F>(lookup: F, base_dir: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let serper_api_key = get(SERPER_API_KEY_VAR);
        let spreadsheet_id = get(SPREADSHEET_ID_VAR);
        let credentials = select_credentials(
            get(CREDENTIALS_JSON_VAR),
            get(CREDENTIALS_FILE_VAR).map(PathBuf::from),
            base_dir,
        );

        let mut missing = Vec::new();
        if serper_api_key.is_none() {
            missing.push(SERPER_API_KEY_VAR.to_string());
        }
        if spreadsheet_id.is_none() {
            missing.push(SPREADSHEET_ID_VAR.to_string());
        }
        if credentials.is_none() {
            let either = format!("{} or {}", CREDENTIALS_JSON_VAR, CREDENTIALS_FILE_VAR);
            missing.push(either);
        }

        match (serper_api_key, spreadsheet_id, credentials) {
            (Some(serper_api_key), Some(spreadsheet_id), Some(credentials)) => Ok(Self {
                serper_api_key,
                spreadsheet_id,
                credentials,
            }),
            _ => bail!("Missing required configuration: {}", missing.join(", ")),
        }
    }
}

/// Pick the credential source: an inline JSON blob wins over a key file.
fn select_credentials(
    inline: Option<String>,
    file: Option<PathBuf>,
    base_dir: &Path,
) -> Option<Box<dyn CredentialProvider>> {
    if let Some(json) = inline {
        return Some(Box::new(InlineCredentials::new(json)));
    }
    if let Some(path) = file {
        return Some(Box::new(FileCredentials::new(path)));
    }
    let fallback = base_dir.join(DEFAULT_CREDENTIALS_FILE);
    if fallback.exists() {
        return Some(Box::new(FileCredentials::new(fallback)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
sites = ["lever.co", "greenhouse.io"]

[[categories]]
tab = "EM"
query = '"Engineering Manager" (Remote)'
"#;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.sites.len(), 2);
        assert_eq!(config.search.page_size, 10);
        assert_eq!(config.search.max_pages, 3);
        assert_eq!(config.search.stop_threshold(), 5);
        assert_eq!(config.search.locale, "us");
        assert_eq!(config.search.recency, Recency::DaysAgo(14));
        assert_eq!(config.store.key_column, 4);
        assert!(config.category("EM").is_some());
        assert!(config.category("PM").is_none());
    }

    #[test]
    fn test_fixed_recency_date() {
        let content = format!("{}\n[search]\nrecency = \"2026-01-01\"\n", MINIMAL);
        let config = Config::from_toml(&content).unwrap();
        assert_eq!(
            config.search.recency,
            Recency::Date(chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_rejects_empty_sites() {
        let content = MINIMAL.replace(r#"["lever.co", "greenhouse.io"]"#, "[]");
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("sites"));
    }

    #[test]
    fn test_rejects_duplicate_tabs() {
        let content = format!("{}\n[[categories]]\ntab = \"EM\"\nquery = \"x\"\n", MINIMAL);
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_key_column_out_of_range() {
        let content = format!("{}\n[store]\nkey_column = 6\n", MINIMAL);
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("key_column"));
    }

    #[test]
    fn test_stop_threshold_follows_page_size() {
        let content = format!("{}\n[search]\npage_size = 2\n", MINIMAL);
        let config = Config::from_toml(&content).unwrap();
        assert_eq!(config.search.stop_threshold(), 1);

        let content = format!("{}\n[search]\npage_size = 20\n", MINIMAL);
        let config = Config::from_toml(&content).unwrap();
        assert_eq!(config.search.stop_threshold(), 10);
    }

    #[test]
    fn test_explicit_stop_threshold_is_kept() {
        let extra = "[search]\npage_size = 10\nearly_stop_threshold = 3\n";
        let config = Config::from_toml(&format!("{}\n{}", MINIMAL, extra)).unwrap();
        assert_eq!(config.search.stop_threshold(), 3);
    }

    #[test]
    fn test_rejects_stop_threshold_above_page_size() {
        let extra = "[search]\npage_size = 2\nearly_stop_threshold = 5\n";
        let err = Config::from_toml(&format!("{}\n{}", MINIMAL, extra)).unwrap_err();
        assert!(err.to_string().contains("early_stop_threshold"));
    }

    #[test]
    fn test_rejects_oversized_page() {
        let content = format!("{}\n[search]\npage_size = 500\n", MINIMAL);
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_rejects_bad_recency() {
        let content = format!("{}\n[search]\nrecency = \"soon\"\n", MINIMAL);
        assert!(Config::from_toml(&content).is_err());
    }

    #[test]
    fn test_secrets_report_every_missing_variable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Secrets::from_lookup(lookup_from(&[]), tmp.path())
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains(SERPER_API_KEY_VAR));
        assert!(err.contains(SPREADSHEET_ID_VAR));
        assert!(err.contains(CREDENTIALS_JSON_VAR));
    }

    #[test]
    fn test_secrets_blank_values_count_as_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lookup = lookup_from(&[
            (SERPER_API_KEY_VAR, "  "),
            (SPREADSHEET_ID_VAR, "sheet"),
            (CREDENTIALS_JSON_VAR, "{}"),
        ]);
        let err = Secrets::from_lookup(lookup, tmp.path()).err().unwrap();
        assert!(err.to_string().contains(SERPER_API_KEY_VAR));
    }

    #[test]
    fn test_secrets_inline_credentials_win() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lookup = lookup_from(&[
            (SERPER_API_KEY_VAR, "key"),
            (SPREADSHEET_ID_VAR, "sheet"),
            (CREDENTIALS_JSON_VAR, "{}"),
            (CREDENTIALS_FILE_VAR, "/nonexistent.json"),
        ]);
        let secrets = Secrets::from_lookup(lookup, tmp.path()).unwrap();
        assert_eq!(
            secrets.credentials.describe(),
            "inline JSON (GOOGLE_CREDENTIALS_JSON)"
        );
    }

    #[test]
    fn test_secrets_fall_back_to_default_key_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(DEFAULT_CREDENTIALS_FILE), "{}").unwrap();
        let lookup = lookup_from(&[
            (SERPER_API_KEY_VAR, "key"),
            (SPREADSHEET_ID_VAR, "sheet"),
        ]);
        let secrets = Secrets::from_lookup(lookup, tmp.path()).unwrap();
        let source = secrets.credentials.describe();
        assert!(source.contains(DEFAULT_CREDENTIALS_FILE));
    }
}
