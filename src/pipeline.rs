//! Harvest pipeline orchestration.
//!
//! For each role category: build one query per site, fetch its result
//! pages, normalize hits into records, then flush the category's batch
//! through [`append_new_records`]. Categories run one after another and are
//! isolated from each other: a failed flush is logged, recorded in the
//! [`RunSummary`], and the next category still runs.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::{CategoryConfig, Config};
use crate::models::JobRecord;
use crate::normalize::normalize_hit;
use crate::query::SearchQuery;
use crate::search::{fetch_all_pages, Pagination, SearchProvider};
use crate::store::{append_new_records, preview_new_records, TabularStore};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d";

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only process the category with this tab name.
    pub category: Option<String>,
    /// Compute new records without writing them.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOutcome {
    /// Records written to the store.
    Appended(usize),
    /// Records that would have been written (dry run).
    Previewed(usize),
    /// The flush failed.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CategorySummary {
    pub tab: String,
    /// Hits normalized across all sites, before dedup.
    pub fetched: usize,
    pub outcome: CategoryOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub categories: Vec<CategorySummary>,
}

impl RunSummary {
    pub fn total_appended(&self) -> usize {
        self.categories
            .iter()
            .map(|c| match c.outcome {
                CategoryOutcome::Appended(n) => n,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_categories(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|c| matches!(c.outcome, CategoryOutcome::Failed(_)))
            .map(|c| c.tab.as_str())
            .collect()
    }
}

/// Runs the search → normalize → dedup → append pipeline.
pub struct Harvester {
    config: Config,
    provider: Arc<dyn SearchProvider>,
    store: Arc<dyn TabularStore>,
}

impl Harvester {
    pub fn new(
        config: Config,
        provider: Arc<dyn SearchProvider>,
        store: Arc<dyn TabularStore>,
    ) -> Self {
        Self {
            config,
            provider,
            store,
        }
    }

    /// Every (tab, query) pair a run on `today` would issue, in run order.
    pub fn planned_queries(&self, today: NaiveDate) -> Vec<(String, SearchQuery)> {
        planned_queries(&self.config, today)
    }

    /// Run every configured category (or the one named in `options`).
    ///
    /// The recency cutoff and record timestamp are derived from `today`
    /// once, so every query and record of the run shares them. Returns an
    /// error only for an unknown category filter; per-category failures
    /// are reported in the summary.
    pub async fn run(&self, today: NaiveDate, options: &RunOptions) -> Result<RunSummary> {
        let categories: Vec<&CategoryConfig> = match &options.category {
            Some(tab) => match self.config.category(tab) {
                Some(category) => vec![category],
                None => bail!("Unknown category: '{}'", tab),
            },
            None => self.config.categories.iter().collect(),
        };

        let cutoff = self.config.search.recency.resolve(today);
        let timestamp = today.format(TIMESTAMP_FORMAT).to_string();
        tracing::info!(
            categories = categories.len(),
            sites = self.config.sites.len(),
            %cutoff,
            dry_run = options.dry_run,
            "starting harvest"
        );

        let mut summary = RunSummary {
            categories: Vec::with_capacity(categories.len()),
        };
        for category in categories {
            let result = self
                .run_category(category, cutoff, &timestamp, options.dry_run)
                .await;
            print_category_notice(&result);
            summary.categories.push(result);
        }

        Ok(summary)
    }

    /// Collect and flush one category. Never fails; flush errors end up in
    /// the returned outcome.
    pub async fn run_category(
        &self,
        category: &CategoryConfig,
        cutoff: NaiveDate,
        timestamp: &str,
        dry_run: bool,
    ) -> CategorySummary {
        tracing::info!(tab = %category.tab, "scanning category");
        let records = self.collect(category, cutoff, timestamp).await;
        let fetched = records.len();
        let key_column = self.config.store.key_column;

        let outcome = if dry_run {
            let fresh =
                preview_new_records(self.store.as_ref(), &category.tab, records, key_column).await;
            CategoryOutcome::Previewed(fresh.len())
        } else {
            let result =
                append_new_records(self.store.as_ref(), &category.tab, records, key_column).await;
            match result {
                Ok(report) => CategoryOutcome::Appended(report.appended),
                Err(e) => {
                    tracing::error!(tab = %category.tab, error = %e, "failed to append records");
                    CategoryOutcome::Failed(format!("{:#}", e))
                }
            }
        };

        CategorySummary {
            tab: category.tab.clone(),
            fetched,
            outcome,
        }
    }

    /// Search every site for `category` and normalize the hits, in site order.
    async fn collect(
        &self,
        category: &CategoryConfig,
        cutoff: NaiveDate,
        timestamp: &str,
    ) -> Vec<JobRecord> {
        let pagination = Pagination::from(&self.config.search);
        let mut records = Vec::new();

        for site in &self.config.sites {
            let query = SearchQuery::new(site, &category.query, cutoff);
            let results =
                fetch_all_pages(self.provider.as_ref(), &query.render(), &pagination).await;
            tracing::info!(
                tab = %category.tab,
                site = %site,
                hits = results.hits.len(),
                pages = results.pages_fetched,
                truncated = results.is_truncated(),
                "checked site"
            );
            let batch = results.hits.into_iter();
            records.extend(batch.map(|hit| normalize_hit(hit, site, timestamp)));
        }

        records
    }
}

/// Every (tab, query) pair a run of `config` on `today` would issue.
pub fn planned_queries(config: &Config, today: NaiveDate) -> Vec<(String, SearchQuery)> {
    let cutoff = config.search.recency.resolve(today);
    let mut queries = Vec::with_capacity(config.categories.len() * config.sites.len());
    for category in &config.categories {
        for site in &config.sites {
            let query = SearchQuery::new(site, &category.query, cutoff);
            queries.push((category.tab.clone(), query));
        }
    }
    queries
}

fn print_category_notice(summary: &CategorySummary) {
    match &summary.outcome {
        CategoryOutcome::Appended(0) | CategoryOutcome::Previewed(0) => {
            println!("No new jobs for {}.", summary.tab)
        }
        CategoryOutcome::Appended(n) => println!("Added {} jobs to {}.", n, summary.tab),
        CategoryOutcome::Previewed(n) => {
            println!("{} new jobs for {} (dry run).", n, summary.tab)
        }
        CategoryOutcome::Failed(e) => println!("Failed to update {}: {}", summary.tab, e),
    }
}
