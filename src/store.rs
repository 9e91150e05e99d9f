//! Tabular store abstraction with link-keyed dedup.
//!
//! A store holds one partition (sheet tab) per role category; each row is the
//! fixed six-column layout of [`JobRecord::to_row`]. Partitions are
//! append-only: rows are never updated or removed, and a link appears at
//! most once per partition.
//!
//! # Operations
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`TabularStore::read_column`] | Bulk-read one column of a partition |
//! | [`TabularStore::append_rows`] | Bulk-append rows after the last used row |
//! | [`select_new_records`] | Filter candidates against known keys |
//! | [`preview_new_records`] | Read keys and filter, without writing |
//! | [`append_new_records`] | Read keys, filter, append survivors |

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::models::JobRecord;

/// Backend holding named, append-only partitions of rows.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Read every value of the zero-based `column` in `partition`, top to
    /// bottom. A missing or empty partition yields an empty list.
    async fn read_column(&self, partition: &str, column: usize) -> Result<Vec<String>>;

    /// Append `rows` after the last used row of `partition`.
    async fn append_rows(&self, partition: &str, rows: &[Vec<String>]) -> Result<()>;
}

/// Result of a dedup-and-append pass over one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReport {
    pub candidates: usize,
    pub appended: usize,
}

/// Keep records whose key is neither in `existing` nor seen earlier in
/// `records`. Keys are compared after trimming whitespace; records with a
/// blank key are dropped. Relative order is preserved.
pub fn select_new_records<I>(
    existing: I,
    records: Vec<JobRecord>,
    key_column: usize,
) -> Vec<JobRecord>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashSet<String> = existing
        .into_iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();

    records
        .into_iter()
        .filter(|record| {
            let key = record.column(key_column).unwrap_or_default().trim();
            !key.is_empty() && seen.insert(key.to_string())
        })
        .collect()
}

/// Read the partition's keys and return the records that would be appended.
///
/// A failed read is logged and treated as an empty partition.
pub async fn preview_new_records(
    store: &dyn TabularStore,
    partition: &str,
    records: Vec<JobRecord>,
    key_column: usize,
) -> Vec<JobRecord> {
    let existing = match store.read_column(partition, key_column).await {
        Ok(keys) => keys,
        Err(e) => {
            tracing::warn!(
                partition,
                error = %e,
                "could not read existing links, treating partition as empty"
            );
            Vec::new()
        }
    };
    tracing::debug!(partition, existing = existing.len(), "read existing links");
    select_new_records(existing, records, key_column)
}

/// Append the records of `records` whose key is not yet in `partition`.
///
/// Performs at most one read and one append. Nothing is written when every
/// candidate is a duplicate. Write failures are returned to the caller.
pub async fn append_new_records(
    store: &dyn TabularStore,
    partition: &str,
    records: Vec<JobRecord>,
    key_column: usize,
) -> Result<AppendReport> {
    let candidates = records.len();
    let fresh = preview_new_records(store, partition, records, key_column).await;

    if !fresh.is_empty() {
        let rows: Vec<Vec<String>> = fresh.iter().map(JobRecord::to_row).collect();
        store.append_rows(partition, &rows).await?;
    }

    Ok(AppendReport {
        candidates,
        appended: fresh.len(),
    })
}

/// Spreadsheet column letter for a zero-based index (`0` → `A`, `26` → `AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

// ============ In-memory store ============

/// In-memory [`TabularStore`].
///
/// Useful for running the pipeline without a spreadsheet, e.g. when
/// embedding the harvester or in tests.
#[derive(Default)]
pub struct InMemoryStore {
    partitions: RwLock<HashMap<String, Vec<Vec<String>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `partition` with existing rows.
    pub fn with_rows(self, partition: &str, rows: Vec<Vec<String>>) -> Self {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.insert(partition.to_string(), rows);
        }
        self
    }

    /// Snapshot of the rows stored in `partition`.
    pub fn rows(&self, partition: &str) -> Vec<Vec<String>> {
        self.partitions
            .read()
            .ok()
            .and_then(|p| p.get(partition).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TabularStore for InMemoryStore {
    async fn read_column(&self, partition: &str, column: usize) -> Result<Vec<String>> {
        Ok(self
            .rows(partition)
            .into_iter()
            .map(|row| row.get(column).cloned().unwrap_or_default())
            .collect())
    }

    async fn append_rows(&self, partition: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        partitions
            .entry(partition.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: usize = 4;

    /// Wraps an [`InMemoryStore`], counting appends and failing on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        fail_reads: bool,
        fail_writes: bool,
        appends: AtomicUsize,
    }

    #[async_trait]
    impl TabularStore for FlakyStore {
        async fn read_column(&self, partition: &str, column: usize) -> Result<Vec<String>> {
            if self.fail_reads {
                bail!("read of partition '{}' failed", partition);
            }
            self.inner.read_column(partition, column).await
        }

        async fn append_rows(&self, partition: &str, rows: &[Vec<String>]) -> Result<()> {
            if self.fail_writes {
                bail!("write to partition '{}' failed", partition);
            }
            self.appends.fetch_add(1, Ordering::SeqCst);
            self.inner.append_rows(partition, rows).await
        }
    }

    fn record(link: &str) -> JobRecord {
        JobRecord {
            timestamp: "2026-10-19".into(),
            company: "A".into(),
            platform: "lever".into(),
            title: "Engineering Manager".into(),
            link: link.into(),
            snippet: String::new(),
        }
    }

    fn links(records: &[JobRecord]) -> Vec<&str> {
        records.iter().map(|r| r.link.as_str()).collect()
    }

    fn seeded(link: &str) -> InMemoryStore {
        let rows = vec![record(link).to_row()];
        InMemoryStore::new().with_rows("EM", rows)
    }

    #[test]
    fn test_select_skips_existing_links() {
        let fresh = select_new_records(
            vec!["https://a.com/1".to_string()],
            vec![record("https://a.com/1"), record("https://a.com/2")],
            KEY,
        );
        assert_eq!(links(&fresh), vec!["https://a.com/2"]);
    }

    #[test]
    fn test_select_trims_both_sides() {
        let fresh = select_new_records(
            vec!["  https://a.com/1\n".to_string()],
            vec![record("https://a.com/1 "), record(" https://a.com/3")],
            KEY,
        );
        assert_eq!(links(&fresh), vec![" https://a.com/3"]);
    }

    #[test]
    fn test_select_collapses_duplicates_within_batch() {
        let fresh = select_new_records(
            Vec::<String>::new(),
            vec![
                record("https://a.com/1"),
                record("https://a.com/2"),
                record("https://a.com/1"),
            ],
            KEY,
        );
        assert_eq!(links(&fresh), vec!["https://a.com/1", "https://a.com/2"]);
    }

    #[test]
    fn test_select_drops_blank_links() {
        let fresh = select_new_records(
            vec!["".to_string()],
            vec![record(""), record("   "), record("https://a.com/9")],
            KEY,
        );
        assert_eq!(links(&fresh), vec!["https://a.com/9"]);
    }

    #[test]
    fn test_select_uses_configured_key_column() {
        // Legacy five-column layout kept the link in column D.
        let fresh = select_new_records(
            vec!["Engineering Manager".to_string()],
            vec![record("https://a.com/1")],
            3,
        );
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(4), "E");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }

    #[tokio::test]
    async fn test_append_writes_only_new_rows() {
        let store = seeded("https://a.com/1");
        let records = vec![record("https://a.com/1"), record("https://a.com/2")];

        let report = append_new_records(&store, "EM", records, KEY)
            .await
            .unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.appended, 1);
        let rows = store.rows("EM");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][KEY], "https://a.com/2");
    }

    #[tokio::test]
    async fn test_append_nothing_new_skips_write() {
        let store = FlakyStore {
            inner: seeded("https://a.com/1"),
            ..FlakyStore::default()
        };
        let records = vec![record("https://a.com/1")];

        let report = append_new_records(&store, "EM", records, KEY)
            .await
            .unwrap();

        assert_eq!(report.appended, 0);
        assert_eq!(store.appends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_append_to_missing_partition() {
        let store = InMemoryStore::new();
        let records = vec![record("https://a.com/1")];

        let report = append_new_records(&store, "PM", records, KEY)
            .await
            .unwrap();

        assert_eq!(report.appended, 1);
        assert_eq!(store.rows("PM").len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_counts_as_empty() {
        let store = FlakyStore {
            inner: seeded("https://a.com/1"),
            fail_reads: true,
            ..FlakyStore::default()
        };
        let records = vec![record("https://a.com/1")];

        let report = append_new_records(&store, "EM", records, KEY)
            .await
            .unwrap();

        assert_eq!(report.appended, 1);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let store = FlakyStore {
            fail_writes: true,
            ..FlakyStore::default()
        };
        let records = vec![record("https://a.com/1")];

        let result = append_new_records(&store, "EM", records, KEY).await;

        assert!(result.is_err());
        assert!(store.inner.rows("EM").is_empty());
    }

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let store = FlakyStore::default();
        let records = vec![record("https://a.com/1")];

        let fresh = preview_new_records(&store, "EM", records, KEY).await;

        assert_eq!(fresh.len(), 1);
        assert_eq!(store.appends.load(Ordering::SeqCst), 0);
    }
}
