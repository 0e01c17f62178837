//! Content-hash deduplication.
//!
//! Every row gets a key: the SHA-256 hex digest of its selected cells,
//! each trimmed and lowercased, joined with `_`. Missing cells contribute
//! nothing to the key. Rows whose key repeats an earlier row's key are
//! duplicates; the first occurrence wins.

use crate::config::{DEDUP_KEY_COLUMN, DedupColumns, DuplicatePolicy, SOURCE_ROW_COLUMN};
use crate::error::{EtlError, Result};
use crate::types::{CellValue, for_each_cell};
use crate::utils::{column_names, require_column};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const KEY_SEPARATOR: &str = "_";

/// Canonical text of a row, before hashing.
pub fn canonical_key_text(cells: &[CellValue<'_>]) -> String {
    cells
        .iter()
        .filter_map(CellValue::key_fragment)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Hex-encoded SHA-256 of the canonical text.
pub fn digest_key(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Result of a deduplication pass.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Dataset carrying the `unique_id` column
    pub data: DataFrame,
    /// Rows whose key repeated an earlier key
    pub duplicates_found: usize,
    /// Rows actually dropped; zero under [`DuplicatePolicy::ReportOnly`]
    pub duplicates_removed: usize,
}

pub struct Deduplicator;

impl Deduplicator {
    /// Resolve the columns that feed the key.
    ///
    /// With [`DedupColumns::All`] this is every column in schema order except
    /// `unique_id` itself, so running the stage twice yields identical keys.
    pub fn key_columns(&self, df: &DataFrame, columns: &DedupColumns) -> Result<Vec<String>> {
        match columns {
            DedupColumns::All => Ok(column_names(df)
                .into_iter()
                .filter(|name| name != DEDUP_KEY_COLUMN && name != SOURCE_ROW_COLUMN)
                .collect()),
            DedupColumns::Subset(names) => {
                for name in names {
                    require_column(df, name)?;
                }
                Ok(names.clone())
            }
        }
    }

    /// Add (or replace) the `unique_id` column.
    ///
    /// Row order and every other column are unchanged.
    pub fn generate_keys(&self, df: DataFrame, columns: &DedupColumns) -> Result<DataFrame> {
        let selected = self.key_columns(&df, columns)?;
        debug!("Deduplication key columns: {:?}", selected);

        let mut fragments: Vec<Vec<String>> = vec![Vec::with_capacity(selected.len()); df.height()];
        for name in &selected {
            let series = require_column(&df, name)?;
            for_each_cell(series, |idx, cell| {
                if let Some(fragment) = cell.key_fragment() {
                    fragments[idx].push(fragment);
                }
                Ok::<(), EtlError>(())
            })?;
        }

        let keys: Vec<String> = fragments
            .iter()
            .map(|parts| digest_key(&parts.join(KEY_SEPARATOR)))
            .collect();

        let mut df = df;
        df.with_column(Series::new(DEDUP_KEY_COLUMN.into(), keys))?;
        Ok(df)
    }

    /// Keep the first row of each `unique_id` value.
    ///
    /// Returns the filtered dataset and the number of rows removed. The
    /// dataset must already carry keys.
    pub fn remove_duplicates(&self, df: DataFrame) -> Result<(DataFrame, usize)> {
        let keep = first_occurrence_mask(&df)?;
        let before = df.height();

        if keep.iter().all(|k| *k) {
            info!("Removed 0 duplicate rows.");
            return Ok((df, 0));
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let df = df.filter(&mask)?;
        let removed = before - df.height();
        info!("Removed {} duplicate rows.", removed);
        Ok((df, removed))
    }

    /// Generate keys and apply the duplicate policy.
    pub fn deduplicate(
        &self,
        df: DataFrame,
        columns: &DedupColumns,
        policy: DuplicatePolicy,
    ) -> Result<DedupOutcome> {
        let keyed = self.generate_keys(df, columns)?;

        match policy {
            DuplicatePolicy::Remove => {
                let (data, removed) = self.remove_duplicates(keyed)?;
                Ok(DedupOutcome {
                    data,
                    duplicates_found: removed,
                    duplicates_removed: removed,
                })
            }
            DuplicatePolicy::ReportOnly => {
                let found = first_occurrence_mask(&keyed)?
                    .iter()
                    .filter(|keep| !**keep)
                    .count();
                if found > 0 {
                    warn!(
                        "Found {} duplicate rows; keeping them (duplicate policy is report-only)",
                        found
                    );
                }
                Ok(DedupOutcome {
                    data: keyed,
                    duplicates_found: found,
                    duplicates_removed: 0,
                })
            }
        }
    }
}

/// `true` for the first row carrying each key, `false` for later repeats.
fn first_occurrence_mask(df: &DataFrame) -> Result<Vec<bool>> {
    let keys = require_column(df, DEDUP_KEY_COLUMN)?.str()?;
    let mut seen: HashSet<&str> = HashSet::with_capacity(df.height());
    Ok(keys
        .into_iter()
        .map(|key| match key {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transactions() -> DataFrame {
        df![
            "transaction_id" => ["1001", "1002", "1003"],
            "customer_id" => ["ABC123", "abc123 ", "XYZ789"],
            "transaction_amount" => ["45.67", "45.67", "20"],
        ]
        .unwrap()
    }

    fn keys(df: &DataFrame) -> Vec<String> {
        df.column(DEDUP_KEY_COLUMN)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|k| k.unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_canonical_text_trims_lowercases_and_skips_missing() {
        let cells = [
            CellValue::Text(" ABC123 "),
            CellValue::Missing,
            CellValue::Text("45.67"),
        ];
        assert_eq!(canonical_key_text(&cells), "abc123_45.67");
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let key = digest_key("");
        assert_eq!(
            key,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(digest_key("abc123_45.67").len(), 64);
    }

    #[test]
    fn test_generate_keys_appends_column() {
        let df = Deduplicator
            .generate_keys(transactions(), &DedupColumns::All)
            .unwrap();

        assert_eq!(df.width(), 4);
        assert_eq!(column_names(&df).last().unwrap(), DEDUP_KEY_COLUMN);
        let keys = keys(&df);
        assert_eq!(
            keys[0],
            digest_key(&canonical_key_text(&[
                CellValue::Text("1001"),
                CellValue::Text("ABC123"),
                CellValue::Text("45.67"),
            ]))
        );
    }

    #[test]
    fn test_subset_keys_ignore_case_and_whitespace() {
        let subset = DedupColumns::subset(["customer_id", "transaction_amount"]);
        let df = Deduplicator.generate_keys(transactions(), &subset).unwrap();
        let keys = keys(&df);
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
    }

    #[test]
    fn test_all_columns_distinguish_by_transaction_id() {
        let outcome = Deduplicator
            .deduplicate(transactions(), &DedupColumns::All, DuplicatePolicy::Remove)
            .unwrap();
        assert_eq!(outcome.duplicates_found, 0);
        assert_eq!(outcome.data.height(), 3);
    }

    #[test]
    fn test_remove_keeps_first_occurrence() {
        let subset = DedupColumns::subset(["customer_id", "transaction_amount"]);
        let outcome = Deduplicator
            .deduplicate(transactions(), &subset, DuplicatePolicy::Remove)
            .unwrap();

        assert_eq!(outcome.duplicates_removed, 1);
        let ids: Vec<Option<&str>> = outcome
            .data
            .column("transaction_id")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, vec![Some("1001"), Some("1003")]);
    }

    #[test]
    fn test_report_only_counts_but_keeps_rows() {
        let subset = DedupColumns::subset(["customer_id", "transaction_amount"]);
        let outcome = Deduplicator
            .deduplicate(transactions(), &subset, DuplicatePolicy::ReportOnly)
            .unwrap();

        assert_eq!(outcome.duplicates_found, 1);
        assert_eq!(outcome.duplicates_removed, 0);
        assert_eq!(outcome.data.height(), 3);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let subset = DedupColumns::subset(["customer_id", "transaction_amount"]);
        let once = Deduplicator
            .deduplicate(transactions(), &subset, DuplicatePolicy::Remove)
            .unwrap()
            .data;
        let twice = Deduplicator
            .deduplicate(once.clone(), &subset, DuplicatePolicy::Remove)
            .unwrap();

        assert_eq!(twice.duplicates_removed, 0);
        assert!(twice.data.equals(&once));

        let all_once = Deduplicator
            .deduplicate(transactions(), &DedupColumns::All, DuplicatePolicy::Remove)
            .unwrap()
            .data;
        let all_twice = Deduplicator
            .deduplicate(all_once.clone(), &DedupColumns::All, DuplicatePolicy::Remove)
            .unwrap()
            .data;
        assert!(all_twice.equals(&all_once));
    }

    #[test]
    fn test_missing_cells_contribute_nothing() {
        let df = df![
            "a" => [Some("x"), Some("x")],
            "b" => [None, Some("")],
        ]
        .unwrap();
        let df = Deduplicator.generate_keys(df, &DedupColumns::All).unwrap();
        let keys = keys(&df);
        // "x" versus "x_": an empty string is a value, a missing cell is not
        assert_eq!(keys[0], digest_key("x"));
        assert_eq!(keys[1], digest_key("x_"));
    }

    #[test]
    fn test_unknown_subset_column_is_schema_error() {
        let subset = DedupColumns::subset(["customer_id", "date"]);
        let err = Deduplicator
            .generate_keys(transactions(), &subset)
            .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
        assert!(err.to_string().contains("'date'"));
    }

    #[test]
    fn test_numeric_columns_feed_the_key() {
        let df = df![
            "customer_id" => ["ABC123", "ABC123"],
            "transaction_amount" => [20.0, 20.0],
        ]
        .unwrap();
        let outcome = Deduplicator
            .deduplicate(df, &DedupColumns::All, DuplicatePolicy::Remove)
            .unwrap();
        assert_eq!(outcome.duplicates_removed, 1);
    }
}
