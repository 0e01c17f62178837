//! Per-key totals over a cleaned dataset.

use crate::cleaner::AmountNormalizer;
use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt};
use crate::utils::{float_column_sum, require_column};
use polars::prelude::*;
use tracing::{debug, info};

/// Groups a dataset by its key column and sums the amount column.
///
/// The output has exactly two columns, the key and the total, with one row
/// per distinct key sorted ascending by key.
#[derive(Debug, Clone)]
pub struct Aggregator {
    key_column: String,
    amount_column: String,
    total_column: String,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl Aggregator {
    pub fn new(
        key_column: impl Into<String>,
        amount_column: impl Into<String>,
        total_column: impl Into<String>,
    ) -> Self {
        Self {
            key_column: key_column.into(),
            amount_column: amount_column.into(),
            total_column: total_column.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.key_column.clone(),
            config.amount_column.clone(),
            config.total_column.clone(),
        )
    }

    /// Compute the total of the amount column for each distinct key.
    ///
    /// A dataset read back from disk carries its amounts as text; they are
    /// coerced with [`AmountNormalizer`] first.
    ///
    /// # Errors
    ///
    /// - [`EtlError::Schema`](crate::error::EtlError::Schema) if the key or
    ///   amount column is absent
    /// - [`EtlError::AmountParse`](crate::error::EtlError::AmountParse) if an
    ///   amount cannot be coerced
    pub fn aggregate(&self, df: &DataFrame) -> Result<DataFrame> {
        require_column(df, &self.key_column)?;
        let amounts = require_column(df, &self.amount_column)?;

        let prepared = if amounts.dtype() == &DataType::Float64 && amounts.null_count() == 0 {
            df.clone()
        } else {
            debug!(
                "Coercing '{}' ({}) before aggregation",
                self.amount_column,
                amounts.dtype()
            );
            AmountNormalizer.normalize(df, &self.amount_column)?
        };

        let aggregated = prepared
            .lazy()
            .group_by([col(self.key_column.as_str())])
            .agg([col(self.amount_column.as_str())
                .sum()
                .alias(self.total_column.as_str())])
            .sort_by_exprs(
                [col(self.key_column.as_str())],
                SortMultipleOptions::default(),
            )
            .collect()
            .context(format!(
                "Summing '{}' by '{}'",
                self.amount_column, self.key_column
            ))?;

        info!(
            "Aggregated {} rows into {} groups by '{}'",
            df.height(),
            aggregated.height(),
            self.key_column
        );
        Ok(aggregated)
    }

    /// Sum of the totals column of an aggregate.
    pub fn grand_total(&self, aggregated: &DataFrame) -> Result<f64> {
        float_column_sum(aggregated, &self.total_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use pretty_assertions::assert_eq;

    fn cleaned() -> DataFrame {
        df![
            "transaction_id" => ["1001", "1003", "1004", "1005", "1006", "1007", "1008", "1009"],
            "customer_id" => ["ABC123", "ABC123", "DEF567", "LMN456", "XYZ789", "ABC123", "ABC123", "XYZ789"],
            "transaction_amount" => ["45.67", "20", "75.25", "50", "55.5", "20", "15.5", "20"],
        ]
        .unwrap()
    }

    fn totals(df: &DataFrame) -> Vec<(String, f64)> {
        let keys = df.column("customer_id").unwrap().as_materialized_series();
        let sums = df
            .column("total_transaction_amount")
            .unwrap()
            .as_materialized_series();
        keys.str()
            .unwrap()
            .into_iter()
            .zip(sums.f64().unwrap().into_iter())
            .map(|(k, v)| (k.unwrap().to_string(), v.unwrap()))
            .collect()
    }

    #[test]
    fn test_aggregate_sums_per_key_sorted() {
        let aggregated = Aggregator::default().aggregate(&cleaned()).unwrap();

        assert_eq!(aggregated.width(), 2);
        let totals = totals(&aggregated);
        let keys: Vec<&str> = totals.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["ABC123", "DEF567", "LMN456", "XYZ789"]);

        let expected = [101.17, 75.25, 50.0, 75.5];
        for ((_, got), want) in totals.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn test_grand_total_matches_input_sum() {
        let aggregator = Aggregator::default();
        let aggregated = aggregator.aggregate(&cleaned()).unwrap();
        let grand_total = aggregator.grand_total(&aggregated).unwrap();
        assert!((grand_total - 301.92).abs() < 1e-9);
    }

    #[test]
    fn test_float_amounts_are_used_directly() {
        let df = df![
            "account" => ["b", "a", "b"],
            "amount" => [1.0, 2.0, 3.0],
        ]
        .unwrap();
        let aggregated = Aggregator::new("account", "amount", "total")
            .aggregate(&df)
            .unwrap();

        let expected = df![
            "account" => ["a", "b"],
            "total" => [2.0, 4.0],
        ]
        .unwrap();
        assert!(aggregated.equals(&expected));
    }

    #[test]
    fn test_missing_key_column_is_schema_error() {
        let df = df!["transaction_amount" => ["1.0"]].unwrap();
        let err = Aggregator::default().aggregate(&df).unwrap_err();
        match err {
            EtlError::Schema { column, .. } => assert_eq!(column, "customer_id"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_amount_fails() {
        let df = df![
            "customer_id" => ["ABC123"],
            "transaction_amount" => ["abc"],
        ]
        .unwrap();
        let err = Aggregator::default().aggregate(&df).unwrap_err();
        assert_eq!(err.error_code(), "AMOUNT_PARSE_ERROR");
    }

    #[test]
    fn test_empty_dataset_gives_empty_aggregate() {
        let df = df![
            "customer_id" => Vec::<&str>::new(),
            "transaction_amount" => Vec::<f64>::new(),
        ]
        .unwrap();
        let aggregated = Aggregator::default().aggregate(&df).unwrap();
        assert_eq!(aggregated.height(), 0);
        assert_eq!(aggregated.width(), 2);
    }
}
