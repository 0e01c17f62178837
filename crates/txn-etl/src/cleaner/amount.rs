//! Coerces the amount column to 64-bit floats.

use crate::error::{EtlError, MISSING_MARKER, Result};
use crate::types::for_each_cell;
use crate::utils::require_column;
use polars::prelude::*;
use tracing::{debug, info};

/// Replaces a text or integer column with its `Float64` parse.
///
/// The conversion is all-or-nothing: the first value that does not parse
/// aborts it, and the caller's dataset is left untouched.
pub struct AmountNormalizer;

impl AmountNormalizer {
    /// Return a copy of `df` with `column` converted to `Float64`.
    ///
    /// Values are trimmed before parsing, so `" 12.5 "` becomes `12.5`.
    ///
    /// # Errors
    ///
    /// - [`EtlError::Schema`] if the column does not exist
    /// - [`EtlError::AmountParse`] naming the first offending row of `df` and
    ///   its value; a missing cell is reported with the value `<missing>`
    pub fn normalize(&self, df: &DataFrame, column: &str) -> Result<DataFrame> {
        let series = require_column(df, column)?;

        if series.dtype() == &DataType::Float64 && series.null_count() == 0 {
            debug!("Column '{}' is already Float64", column);
            return Ok(df.clone());
        }

        let mut values: Vec<f64> = Vec::with_capacity(series.len());
        for_each_cell(series, |row, cell| match cell.to_f64() {
            Some(value) => {
                values.push(value);
                Ok(())
            }
            None => Err(EtlError::AmountParse {
                column: column.to_string(),
                row,
                value: if cell.is_missing() {
                    MISSING_MARKER.to_string()
                } else {
                    cell.to_string()
                },
            }),
        })?;

        let mut normalized = df.clone();
        normalized.replace(column, Series::new(column.into(), values))?;

        info!("Converted {} values to float.", column);
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn amounts(df: &DataFrame) -> Vec<Option<f64>> {
        df.column("transaction_amount")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_text_amounts_become_floats() {
        let df = df![
            "customer_id" => ["ABC123", "XYZ789", "LMN456"],
            "transaction_amount" => ["45.67", "20", " 15.5 "],
        ]
        .unwrap();

        let normalized = AmountNormalizer.normalize(&df, "transaction_amount").unwrap();
        assert_eq!(
            normalized.column("transaction_amount").unwrap().dtype(),
            &DataType::Float64
        );
        assert_eq!(amounts(&normalized), vec![Some(45.67), Some(20.0), Some(15.5)]);
        assert_eq!(normalized.column("customer_id").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_integer_amounts_become_floats() {
        let df = df!["transaction_amount" => [10i64, 20, 30]].unwrap();
        let normalized = AmountNormalizer.normalize(&df, "transaction_amount").unwrap();
        assert_eq!(amounts(&normalized), vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn test_unparseable_value_fails_and_leaves_input_untouched() {
        let df = df![
            "customer_id" => ["ABC123", "XYZ789"],
            "transaction_amount" => ["45.67", "abc"],
        ]
        .unwrap();
        let before = df.clone();

        let err = AmountNormalizer
            .normalize(&df, "transaction_amount")
            .unwrap_err();
        match err {
            EtlError::AmountParse { column, row, value } => {
                assert_eq!(column, "transaction_amount");
                assert_eq!(row, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("expected amount parse error, got {other:?}"),
        }
        assert!(df.equals(&before));
    }

    #[test]
    fn test_missing_amount_is_parse_error() {
        let df = df!["transaction_amount" => [Some("1.0"), None]].unwrap();
        let err = AmountNormalizer
            .normalize(&df, "transaction_amount")
            .unwrap_err();
        assert!(err.to_string().contains("'<missing>'"));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = df!["customer_id" => ["ABC123"]].unwrap();
        let err = AmountNormalizer
            .normalize(&df, "transaction_amount")
            .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_float_column_is_returned_as_is() {
        let df = df!["transaction_amount" => [1.5, 2.5]].unwrap();
        let normalized = AmountNormalizer.normalize(&df, "transaction_amount").unwrap();
        assert!(normalized.equals(&df));
    }
}
