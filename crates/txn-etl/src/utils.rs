//! Shared helpers for working with polars frames.

use crate::error::{EtlError, Result};
use polars::prelude::*;

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Column names of a frame, in schema order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Look up a column, turning a miss into a schema error that lists the
/// columns that are present.
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    match df.column(name) {
        Ok(column) => Ok(column.as_materialized_series()),
        Err(_) => Err(EtlError::missing_column(name, column_names(df))),
    }
}

/// Sum of a `Float64` column, ignoring nulls.
pub fn float_column_sum(df: &DataFrame, name: &str) -> Result<f64> {
    let series = require_column(df, name)?;
    Ok(series.f64()?.into_iter().flatten().sum())
}

/// Total number of missing cells across all columns.
pub fn missing_cell_count(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|col| col.null_count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df![
            "customer_id" => ["ABC123", "XYZ789"],
            "transaction_amount" => [Some(1.5), None],
        ]
        .unwrap()
    }

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_column_names_in_order() {
        assert_eq!(
            column_names(&sample()),
            vec!["customer_id".to_string(), "transaction_amount".to_string()]
        );
    }

    #[test]
    fn test_require_column_reports_available() {
        let df = sample();
        assert!(require_column(&df, "customer_id").is_ok());

        match require_column(&df, "date").unwrap_err() {
            EtlError::Schema { column, available } => {
                assert_eq!(column, "date");
                assert_eq!(available.len(), 2);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_float_column_sum_and_missing_count() {
        let df = sample();
        assert_eq!(float_column_sum(&df, "transaction_amount").unwrap(), 1.5);
        assert_eq!(missing_cell_count(&df), 1);
    }
}
