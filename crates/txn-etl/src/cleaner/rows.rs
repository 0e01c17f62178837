//! Drops rows that are missing any value.

use crate::error::Result;
use crate::utils::missing_cell_count;
use polars::prelude::*;
use tracing::{debug, info};

/// Removes every row with at least one missing cell.
///
/// Cell content is otherwise untouched: a field holding only whitespace is
/// a present value.
pub struct RowCleaner;

impl RowCleaner {
    /// Drop incomplete rows, preserving the order of the rest.
    ///
    /// Returns the filtered dataset and the number of rows removed.
    pub fn remove_incomplete_rows(&self, df: DataFrame) -> Result<(DataFrame, usize)> {
        let before = df.height();

        if missing_cell_count(&df) == 0 {
            info!("Removed 0 rows with missing values.");
            return Ok((df, 0));
        }

        let mut keep = vec![true; before];
        for column in df.get_columns() {
            if column.null_count() == 0 {
                continue;
            }
            debug!(
                "Column '{}' has {} missing cells",
                column.name(),
                column.null_count()
            );
            let nulls = column.is_null();
            for (idx, is_null) in (&nulls).into_iter().enumerate() {
                if is_null == Some(true) {
                    keep[idx] = false;
                }
            }
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let df = df.filter(&mask)?;
        let removed = before - df.height();

        info!("Removed {} rows with missing values.", removed);
        Ok((df, removed))
    }
}
