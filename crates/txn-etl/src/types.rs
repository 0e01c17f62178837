//! Cell-level view of a dataset.
//!
//! A dataset is a polars [`DataFrame`]. Within one column a cell can be text,
//! a number or missing depending on how far through the pipeline the data
//! is, so stage logic that looks at individual cells does so through
//! [`CellValue`].

use crate::error::MISSING_MARKER;
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use std::fmt;

/// A single cell: text, number, or missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    Text(&'a str),
    Number(f64),
    Missing,
}

impl<'a> CellValue<'a> {
    /// Convert a polars value into a cell.
    ///
    /// Integer and float values become `Number`. Any other non-null value
    /// (dates, booleans, owned strings) has no borrowed text form and is
    /// reported as `None` so the caller can fall back to a string cast.
    pub fn from_any_value(value: &AnyValue<'a>) -> Option<Self> {
        let cell = match value {
            AnyValue::Null => CellValue::Missing,
            AnyValue::String(s) => CellValue::Text(*s),
            AnyValue::Float64(v) => CellValue::Number(*v),
            AnyValue::Float32(v) => CellValue::Number(f64::from(*v)),
            AnyValue::Int64(v) => CellValue::Number(*v as f64),
            AnyValue::Int32(v) => CellValue::Number(f64::from(*v)),
            AnyValue::Int16(v) => CellValue::Number(f64::from(*v)),
            AnyValue::Int8(v) => CellValue::Number(f64::from(*v)),
            AnyValue::UInt64(v) => CellValue::Number(*v as f64),
            AnyValue::UInt32(v) => CellValue::Number(f64::from(*v)),
            AnyValue::UInt16(v) => CellValue::Number(f64::from(*v)),
            AnyValue::UInt8(v) => CellValue::Number(f64::from(*v)),
            _ => return None,
        };
        Some(cell)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Parse the cell as a 64-bit float.
    ///
    /// Text is trimmed first. Missing cells never parse.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Missing => None,
        }
    }

    /// Canonical form used as one fragment of a deduplication key:
    /// trimmed and lowercased. `None` for missing cells.
    pub fn key_fragment(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.trim().to_lowercase()),
            CellValue::Number(v) => Some(v.to_string()),
            CellValue::Missing => None,
        }
    }
}

impl fmt::Display for CellValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(v) => write!(f, "{}", v),
            CellValue::Missing => write!(f, "{}", MISSING_MARKER),
        }
    }
}

/// Collect the cells of a column.
///
/// Columns whose dtype has no direct cell form (booleans, dates) are cast to
/// `String` first, which is how they would appear in the delimited file.
pub fn column_cells(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let text = series.cast(&DataType::String)?;
    let chunked = text.str()?;
    Ok(chunked
        .into_iter()
        .map(|opt| opt.map(|s| s.to_string()))
        .collect())
}

/// Apply `f` to each cell of a column, in row order, stopping at the first
/// error `f` returns.
pub fn for_each_cell<F, E>(series: &Series, mut f: F) -> Result<(), E>
where
    F: FnMut(usize, CellValue<'_>) -> Result<(), E>,
    E: From<PolarsError>,
{
    if series.dtype() == &DataType::String || is_numeric_dtype(series.dtype()) {
        for idx in 0..series.len() {
            let value = series.get(idx)?;
            if let Some(cell) = CellValue::from_any_value(&value) {
                f(idx, cell)?;
                continue;
            }
            return Err(PolarsError::ComputeError(
                format!("unexpected value {} in column '{}'", value, series.name()).into(),
            )
            .into());
        }
        return Ok(());
    }

    for (idx, opt) in column_cells(series)?.iter().enumerate() {
        let cell = match opt {
            Some(s) => CellValue::Text(s.as_str()),
            None => CellValue::Missing,
        };
        f(idx, cell)?;
    }
    Ok(())
}
