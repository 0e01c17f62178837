//! Reads a delimited file into a dataset.

use super::{FIELD_DELIMITER, QUOTE_CHAR};
use crate::config::{DEFAULT_NULL_VALUES, PipelineConfig};
use crate::error::{EtlError, Result, ResultExt};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Loads comma-delimited files with a header row.
///
/// Every column is read as text: the loader performs no type inference, so a
/// value stays exactly as written until a later stage coerces it. Unquoted
/// empty fields and fields equal to one of the configured null markers are
/// read as missing; a quoted empty field (`""`) stays an empty string.
#[derive(Debug, Clone)]
pub struct Loader {
    null_values: Vec<String>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()))
    }
}

impl Loader {
    /// Create a loader with an explicit list of null markers.
    pub fn new<I, S>(null_values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            null_values: null_values.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a loader using the null markers of a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.null_values.iter().cloned())
    }

    /// Read `path` into a dataset.
    ///
    /// # Errors
    ///
    /// - [`EtlError::FileNotFound`] if the path is not an existing file
    /// - [`EtlError::EmptyDataset`] if the file has no data rows
    /// - [`EtlError::Polars`] (with the path as context) if it cannot be parsed
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(EtlError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        // polars rejects a zero-byte file outright; that is still an empty dataset
        if std::fs::metadata(path)?.len() == 0 {
            return Err(EtlError::EmptyDataset {
                path: path.to_path_buf(),
            });
        }

        debug!("Reading {} as text columns", path.display());

        let null_values = NullValues::AllColumns(
            self.null_values
                .iter()
                .map(|v| PlSmallStr::from(v.as_str()))
                .collect(),
        );

        let df = CsvReadOptions::default()
            .with_has_header(true)
            // zero rows of inference: every column is read as String
            .with_infer_schema_length(Some(0))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(FIELD_DELIMITER)
                    .with_quote_char(Some(QUOTE_CHAR))
                    .with_null_values(Some(null_values)),
            )
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .context(format!("Opening {}", path.display()))?
            .finish()
            .context(format!("Parsing {}", path.display()))?;

        if df.height() == 0 {
            return Err(EtlError::EmptyDataset {
                path: path.to_path_buf(),
            });
        }

        info!(
            "Dataset loaded from {}: {} rows x {} columns",
            path.display(),
            df.height(),
            df.width()
        );
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_reads_all_columns_as_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "input.csv",
            "transaction_id,customer_id,transaction_amount\n1001,ABC123,45.67\n1002,XYZ789,20\n",
        );

        let df = Loader::default().load(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));
        for column in df.get_columns() {
            assert_eq!(column.dtype(), &DataType::String);
        }
        let amounts: Vec<Option<&str>> = df
            .column("transaction_amount")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(amounts, vec![Some("45.67"), Some("20")]);
    }

    #[test]
    fn test_load_marks_empty_and_null_markers_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "input.csv",
            "customer_id,transaction_amount\nABC123,\nNULL,10\nXYZ789,NaN\nLMN456,5\n",
        );

        let df = Loader::default().load(&path).unwrap();
        assert_eq!(df.column("customer_id").unwrap().null_count(), 1);
        assert_eq!(df.column("transaction_amount").unwrap().null_count(), 2);
    }

    #[test]
    fn test_load_custom_null_markers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.csv", "a,b\nNULL,x\n-,y\n");

        let df = Loader::new(["-"]).load(&path).unwrap();
        let a = df.column("a").unwrap();
        assert_eq!(a.null_count(), 1);
        assert_eq!(a.as_materialized_series().str().unwrap().get(0), Some("NULL"));
    }

    #[test]
    fn test_load_keeps_quoted_delimiters() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.csv", "name,note\n\"Smith, J\",\"said \"\"hi\"\"\"\n");

        let df = Loader::default().load(&path).unwrap();
        let text = |name: &str| -> Option<String> {
            df.column(name)
                .unwrap()
                .as_materialized_series()
                .str()
                .unwrap()
                .get(0)
                .map(|s| s.to_string())
        };
        assert_eq!(text("name").as_deref(), Some("Smith, J"));
        assert_eq!(text("note").as_deref(), Some("said \"hi\""));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Loader::default().load("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, EtlError::FileNotFound { .. }));
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn test_load_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let err = Loader::default().load(dir.path()).unwrap_err();
        assert!(matches!(err, EtlError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_header_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "customer_id,transaction_amount\n");

        let err = Loader::default().load(&path).unwrap_err();
        assert!(matches!(err, EtlError::EmptyDataset { .. }));
    }

    #[test]
    fn test_load_zero_byte_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "");

        let err = Loader::default().load(&path).unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_DATASET");
    }
}
