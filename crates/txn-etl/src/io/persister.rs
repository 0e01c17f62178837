//! Writes a dataset to a delimited file.

use super::{FIELD_DELIMITER, QUOTE_CHAR};
use crate::error::{EtlError, Result, ResultExt};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Serializes datasets as comma-delimited text.
///
/// Output is a header row followed by one row per data row, with no index
/// column. Fields containing the delimiter, a quote or a newline are quoted;
/// missing cells are written as empty fields.
pub struct Persister;

impl Persister {
    /// Write `df` to `path`, overwriting any existing file and creating
    /// missing parent directories.
    ///
    /// Returns the destination path. On failure the file may be partially
    /// written; no stronger guarantee is made.
    pub fn save(&self, df: &mut DataFrame, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(EtlError::from)
                .context(format!("Creating directory {}", parent.display()))?;
        }

        let mut file = File::create(path)
            .map_err(EtlError::from)
            .context(format!("Creating {}", path.display()))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(FIELD_DELIMITER)
            .with_quote_char(QUOTE_CHAR)
            .finish(df)
            .context(format!("Writing {}", path.display()))?;

        info!("Dataset saved: {} ({} rows)", path.display(), df.height());
        Ok(path.to_path_buf())
    }
}
