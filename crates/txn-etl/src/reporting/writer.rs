//! JSON output of run reports.

use super::RunReport;
use crate::error::{EtlError, Result, ResultExt};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes run reports as pretty-printed JSON files.
pub struct ReportWriter;

impl ReportWriter {
    pub fn to_json(report: &RunReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    /// Write `report` to `path`, creating parent directories as needed.
    pub fn write(report: &RunReport, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let json = Self::to_json(report)?;
        let mut file = File::create(path)
            .map_err(EtlError::from)
            .context(format!("Creating report {}", path.display()))?;
        file.write_all(json.as_bytes())?;

        info!("Run report written to {}", path.display());
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports/run.json");
        let err = EtlError::FileNotFound {
            path: PathBuf::from("input_data.csv"),
        };

        ReportWriter::write(&RunReport::empty().with_failure(&err), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["failure"]["code"], "FILE_NOT_FOUND");
        assert_eq!(value["failure"]["state"]["state"], "failed");
    }
}
