//! Error types for the cleaning and aggregation pipeline.
//!
//! The four domain failures (missing input file, empty dataset, unparseable
//! amount, missing column) each carry enough context to act on. Everything
//! else is plumbing around `std::io`, polars and serde_json.
//!
//! Errors serialize as `{ code, message }` so the CLI can emit them in its
//! JSON report.

use crate::pipeline::PipelineStage;
use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// Placeholder used in error messages for a missing cell.
pub const MISSING_MARKER: &str = "<missing>";

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Input path does not resolve to a file.
    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// The parsed dataset has no data rows.
    #[error("The input CSV contains no data: {}", .path.display())]
    EmptyDataset { path: PathBuf },

    /// A value in the numeric column could not be parsed as a float.
    ///
    /// `row` is the 0-based data row of the input file when raised by the
    /// pipeline, and the position within the normalized dataset otherwise.
    #[error("Cannot convert value '{value}' in column '{column}' (row {row}) to float")]
    AmountParse {
        column: String,
        row: usize,
        value: String,
    },

    /// An expected column is absent.
    #[error("Column '{column}' not found in dataset (available: {})", .available.join(", "))]
    Schema {
        column: String,
        available: Vec<String>,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A pipeline invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EtlError>,
    },

    /// A pipeline stage failed; the remaining stages of that half were skipped.
    #[error("{} failed: {source}", .stage.display_name())]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EtlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Attribute the error to a pipeline stage.
    ///
    /// An error that is already attributed keeps its original stage.
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            already @ EtlError::Stage { .. } => already,
            other => EtlError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Build a schema error from the column that was looked up and the
    /// columns that were actually present.
    pub fn missing_column<I, S>(column: impl Into<String>, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        EtlError::Schema {
            column: column.into(),
            available: available
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
        }
    }

    /// The innermost error, skipping context and stage wrappers.
    pub fn root(&self) -> &EtlError {
        match self {
            Self::WithContext { source, .. } | Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage this error was attributed to, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }

    /// Stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::EmptyDataset { .. } => "EMPTY_DATASET",
            Self::AmountParse { .. } => "AMOUNT_PARSE_ERROR",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::WithContext { source, .. } | Self::Stage { source, .. } => source.error_code(),
        }
    }

    /// Check if the root cause is one of the four data-level failures
    /// (as opposed to I/O or library plumbing).
    pub fn is_data_error(&self) -> bool {
        matches!(
            self.root(),
            Self::FileNotFound { .. }
                | Self::EmptyDataset { .. }
                | Self::AmountParse { .. }
                | Self::Schema { .. }
        )
    }
}

impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Polars(e).with_context(context))
    }
}
