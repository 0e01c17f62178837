//! Stage identifiers and progress reporting for the pipeline.
//!
//! The pipeline is synchronous; reporting exists so the driving layer can
//! surface per-stage counts to a human (console, JSON report, a host UI).
//!
//! # Example
//!
//! ```rust,ignore
//! use txn_etl::Pipeline;
//!
//! let pipeline = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{}] {}", update.stage.display_name(), update.message);
//!     })
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the pipeline.
///
/// `Loading` and `Persisting` occur in both halves of a run; the half is
/// implied by the stage that precedes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading a delimited file into memory
    Loading,
    /// Dropping rows with any missing value
    RemovingIncompleteRows,
    /// Computing dedup keys and dropping repeated rows
    Deduplicating,
    /// Coercing the amount column to float
    Normalizing,
    /// Writing a dataset to disk
    Persisting,
    /// Grouping by key and summing amounts
    Aggregating,
    /// Half completed successfully
    Complete,
    /// Half aborted with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Dataset",
            Self::RemovingIncompleteRows => "Removing Incomplete Rows",
            Self::Deduplicating => "Removing Duplicates",
            Self::Normalizing => "Normalizing Amounts",
            Self::Persisting => "Saving Dataset",
            Self::Aggregating => "Aggregating Totals",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Whether this stage ends a pipeline half.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Stage that produced the update
    pub stage: PipelineStage,

    /// Human-readable message describing what happened
    pub message: String,

    /// Rows in the dataset after the stage ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,

    /// Rows removed by the stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

impl ProgressUpdate {
    /// Creates an update carrying only a message.
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            rows: None,
            removed: None,
        }
    }

    /// Creates an update with the row count after the stage and the number
    /// of rows it removed.
    pub fn with_counts(
        stage: PipelineStage,
        rows: usize,
        removed: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            message: message.into(),
            rows: Some(rows),
            removed: Some(removed),
        }
    }

    /// Creates a completion update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, message)
    }

    /// Creates a failure update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, message)
    }
}

/// Receives progress updates during a run.
///
/// `Send + Sync` so a host can forward updates to another thread; the
/// pipeline itself calls it synchronously from the running thread.
pub trait ProgressReporter: Send + Sync {
    /// Called once per stage transition.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_stage_display_names() {
        assert_eq!(PipelineStage::Loading.display_name(), "Loading Dataset");
        assert_eq!(
            PipelineStage::Deduplicating.display_name(),
            "Removing Duplicates"
        );
    }

    #[test]
    fn test_terminal_stages() {
        assert!(PipelineStage::Complete.is_terminal());
        assert!(PipelineStage::Failed.is_terminal());
        assert!(!PipelineStage::Aggregating.is_terminal());
    }

    #[test]
    fn test_with_counts() {
        let update = ProgressUpdate::with_counts(
            PipelineStage::RemovingIncompleteRows,
            8,
            4,
            "Removed 4 rows with missing values.",
        );
        assert_eq!(update.rows, Some(8));
        assert_eq!(update.removed, Some(4));
    }

    #[test]
    fn test_update_serialization_skips_empty_counts() {
        let json = serde_json::to_string(&ProgressUpdate::complete("done")).unwrap();
        assert!(json.contains("\"stage\":\"complete\""));
        assert!(!json.contains("rows"));
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = ClosureProgressReporter::new(|update: ProgressUpdate| {
            seen.lock().unwrap().push(update.stage);
        });

        reporter.report(ProgressUpdate::new(PipelineStage::Loading, "loading"));
        reporter.report(ProgressUpdate::failed("boom"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PipelineStage::Loading, PipelineStage::Failed]
        );
    }
}
