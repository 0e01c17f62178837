//! Per-half summaries and the run report that combines them.

use crate::config::DuplicatePolicy;
use crate::error::EtlError;
use crate::pipeline::{PipelineHalf, PipelineStage, PipelineState, StateLog};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Totals are compared with this tolerance when checking conservation.
pub const TOTAL_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Per-half summaries
// ============================================================================

/// What the cleaning half did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningSummary {
    /// Raw input file
    pub input_file: PathBuf,
    /// Cleaned file written
    pub output_file: PathBuf,
    /// Rows read from the input
    pub rows_loaded: usize,
    /// Rows dropped for a missing value
    pub incomplete_rows_removed: usize,
    /// Rows whose deduplication key repeated an earlier row's
    pub duplicates_found: usize,
    /// Rows dropped as duplicates
    pub duplicates_removed: usize,
    /// Policy the duplicates were handled under
    pub duplicate_policy: DuplicatePolicy,
    /// Whether `unique_id` was written to the cleaned file
    pub dedup_key_persisted: bool,
    /// Rows in the cleaned file
    pub rows_written: usize,
    /// Sum of the amount column over the cleaned rows
    pub amount_total: f64,
    /// States the dataset went through
    pub states: Vec<PipelineState>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// What the aggregation half did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSummary {
    /// Cleaned file read back
    pub input_file: PathBuf,
    /// Aggregate file written
    pub output_file: PathBuf,
    /// Rows read from the cleaned file
    pub rows_loaded: usize,
    /// Distinct keys, one output row each
    pub groups: usize,
    /// Sum of all per-key totals
    pub grand_total: f64,
    /// States the dataset went through
    pub states: Vec<PipelineState>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

// ============================================================================
// Run report
// ============================================================================

/// Report for a run of one or both halves.
///
/// This is what the CLI prints with `--json` and writes with
/// `--emit-report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Local time the report was generated, RFC 3339
    pub generated_at: String,
    /// `true` when every requested half completed
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleaningSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationSummary>,
    /// Whether the aggregate's grand total equals the cleaned amount total.
    /// Only present when both halves ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals_conserved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

/// Where and why a run stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    /// Terminal state of the half that failed
    pub state: PipelineState,
    pub code: String,
    pub message: String,
    /// Whether the input data caused the failure, rather than I/O or plumbing
    pub data_error: bool,
    /// Half that failed, when the run tracked it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub half: Option<PipelineHalf>,
    /// States the failed half went through, ending in `Failed`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<PipelineState>,
}

impl RunReport {
    /// Report with no halves recorded yet.
    pub(crate) fn empty() -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            success: true,
            cleaning: None,
            aggregation: None,
            totals_conserved: None,
            failure: None,
        }
    }

    /// Report for a completed cleaning half.
    pub fn cleaning(summary: CleaningSummary) -> Self {
        Self {
            cleaning: Some(summary),
            ..Self::empty()
        }
    }

    /// Report for a completed aggregation half.
    pub fn aggregation(summary: AggregationSummary) -> Self {
        Self {
            aggregation: Some(summary),
            ..Self::empty()
        }
    }

    /// Report for a completed full run.
    pub fn full(cleaning: CleaningSummary, aggregation: AggregationSummary) -> Self {
        let conserved = (cleaning.amount_total - aggregation.grand_total).abs() <= TOTAL_TOLERANCE;
        Self {
            cleaning: Some(cleaning),
            aggregation: Some(aggregation),
            totals_conserved: Some(conserved),
            ..Self::empty()
        }
    }

    /// Mark the report failed with `err`.
    ///
    /// Summaries of halves that completed before the failure are kept.
    pub fn with_failure(mut self, err: &EtlError) -> Self {
        let stage = err.stage().unwrap_or(PipelineStage::Failed);
        let reason = err.root().to_string();
        self.success = false;
        self.failure = Some(FailureReport {
            state: PipelineState::Failed { stage, reason },
            code: err.error_code().to_string(),
            message: err.to_string(),
            data_error: err.is_data_error(),
            half: None,
            states: Vec::new(),
        });
        self
    }

    /// Mark the report failed with `err`, keeping the states `log` reached.
    pub fn with_failed_half(self, err: &EtlError, log: StateLog) -> Self {
        let mut report = self.with_failure(err);
        if let Some(failure) = report.failure.as_mut() {
            if log.is_failed()
                && let Some(state) = log.current()
            {
                failure.state = state.clone();
            }
            failure.half = Some(log.half());
            failure.states = log.into_states();
        }
        report
    }
}
