//! Run reports.
//!
//! Each half of the pipeline returns a summary; [`RunReport`] combines them
//! for output:
//! - JSON to stdout (`--json` CLI flag)
//! - JSON file (`--emit-report` CLI flag)
//! - Programmatic access in library mode
//!
//! # Example
//!
//! ```rust,ignore
//! use txn_etl::{Pipeline, reporting::ReportWriter};
//!
//! let report = Pipeline::builder().build()?.run(
//!     "input_data.csv",
//!     "cleaned_data.csv",
//!     "aggregated_transactions.csv",
//! )?;
//! ReportWriter::write(&report, "run_report.json")?;
//! ```

mod summary;
mod writer;

pub use summary::{AggregationSummary, CleaningSummary, FailureReport, RunReport, TOTAL_TOLERANCE};
pub use writer::ReportWriter;
