//! Transaction ETL Library
//!
//! A small batch pipeline for transaction records, built with Rust and Polars.
//!
//! # Overview
//!
//! A run has two halves, each reading and writing comma-delimited files:
//!
//! - **Cleaning**: load the raw file, drop rows with any missing value,
//!   remove content-hash duplicates, coerce the amount column to float, and
//!   write the cleaned file
//! - **Aggregation**: load the cleaned file, sum the amount column per key,
//!   and write one row per key
//!
//! Every stage failure is attributed to the stage that raised it and stops
//! the half. A failed aggregation leaves the cleaned file in place.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use txn_etl::Pipeline;
//!
//! let report = Pipeline::builder()
//!     .build()?
//!     .run("input_data.csv", "cleaned_data.csv", "aggregated_transactions.csv")?;
//!
//! println!("Kept {} rows", report.cleaning.unwrap().rows_written);
//! ```
//!
//! # Configuration
//!
//! Use [`PipelineConfig`] to rename the columns the pipeline works on or to
//! change how duplicates are identified:
//!
//! ```rust,ignore
//! use txn_etl::config::*;
//!
//! let config = PipelineConfig::builder()
//!     .key_column("account")
//!     .amount_column("amount")
//!     .dedup_columns(DedupColumns::subset(["account", "amount", "booked_at"]))
//!     .duplicate_policy(DuplicatePolicy::ReportOnly)
//!     .build()?;
//! ```
//!
//! # Using the stages directly
//!
//! Each stage is usable on an in-memory [`polars::prelude::DataFrame`]:
//!
//! ```rust,ignore
//! use txn_etl::{AmountNormalizer, Aggregator, Deduplicator, Loader, RowCleaner};
//! use txn_etl::config::{DedupColumns, DuplicatePolicy};
//!
//! let df = Loader::default().load("input_data.csv")?;
//! let (df, _) = RowCleaner.remove_incomplete_rows(df)?;
//! let df = Deduplicator.deduplicate(df, &DedupColumns::All, DuplicatePolicy::Remove)?.data;
//! let df = AmountNormalizer.normalize(&df, "transaction_amount")?;
//! let totals = Aggregator::default().aggregate(&df)?;
//! ```

pub mod aggregate;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregate::Aggregator;
pub use cleaner::{AmountNormalizer, DedupOutcome, Deduplicator, RowCleaner};
pub use config::{
    ConfigValidationError, DedupColumns, DuplicatePolicy, PipelineConfig, PipelineConfigBuilder,
};
pub use error::{EtlError, Result as EtlResult, ResultExt};
pub use io::{Loader, Persister};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineHalf, PipelineStage,
    PipelineState, ProgressReporter, ProgressUpdate, StateLog,
};
pub use reporting::{AggregationSummary, CleaningSummary, ReportWriter, RunReport};
pub use types::CellValue;
