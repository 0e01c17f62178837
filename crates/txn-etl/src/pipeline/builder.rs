//! Main pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating the two halves of a run: cleaning a raw file, and
//! aggregating the cleaned file.

use crate::aggregate::Aggregator;
use crate::cleaner::{AmountNormalizer, Deduplicator, RowCleaner};
use crate::config::{DEDUP_KEY_COLUMN, PipelineConfig, SOURCE_ROW_COLUMN};
use crate::error::{EtlError, Result};
use crate::io::{Loader, Persister};
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::pipeline::state::{PipelineHalf, PipelineState, StateLog};
use crate::reporting::{AggregationSummary, CleaningSummary, RunReport};
use crate::utils::float_column_sum;
use polars::prelude::{DataFrame, PlSmallStr};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// The cleaning and aggregation pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use txn_etl::{Pipeline, PipelineConfig};
/// use txn_etl::config::DedupColumns;
///
/// let config = PipelineConfig::builder()
///     .dedup_columns(DedupColumns::subset(["customer_id", "transaction_amount"]))
///     .build()?;
///
/// let report = Pipeline::builder()
///     .config(config)
///     .on_progress(|update| println!("{}: {}", update.stage.display_name(), update.message))
///     .build()?
///     .run("input_data.csv", "cleaned_data.csv", "aggregated_transactions.csv")?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    loader: Loader,
    persister: Persister,
    row_cleaner: RowCleaner,
    deduplicator: Deduplicator,
    normalizer: AmountNormalizer,
    aggregator: Aggregator,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Clean a raw file and write the result.
    ///
    /// Stages run in order: load, drop incomplete rows, deduplicate,
    /// normalize amounts, persist. The first failing stage stops the half;
    /// its error is attributed to that stage and nothing is written.
    pub fn run_cleaning(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<CleaningSummary> {
        let mut log = StateLog::new(PipelineHalf::Cleaning);
        self.clean(&mut log, input.as_ref(), output.as_ref())
    }

    /// Aggregate a cleaned file and write the per-key totals.
    ///
    /// The input is read back from disk, so amounts arrive as text and are
    /// coerced again before summing.
    pub fn run_aggregation(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<AggregationSummary> {
        let mut log = StateLog::new(PipelineHalf::Aggregation);
        self.aggregate(&mut log, input.as_ref(), output.as_ref())
    }

    /// Run the cleaning half into a report.
    ///
    /// On failure the report carries the states reached before the failing
    /// stage.
    pub fn clean_to_report(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> RunReport {
        let mut log = StateLog::new(PipelineHalf::Cleaning);
        match self.clean(&mut log, input.as_ref(), output.as_ref()) {
            Ok(summary) => RunReport::cleaning(summary),
            Err(err) => RunReport::empty().with_failed_half(&err, log),
        }
    }

    /// Run the aggregation half into a report.
    pub fn aggregate_to_report(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> RunReport {
        let mut log = StateLog::new(PipelineHalf::Aggregation);
        match self.aggregate(&mut log, input.as_ref(), output.as_ref()) {
            Ok(summary) => RunReport::aggregation(summary),
            Err(err) => RunReport::empty().with_failed_half(&err, log),
        }
    }

    fn clean(&self, log: &mut StateLog, input: &Path, output: &Path) -> Result<CleaningSummary> {
        let start_time = Instant::now();

        info!(
            "Starting cleaning: {} -> {}",
            input.display(),
            output.display()
        );

        // Step 1: Load, tagging each row with its position in the file
        let df = self.stage(log, PipelineStage::Loading, || {
            let df = self.loader.load(input)?;
            Ok(df.with_row_index(PlSmallStr::from_static(SOURCE_ROW_COLUMN), None)?)
        })?;
        let rows_loaded = df.height();
        self.enter(
            log,
            PipelineStage::Loading,
            PipelineState::Loaded { rows: rows_loaded },
            ProgressUpdate::with_counts(
                PipelineStage::Loading,
                rows_loaded,
                0,
                format!("Loaded {} rows from {}", rows_loaded, input.display()),
            ),
        )?;

        // Step 2: Drop rows with missing values
        let (df, incomplete_rows_removed) =
            self.stage(log, PipelineStage::RemovingIncompleteRows, || {
                self.row_cleaner.remove_incomplete_rows(df)
            })?;
        self.enter(
            log,
            PipelineStage::RemovingIncompleteRows,
            PipelineState::RowsCleaned {
                rows: df.height(),
                removed: incomplete_rows_removed,
            },
            ProgressUpdate::with_counts(
                PipelineStage::RemovingIncompleteRows,
                df.height(),
                incomplete_rows_removed,
                format!("Removed {} rows with missing values", incomplete_rows_removed),
            ),
        )?;

        // Step 3: Deduplicate
        let dedup = self.stage(log, PipelineStage::Deduplicating, || {
            self.deduplicator.deduplicate(
                df,
                &self.config.dedup_columns,
                self.config.duplicate_policy,
            )
        })?;
        let df = dedup.data;
        self.enter(
            log,
            PipelineStage::Deduplicating,
            PipelineState::Deduplicated {
                rows: df.height(),
                removed: dedup.duplicates_removed,
            },
            ProgressUpdate::with_counts(
                PipelineStage::Deduplicating,
                df.height(),
                dedup.duplicates_removed,
                format!(
                    "Found {} duplicate rows, removed {}",
                    dedup.duplicates_found, dedup.duplicates_removed
                ),
            ),
        )?;

        // Step 4: Coerce amounts
        let amount_column = self.config.amount_column.as_str();
        let (df, amount_total) = self.stage(log, PipelineStage::Normalizing, || {
            let df = self
                .normalizer
                .normalize(&df, amount_column)
                .map_err(|err| at_source_row(&df, err))?;
            let total = float_column_sum(&df, amount_column)?;
            Ok((df, total))
        })?;
        self.enter(
            log,
            PipelineStage::Normalizing,
            PipelineState::Normalized { rows: df.height() },
            ProgressUpdate::new(
                PipelineStage::Normalizing,
                format!("Converted {} values to float", amount_column),
            ),
        )?;

        // Step 5: Persist
        let persist_key = self.config.persist_dedup_key;
        let (path, rows_written) = self.stage(log, PipelineStage::Persisting, || {
            let mut out = df.drop(SOURCE_ROW_COLUMN)?;
            if !persist_key {
                out = out.drop(DEDUP_KEY_COLUMN)?;
            }
            let path = self.persister.save(&mut out, output)?;
            Ok((path, out.height()))
        })?;
        self.enter(
            log,
            PipelineStage::Persisting,
            PipelineState::Persisted {
                path: path.clone(),
                rows: rows_written,
            },
            ProgressUpdate::with_counts(
                PipelineStage::Persisting,
                rows_written,
                0,
                format!("Cleaned data saved to {}", path.display()),
            ),
        )?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        self.report_progress(ProgressUpdate::complete(format!(
            "Cleaning finished: {} of {} rows kept",
            rows_written, rows_loaded
        )));
        info!(
            "Cleaning finished in {} ms: {} rows in, {} rows out",
            duration_ms, rows_loaded, rows_written
        );

        Ok(CleaningSummary {
            input_file: input.to_path_buf(),
            output_file: path,
            rows_loaded,
            incomplete_rows_removed,
            duplicates_found: dedup.duplicates_found,
            duplicates_removed: dedup.duplicates_removed,
            duplicate_policy: self.config.duplicate_policy,
            dedup_key_persisted: persist_key,
            rows_written,
            amount_total,
            states: log.states().to_vec(),
            duration_ms,
        })
    }

    fn aggregate(
        &self,
        log: &mut StateLog,
        input: &Path,
        output: &Path,
    ) -> Result<AggregationSummary> {
        let start_time = Instant::now();

        info!(
            "Starting aggregation: {} -> {}",
            input.display(),
            output.display()
        );

        // Step 1: Load
        let df = self.stage(log, PipelineStage::Loading, || self.loader.load(input))?;
        let rows_loaded = df.height();
        self.enter(
            log,
            PipelineStage::Loading,
            PipelineState::Loaded { rows: rows_loaded },
            ProgressUpdate::with_counts(
                PipelineStage::Loading,
                rows_loaded,
                0,
                format!("Loaded {} rows from {}", rows_loaded, input.display()),
            ),
        )?;

        // Step 2: Group and sum
        let (mut aggregated, grand_total) =
            self.stage(log, PipelineStage::Aggregating, || {
                let aggregated = self.aggregator.aggregate(&df)?;
                let total = self.aggregator.grand_total(&aggregated)?;
                Ok((aggregated, total))
            })?;
        let groups = aggregated.height();
        self.enter(
            log,
            PipelineStage::Aggregating,
            PipelineState::Aggregated { groups },
            ProgressUpdate::with_counts(
                PipelineStage::Aggregating,
                groups,
                0,
                format!("Computed totals for {} keys", groups),
            ),
        )?;

        // Step 3: Persist
        let path = self.stage(log, PipelineStage::Persisting, || {
            self.persister.save(&mut aggregated, output)
        })?;
        self.enter(
            log,
            PipelineStage::Persisting,
            PipelineState::Persisted {
                path: path.clone(),
                rows: groups,
            },
            ProgressUpdate::with_counts(
                PipelineStage::Persisting,
                groups,
                0,
                format!("Aggregated data saved to {}", path.display()),
            ),
        )?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        self.report_progress(ProgressUpdate::complete(format!(
            "Aggregation finished: {} keys",
            groups
        )));
        info!("Aggregation finished in {} ms", duration_ms);

        Ok(AggregationSummary {
            input_file: input.to_path_buf(),
            output_file: path,
            rows_loaded,
            groups,
            grand_total,
            states: log.states().to_vec(),
            duration_ms,
        })
    }

    /// Run cleaning, then aggregate the cleaned file.
    ///
    /// A failed cleaning half skips aggregation. A failed aggregation half
    /// leaves the cleaned file in place.
    pub fn run(
        &self,
        input: impl AsRef<Path>,
        cleaned: impl AsRef<Path>,
        aggregated: impl AsRef<Path>,
    ) -> Result<RunReport> {
        let cleaning = self.run_cleaning(input, cleaned.as_ref())?;
        let aggregation = self.run_aggregation(cleaned.as_ref(), aggregated)?;
        Ok(RunReport::full(cleaning, aggregation))
    }

    /// Like [`run`](Self::run), but a failure is recorded in the report
    /// alongside the summary of any half that completed.
    pub fn run_to_report(
        &self,
        input: impl AsRef<Path>,
        cleaned: impl AsRef<Path>,
        aggregated: impl AsRef<Path>,
    ) -> RunReport {
        let mut log = StateLog::new(PipelineHalf::Cleaning);
        let cleaning = match self.clean(&mut log, input.as_ref(), cleaned.as_ref()) {
            Ok(summary) => summary,
            Err(err) => return RunReport::empty().with_failed_half(&err, log),
        };
        let mut log = StateLog::new(PipelineHalf::Aggregation);
        match self.aggregate(&mut log, cleaned.as_ref(), aggregated.as_ref()) {
            Ok(aggregation) => RunReport::full(cleaning, aggregation),
            Err(err) => RunReport::cleaning(cleaning).with_failed_half(&err, log),
        }
    }

    /// Run one stage body, turning its error into a stage failure.
    fn stage<T>(
        &self,
        log: &mut StateLog,
        stage: PipelineStage,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        debug!("Stage: {}", stage.display_name());
        body().map_err(|err| self.fail(log, stage, err))
    }

    /// Record a completed stage and tell the progress reporter.
    fn enter(
        &self,
        log: &mut StateLog,
        stage: PipelineStage,
        state: PipelineState,
        update: ProgressUpdate,
    ) -> Result<()> {
        if let Err(err) = log.advance(state) {
            return Err(self.fail(log, stage, err));
        }
        self.report_progress(update);
        Ok(())
    }

    fn fail(&self, log: &mut StateLog, stage: PipelineStage, err: EtlError) -> EtlError {
        log.fail(stage, err.root().to_string());
        error!("{} failed: {}", stage.display_name(), err);
        debug!("{:?} states before failure: {:?}", log.half(), log.states());
        self.report_progress(ProgressUpdate::failed(format!(
            "{} failed: {}",
            stage.display_name(),
            err
        )));
        err.in_stage(stage)
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Rewrite the row of an amount error from a position in `df` to the
/// input-file row recorded in the source row column.
fn at_source_row(df: &DataFrame, err: EtlError) -> EtlError {
    match err {
        EtlError::AmountParse { column, row, value } => {
            let source_row = df
                .column(SOURCE_ROW_COLUMN)
                .ok()
                .and_then(|c| c.as_materialized_series().idx().ok()?.get(row))
                .map_or(row, |idx| idx as usize);
            EtlError::AmountParse {
                column,
                row: source_row,
                value,
            }
        }
        other => other,
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use txn_etl::{ProgressReporter, ProgressUpdate};
    /// use std::sync::Arc;
    ///
    /// struct MyReporter;
    ///
    /// impl ProgressReporter for MyReporter {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let pipeline = Pipeline::builder()
    ///     .progress_reporter(Arc::new(MyReporter))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::InvalidConfig`] if the configuration fails
    /// validation.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            loader: Loader::from_config(&config),
            persister: Persister,
            row_cleaner: RowCleaner,
            deduplicator: Deduplicator,
            normalizer: AmountNormalizer,
            aggregator: Aggregator::from_config(&config),
            progress_reporter: self.progress_reporter,
            config,
        })
    }
}
