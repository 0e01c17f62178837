//! CLI entry point for the transaction ETL pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use txn_etl::{
    AggregationSummary, CleaningSummary, DedupColumns, DuplicatePolicy, Loader, Pipeline,
    PipelineConfig, PipelineConfigBuilder, PipelineStage, ReportWriter, RunReport,
};

const DEFAULT_INPUT: &str = "input_data.csv";
const DEFAULT_CLEANED: &str = "cleaned_data.csv";
const DEFAULT_AGGREGATED: &str = "aggregated_transactions.csv";

#[derive(Parser, Debug)]
#[command(
    name = "txn-etl",
    version,
    about = "Clean and aggregate transaction CSV files",
    long_about = "Cleans a raw transaction file (drops incomplete rows, removes duplicates,\n\
                  coerces amounts to float) and aggregates the cleaned file into per-key totals.\n\n\
                  EXAMPLES:\n  \
                  # Clean input_data.csv and aggregate it (default)\n  \
                  txn-etl\n\n  \
                  # Only the cleaning half\n  \
                  txn-etl clean -i raw.csv -o cleaned.csv\n\n  \
                  # Deduplicate on a subset of columns\n  \
                  txn-etl run -i raw.csv --dedup-columns customer_id,transaction_amount,date\n\n  \
                  # Machine-readable output\n  \
                  txn-etl run --json | jq .aggregation.grand_total"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    options: SharedOptions,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a raw file and write the cleaned file
    Clean {
        /// Raw input CSV
        #[arg(short, long, default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// Cleaned output CSV
        #[arg(short, long, default_value = DEFAULT_CLEANED)]
        output: PathBuf,
    },

    /// Aggregate a cleaned file into per-key totals
    Aggregate {
        /// Cleaned input CSV
        #[arg(short, long, default_value = DEFAULT_CLEANED)]
        input: PathBuf,

        /// Aggregated output CSV
        #[arg(short, long, default_value = DEFAULT_AGGREGATED)]
        output: PathBuf,
    },

    /// Clean, then aggregate the cleaned file (default)
    Run {
        /// Raw input CSV
        #[arg(short, long, default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// Cleaned output CSV
        #[arg(long, default_value = DEFAULT_CLEANED)]
        cleaned: PathBuf,

        /// Aggregated output CSV
        #[arg(long, default_value = DEFAULT_AGGREGATED)]
        aggregated: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SharedOptions {
    /// JSON configuration file; flags below override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Column to group by
    #[arg(long, global = true)]
    key_column: Option<String>,

    /// Column to coerce to float and sum
    #[arg(long, global = true)]
    amount_column: Option<String>,

    /// Name of the summed column in the aggregate
    #[arg(long, global = true)]
    total_column: Option<String>,

    /// Columns that identify a duplicate (default: every column)
    #[arg(long, global = true, value_delimiter = ',')]
    dedup_columns: Option<Vec<String>>,

    /// Count duplicates but keep them in the cleaned file
    #[arg(long, global = true)]
    keep_duplicates: bool,

    /// Write the unique_id column to the cleaned file
    #[arg(long, global = true)]
    persist_dedup_key: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logging; only outputs the final JSON report.
    #[arg(long, global = true)]
    json: bool,

    /// Write the JSON run report to this file
    #[arg(short = 'r', long, global = true)]
    emit_report: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = &cli.options;

    init_logging(&options.log_level, options.quiet, options.json);

    let config = build_config(options)?;
    let pipeline = build_pipeline(options, config)?;

    let command = cli.command.unwrap_or(Command::Run {
        input: PathBuf::from(DEFAULT_INPUT),
        cleaned: PathBuf::from(DEFAULT_CLEANED),
        aggregated: PathBuf::from(DEFAULT_AGGREGATED),
    });

    let report = match &command {
        Command::Clean { input, output } => pipeline.clean_to_report(input, output),
        Command::Aggregate { input, output } => pipeline.aggregate_to_report(input, output),
        Command::Run {
            input,
            cleaned,
            aggregated,
        } => pipeline.run_to_report(input, cleaned, aggregated),
    };

    handle_output(&report, &pipeline, options)
}

/// Merge the config file (if any) with the command-line overrides.
fn build_config(options: &SharedOptions) -> Result<PipelineConfig> {
    let base = match &options.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut builder = PipelineConfigBuilder::from_config(base);

    if let Some(ref column) = options.key_column {
        builder = builder.key_column(column);
    }
    if let Some(ref column) = options.amount_column {
        builder = builder.amount_column(column);
    }
    if let Some(ref column) = options.total_column {
        builder = builder.total_column(column);
    }
    if let Some(ref columns) = options.dedup_columns {
        builder = builder.dedup_columns(DedupColumns::subset(columns.iter().cloned()));
    }
    if options.keep_duplicates {
        builder = builder.duplicate_policy(DuplicatePolicy::ReportOnly);
    }
    if options.persist_dedup_key {
        builder = builder.persist_dedup_key(true);
    }

    Ok(builder.build()?)
}

fn build_pipeline(options: &SharedOptions, config: PipelineConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if !options.quiet && !options.json {
        builder = builder.on_progress(|update| match update.stage {
            PipelineStage::Failed => warn!("{}", update.message),
            stage if stage.is_terminal() => info!("{}", update.message),
            stage => info!("[{}] {}", stage.display_name(), update.message),
        });
    }

    Ok(builder.build()?)
}

/// Handle pipeline output based on CLI flags.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print JSON to stdout only (no logs)
/// - `--emit-report`: Write JSON report to file
fn handle_output(report: &RunReport, pipeline: &Pipeline, options: &SharedOptions) -> Result<()> {
    if let Some(ref path) = options.emit_report {
        ReportWriter::write(report, path)?;
    }

    if options.json {
        println!("{}", ReportWriter::to_json(report)?);
    } else {
        print_human_readable_summary(report, pipeline);
    }

    match &report.failure {
        None => Ok(()),
        Some(failure) => {
            if !options.json {
                error!("{}", failure.message);
            }
            Err(anyhow!("{}", failure.message))
        }
    }
}

/// Print a human-readable summary of the run.
///
/// Uses `println!` on purpose: this is the program's output, not a log line.
fn print_human_readable_summary(report: &RunReport, pipeline: &Pipeline) {
    println!();
    println!("{}", "=".repeat(80));
    if report.success {
        println!("RUN COMPLETE");
    } else {
        println!("RUN FAILED");
    }
    println!("{}", "=".repeat(80));

    if let Some(ref cleaning) = report.cleaning {
        print_cleaning(cleaning);
    }
    if let Some(ref aggregation) = report.aggregation {
        print_aggregation(aggregation, pipeline);
    }
    if let Some(conserved) = report.totals_conserved {
        println!();
        println!(
            "Totals conserved: {}",
            if conserved { "yes" } else { "NO" }
        );
    }
    if let Some(ref failure) = report.failure {
        println!();
        println!("Error [{}]: {}", failure.code, failure.message);
        if failure.data_error {
            println!("  The input data could not be processed; fix the file and rerun.");
        }
        if !failure.states.is_empty() {
            let reached: Vec<&str> = failure.states.iter().map(|s| s.name()).collect();
            println!("  States: {}", reached.join(" -> "));
        }
    }

    println!();
    println!("Use --json for machine-readable output");
    println!("Use --emit-report <file> to save the JSON run report");
    println!("{}", "=".repeat(80));
}

fn print_cleaning(summary: &CleaningSummary) {
    println!();
    println!("Cleaning:");
    println!("  Input:  {}", summary.input_file.display());
    println!("  Output: {}", summary.output_file.display());
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} -> {} ({} incomplete, {} duplicates removed)",
        summary.rows_loaded,
        summary.rows_written,
        summary.incomplete_rows_removed,
        summary.duplicates_removed
    );
    if summary.duplicates_found > summary.duplicates_removed {
        println!(
            "  ! {} duplicate rows kept (report-only policy)",
            summary.duplicates_found - summary.duplicates_removed
        );
    }
    println!("  Amount total: {:.2}", summary.amount_total);
}

fn print_aggregation(summary: &AggregationSummary, pipeline: &Pipeline) {
    println!();
    println!("Aggregation:");
    println!("  Input:  {}", summary.input_file.display());
    println!("  Output: {}", summary.output_file.display());
    println!("  Duration: {}ms", summary.duration_ms);
    println!("  Keys: {}", summary.groups);
    println!("  Grand total: {:.2}", summary.grand_total);

    match read_output_dataframe(pipeline, &summary.output_file) {
        Ok(df) => {
            println!();
            println!("The final output CSV (cleaned and transformed):");
            println!("{}", df);
        }
        Err(err) => error!("Could not read {}: {:#}", summary.output_file.display(), err),
    }
}

/// Read an output file back for display.
fn read_output_dataframe(pipeline: &Pipeline, path: &Path) -> Result<DataFrame> {
    let df = Loader::from_config(pipeline.config())
        .load(path)
        .with_context(|| format!("Reading {}", path.display()))?;
    Ok(df)
}
