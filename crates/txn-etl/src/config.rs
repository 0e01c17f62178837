//! Configuration types for the cleaning and aggregation pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use crate::error::{EtlError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the working column holding each row's deduplication key.
pub const DEDUP_KEY_COLUMN: &str = "unique_id";

/// Name of the working column carrying each row's position in the input file.
pub const SOURCE_ROW_COLUMN: &str = "__source_row";

/// Column names the pipeline adds itself.
const RESERVED_COLUMNS: [&str; 2] = [DEDUP_KEY_COLUMN, SOURCE_ROW_COLUMN];

/// Default column holding the grouping key.
pub const DEFAULT_KEY_COLUMN: &str = "customer_id";

/// Default column holding the amount to coerce and sum.
pub const DEFAULT_AMOUNT_COLUMN: &str = "transaction_amount";

/// Default name of the summed column in the aggregate.
pub const DEFAULT_TOTAL_COLUMN: &str = "total_transaction_amount";

/// Cell texts read as missing at load time, in addition to empty fields.
pub const DEFAULT_NULL_VALUES: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Which columns feed the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupColumns {
    /// Every column of the dataset, in schema order
    #[default]
    All,
    /// The listed columns, in the listed order
    Subset(Vec<String>),
}

impl DedupColumns {
    /// Build a subset selection from column names.
    pub fn subset<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DedupColumns::Subset(columns.into_iter().map(Into::into).collect())
    }
}

/// What the deduplication stage does with the rows it identifies as repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DuplicatePolicy {
    /// Drop repeated rows; the filtered dataset flows downstream
    #[default]
    Remove,
    /// Count and report repeated rows but keep the dataset unfiltered
    ReportOnly,
}

/// Configuration for the pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use txn_etl::config::{DedupColumns, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .key_column("account")
///     .dedup_columns(DedupColumns::subset(["account", "amount", "date"]))
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Column rows are grouped by during aggregation.
    /// Default: "customer_id"
    pub key_column: String,

    /// Column coerced to float and summed.
    /// Default: "transaction_amount"
    pub amount_column: String,

    /// Name of the summed column in the aggregate output.
    /// Default: "total_transaction_amount"
    pub total_column: String,

    /// Columns that feed the deduplication key.
    /// Default: All
    pub dedup_columns: DedupColumns,

    /// What happens to rows whose key repeats an earlier row's key.
    /// Default: Remove
    pub duplicate_policy: DuplicatePolicy,

    /// Whether the `unique_id` working column is written to the cleaned file.
    /// Default: false
    pub persist_dedup_key: bool,

    /// Cell texts treated as missing when loading.
    /// Default: [`DEFAULT_NULL_VALUES`]
    pub null_values: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            amount_column: DEFAULT_AMOUNT_COLUMN.to_string(),
            total_column: DEFAULT_TOTAL_COLUMN.to_string(),
            dedup_columns: DedupColumns::default(),
            duplicate_policy: DuplicatePolicy::default(),
            persist_dedup_key: false,
            null_values: default_null_values(),
        }
    }
}

fn default_null_values() -> Vec<String> {
    DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect()
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read a configuration from a JSON file and validate it.
    ///
    /// Fields absent from the file take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(EtlError::from)
            .context(format!("Reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        for (field, value) in [
            ("key_column", &self.key_column),
            ("amount_column", &self.amount_column),
            ("total_column", &self.total_column),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
            if RESERVED_COLUMNS.contains(&value.as_str()) {
                return Err(ConfigValidationError::ReservedColumn(field.to_string()));
            }
        }

        if self.key_column == self.amount_column {
            return Err(ConfigValidationError::ColumnClash {
                first: "key_column".to_string(),
                second: "amount_column".to_string(),
                name: self.key_column.clone(),
            });
        }

        if self.total_column == self.key_column {
            return Err(ConfigValidationError::ColumnClash {
                first: "key_column".to_string(),
                second: "total_column".to_string(),
                name: self.key_column.clone(),
            });
        }

        if let DedupColumns::Subset(columns) = &self.dedup_columns {
            if columns.is_empty() {
                return Err(ConfigValidationError::EmptyDedupSubset);
            }
            if columns.iter().any(|c| RESERVED_COLUMNS.contains(&c.as_str())) {
                return Err(ConfigValidationError::ReservedColumn(
                    "dedup_columns".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(String),

    #[error("'{0}' must not use a reserved working column name ({reserved})", reserved = RESERVED_COLUMNS.join(", "))]
    ReservedColumn(String),

    #[error("'{first}' and '{second}' both name column '{name}'")]
    ColumnClash {
        first: String,
        second: String,
        name: String,
    },

    #[error("Dedup column subset must name at least one column")]
    EmptyDedupSubset,
}

impl From<ConfigValidationError> for EtlError {
    fn from(err: ConfigValidationError) -> Self {
        EtlError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    key_column: Option<String>,
    amount_column: Option<String>,
    total_column: Option<String>,
    dedup_columns: Option<DedupColumns>,
    duplicate_policy: Option<DuplicatePolicy>,
    persist_dedup_key: Option<bool>,
    null_values: Option<Vec<String>>,
}

impl PipelineConfigBuilder {
    /// Start from an existing configuration, e.g. one read from a file,
    /// so that individual setters override it.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            key_column: Some(config.key_column),
            amount_column: Some(config.amount_column),
            total_column: Some(config.total_column),
            dedup_columns: Some(config.dedup_columns),
            duplicate_policy: Some(config.duplicate_policy),
            persist_dedup_key: Some(config.persist_dedup_key),
            null_values: Some(config.null_values),
        }
    }

    /// Set the grouping key column.
    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    /// Set the amount column.
    pub fn amount_column(mut self, column: impl Into<String>) -> Self {
        self.amount_column = Some(column.into());
        self
    }

    /// Set the name of the summed column in the aggregate.
    pub fn total_column(mut self, column: impl Into<String>) -> Self {
        self.total_column = Some(column.into());
        self
    }

    /// Set which columns feed the deduplication key.
    pub fn dedup_columns(mut self, columns: DedupColumns) -> Self {
        self.dedup_columns = Some(columns);
        self
    }

    /// Set the duplicate policy.
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = Some(policy);
        self
    }

    /// Keep the `unique_id` working column in the cleaned output file.
    pub fn persist_dedup_key(mut self, persist: bool) -> Self {
        self.persist_dedup_key = Some(persist);
        self
    }

    /// Replace the list of cell texts read as missing.
    pub fn null_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.null_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            key_column: self
                .key_column
                .unwrap_or_else(|| DEFAULT_KEY_COLUMN.to_string()),
            amount_column: self
                .amount_column
                .unwrap_or_else(|| DEFAULT_AMOUNT_COLUMN.to_string()),
            total_column: self
                .total_column
                .unwrap_or_else(|| DEFAULT_TOTAL_COLUMN.to_string()),
            dedup_columns: self.dedup_columns.unwrap_or_default(),
            duplicate_policy: self.duplicate_policy.unwrap_or_default(),
            persist_dedup_key: self.persist_dedup_key.unwrap_or(false),
            null_values: self.null_values.unwrap_or_else(default_null_values),
        };

        config.validate()?;
        Ok(config)
    }
}
