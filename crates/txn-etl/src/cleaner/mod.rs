//! Cleaning stages applied to a freshly loaded dataset.
//!
//! This module provides:
//! - Removal of rows with any missing cell
//! - Content-hash deduplication
//! - Coercion of the amount column to `Float64`
//!
//! Each stage takes a dataset and returns a new one; the pipeline chains
//! them in that order.

mod amount;
mod dedup;
mod rows;

pub use amount::AmountNormalizer;
pub use dedup::{DedupOutcome, Deduplicator, canonical_key_text, digest_key};
pub use rows::RowCleaner;
