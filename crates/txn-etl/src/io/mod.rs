//! Delimited-file boundary of the pipeline.
//!
//! The two halves of a run only meet through files written by the
//! [`Persister`] and read back by the [`Loader`].

mod loader;
mod persister;

pub use loader::Loader;
pub use persister::Persister;

/// Field delimiter for every file the pipeline reads or writes.
pub const FIELD_DELIMITER: u8 = b',';

/// Quote character for fields containing the delimiter, quotes or newlines.
pub const QUOTE_CHAR: u8 = b'"';
