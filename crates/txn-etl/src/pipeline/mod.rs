//! Pipeline module.
//!
//! This module provides the pipeline that drives both halves of a run, the
//! dataset state machine, and progress reporting.

mod builder;
pub mod progress;
pub mod state;

pub use builder::{Pipeline, PipelineBuilder};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
pub use state::{PipelineHalf, PipelineState, StateLog};
