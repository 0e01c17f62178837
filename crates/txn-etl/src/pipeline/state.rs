//! Dataset lifecycle within one half of a run.
//!
//! The cleaning half moves a dataset through
//! `Loaded -> RowsCleaned -> Deduplicated -> Normalized -> Persisted`; the
//! aggregation half through `Loaded -> Aggregated -> Persisted`. Any stage
//! can instead end the half in `Failed`. Both `Persisted` and `Failed` are
//! terminal.

use super::PipelineStage;
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which half of the pipeline a [`StateLog`] tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineHalf {
    Cleaning,
    Aggregation,
}

/// A dataset state, with the counts observed on entering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Loaded { rows: usize },
    RowsCleaned { rows: usize, removed: usize },
    Deduplicated { rows: usize, removed: usize },
    Normalized { rows: usize },
    Aggregated { groups: usize },
    Persisted { path: PathBuf, rows: usize },
    Failed { stage: PipelineStage, reason: String },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loaded { .. } => "loaded",
            Self::RowsCleaned { .. } => "rows_cleaned",
            Self::Deduplicated { .. } => "deduplicated",
            Self::Normalized { .. } => "normalized",
            Self::Aggregated { .. } => "aggregated",
            Self::Persisted { .. } => "persisted",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted { .. } | Self::Failed { .. })
    }
}

/// Ordered record of the states one half went through.
///
/// Transitions are checked: a state can only be entered from its
/// predecessor in the half's sequence, and nothing follows a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLog {
    half: PipelineHalf,
    states: Vec<PipelineState>,
}

impl StateLog {
    pub fn new(half: PipelineHalf) -> Self {
        Self {
            half,
            states: Vec::new(),
        }
    }

    pub fn half(&self) -> PipelineHalf {
        self.half
    }

    pub fn current(&self) -> Option<&PipelineState> {
        self.states.last()
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<PipelineState> {
        self.states
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.current(), Some(PipelineState::Failed { .. }))
    }

    /// Enter `next`.
    ///
    /// Returns [`EtlError::Internal`] if `next` does not follow the current
    /// state. Use [`fail`](Self::fail) to enter `Failed`.
    pub fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.allows(&next) {
            return Err(EtlError::Internal(format!(
                "invalid {:?} transition from {} to {}",
                self.half,
                self.current().map(PipelineState::name).unwrap_or("start"),
                next.name()
            )));
        }
        self.states.push(next);
        Ok(())
    }

    /// End the half in `Failed`. Ignored if the half already ended.
    pub fn fail(&mut self, stage: PipelineStage, reason: impl Into<String>) {
        if self.current().is_some_and(PipelineState::is_terminal) {
            return;
        }
        self.states.push(PipelineState::Failed {
            stage,
            reason: reason.into(),
        });
    }

    fn allows(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        let current = self.current();
        match (self.half, current, next) {
            (_, None, Loaded { .. }) => true,
            (PipelineHalf::Cleaning, Some(Loaded { .. }), RowsCleaned { .. }) => true,
            (PipelineHalf::Cleaning, Some(RowsCleaned { .. }), Deduplicated { .. }) => true,
            (PipelineHalf::Cleaning, Some(Deduplicated { .. }), Normalized { .. }) => true,
            (PipelineHalf::Cleaning, Some(Normalized { .. }), Persisted { .. }) => true,
            (PipelineHalf::Aggregation, Some(Loaded { .. }), Aggregated { .. }) => true,
            (PipelineHalf::Aggregation, Some(Aggregated { .. }), Persisted { .. }) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cleaning_sequence() {
        let mut log = StateLog::new(PipelineHalf::Cleaning);
        log.advance(PipelineState::Loaded { rows: 12 }).unwrap();
        log.advance(PipelineState::RowsCleaned { rows: 8, removed: 4 })
            .unwrap();
        log.advance(PipelineState::Deduplicated { rows: 8, removed: 0 })
            .unwrap();
        log.advance(PipelineState::Normalized { rows: 8 }).unwrap();
        log.advance(PipelineState::Persisted {
            path: PathBuf::from("cleaned_data.csv"),
            rows: 8,
        })
        .unwrap();

        let names: Vec<&str> = log.states().iter().map(PipelineState::name).collect();
        assert_eq!(
            names,
            vec!["loaded", "rows_cleaned", "deduplicated", "normalized", "persisted"]
        );
        assert!(log.current().unwrap().is_terminal());
    }

    #[test]
    fn test_stages_cannot_be_skipped() {
        let mut log = StateLog::new(PipelineHalf::Cleaning);
        log.advance(PipelineState::Loaded { rows: 1 }).unwrap();
        let err = log
            .advance(PipelineState::Normalized { rows: 1 })
            .unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert_eq!(log.states().len(), 1);
    }

    #[test]
    fn test_aggregation_sequence_rejects_cleaning_states() {
        let mut log = StateLog::new(PipelineHalf::Aggregation);
        log.advance(PipelineState::Loaded { rows: 8 }).unwrap();
        assert!(
            log.advance(PipelineState::RowsCleaned { rows: 8, removed: 0 })
                .is_err()
        );
        log.advance(PipelineState::Aggregated { groups: 4 }).unwrap();
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut log = StateLog::new(PipelineHalf::Cleaning);
        log.advance(PipelineState::Loaded { rows: 3 }).unwrap();
        log.fail(PipelineStage::Normalizing, "bad amount");
        log.fail(PipelineStage::Persisting, "ignored");

        assert!(log.is_failed());
        assert_eq!(log.states().len(), 2);
        assert!(
            log.advance(PipelineState::RowsCleaned { rows: 3, removed: 0 })
                .is_err()
        );
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&PipelineState::Failed {
            stage: PipelineStage::Loading,
            reason: "missing".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"state\":\"failed\""));
        assert!(json.contains("\"stage\":\"loading\""));
    }
}
