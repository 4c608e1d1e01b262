//! Experiment results
//!
//! A cell either produced a full [`ExperimentResult`] or only an error
//! description. Consumers must match on [`ExperimentOutcome`] before reading
//! any metric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collaborators::Evaluation;
use super::labeled::Labeled;
use super::metrics::{EpisodeRecord, PhaseMetrics};
use super::params::ResolvedConfig;

/// Raw evaluation output plus its derived scalars
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseResult {
    pub rewards: Vec<f64>,
    pub episodes: Vec<EpisodeRecord>,
    pub metrics: PhaseMetrics,
}

impl PhaseResult {
    pub fn from_evaluation(evaluation: Evaluation) -> Self {
        let metrics = PhaseMetrics::from_evaluation(&evaluation);
        Self {
            rewards: evaluation.rewards,
            episodes: evaluation.episodes,
            metrics,
        }
    }
}

/// Output of one successful single-experiment run
///
/// The model handle is not serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = ""))]
pub struct ExperimentResult<M> {
    pub run_id: Uuid,
    #[serde(skip)]
    pub model: M,
    pub algorithm: String,
    pub config: ResolvedConfig,
    pub total_steps: u64,
    pub train: PhaseResult,
    pub test: PhaseResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<M> ExperimentResult<M> {
    /// Label the run is reported under (preset name or `custom`)
    pub fn label(&self) -> &str {
        self.config.label()
    }
}

/// Description of a failed cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
}

/// Result stored at one cell of a sweep
#[derive(Debug, Clone, Serialize)]
#[serde(untagged, bound(serialize = ""))]
pub enum ExperimentOutcome<M> {
    Success(Box<ExperimentResult<M>>),
    Error(ErrorResult),
}

impl<M> ExperimentOutcome<M> {
    pub fn success(result: ExperimentResult<M>) -> Self {
        ExperimentOutcome::Success(Box::new(result))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ExperimentOutcome::Error(ErrorResult {
            error: error.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ExperimentOutcome::Error(_))
    }

    pub fn as_success(&self) -> Option<&ExperimentResult<M>> {
        match self {
            ExperimentOutcome::Success(result) => Some(result),
            ExperimentOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExperimentOutcome::Success(_) => None,
            ExperimentOutcome::Error(err) => Some(&err.error),
        }
    }
}

/// Single-dimension comparison keyed by algorithm, preset or environment
pub type Comparison<M> = Labeled<ExperimentOutcome<M>>;

/// Algorithm -> environment -> run label -> outcome
pub type SweepResult<M> = Labeled<Labeled<Labeled<ExperimentOutcome<M>>>>;

/// Count `(succeeded, failed)` cells in a sweep
pub fn tally<M>(sweep: &SweepResult<M>) -> (usize, usize) {
    sweep
        .values()
        .flat_map(|envs| envs.values())
        .flat_map(|cells| cells.values())
        .fold((0, 0), |(ok, failed), outcome| {
            if outcome.is_error() {
                (ok, failed + 1)
            } else {
                (ok + 1, failed)
            }
        })
}
