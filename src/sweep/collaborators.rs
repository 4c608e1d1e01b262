//! Collaborator contracts
//!
//! Training, vectorization and evaluation are supplied from outside the
//! orchestrator. Their failures surface as `anyhow::Error` and are never
//! interpreted here.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::environment::{EnvFactory, Environment, VecEnvironment};
use super::metrics::EpisodeRecord;
use super::params::ParamMap;
use super::presets::PresetRegistry;

/// Handle to a trainable policy family
///
/// The name is the key every result is indexed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Algorithm {
    name: String,
}

impl Algorithm {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Algorithm {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// How much progress output a collaborator should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    #[default]
    Quiet,
    Progress,
}

impl Verbosity {
    pub fn from_flag(verbose: bool) -> Self {
        if verbose {
            Verbosity::Progress
        } else {
            Verbosity::Quiet
        }
    }

    pub fn is_verbose(self) -> bool {
        matches!(self, Verbosity::Progress)
    }
}

/// Raw output of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// One total reward per evaluated episode
    pub rewards: Vec<f64>,
    /// One record per evaluated episode
    pub episodes: Vec<EpisodeRecord>,
}

/// Training collaborator for environments of type `E`
pub trait Trainer<E: Environment> {
    /// Trained policy handle
    type Model;
    /// Vectorized training surface
    type Parallel: VecEnvironment;

    /// Registry the named presets for this trainer resolve against
    fn presets(&self) -> &dyn PresetRegistry;

    /// Replicate the training factory `parallelism` times
    fn make_parallel(
        &self,
        factory: &EnvFactory<E>,
        parallelism: usize,
    ) -> anyhow::Result<Self::Parallel>;

    fn train(
        &self,
        algorithm: &Algorithm,
        env: &mut Self::Parallel,
        config: &ParamMap,
        total_steps: u64,
        verbosity: Verbosity,
    ) -> anyhow::Result<Self::Model>;
}

/// Evaluation collaborator: rolls a trained model out for `episodes` episodes
pub trait Evaluator<E: Environment, M> {
    fn evaluate(&self, model: &M, env: &mut E, episodes: usize) -> anyhow::Result<Evaluation>;
}
