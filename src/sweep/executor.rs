//! Single-Experiment Executor
//!
//! Runs one (algorithm, environment pair, resolved config) triple through
//! training, train-data evaluation and test-data evaluation, strictly in
//! that order. Collaborator failures propagate unchanged; isolating them is
//! the sweep runner's job.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::collaborators::{Algorithm, Evaluator, Trainer, Verbosity};
use super::environment::{
    close_env, close_parallel, with_scoped, EnvFactory, Environment, EnvironmentPair,
};
use super::params::ResolvedConfig;
use super::result::{ExperimentResult, PhaseResult};
use crate::error::{Result, SweepError};

/// Step budget and evaluation sizing shared by every cell of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Training step budget per run
    pub total_steps: u64,
    /// Replicas of the training environment
    pub parallelism: usize,
    /// Episodes per evaluation phase
    pub eval_episodes: usize,
    pub verbosity: Verbosity,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            total_steps: 50_000,
            parallelism: 4,
            eval_episodes: 5,
            verbosity: Verbosity::Quiet,
        }
    }
}

/// Evaluation phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    TrainData,
    TestData,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::TrainData => "train evaluation",
            Phase::TestData => "test evaluation",
        }
    }
}

/// Runs single experiments against a trainer and an evaluator
pub struct ExperimentExecutor<T, V> {
    trainer: T,
    evaluator: V,
}

impl<T, V> ExperimentExecutor<T, V> {
    pub fn new(trainer: T, evaluator: V) -> Self {
        Self { trainer, evaluator }
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    pub fn evaluator(&self) -> &V {
        &self.evaluator
    }

    /// Train and evaluate once
    pub fn run<E>(
        &self,
        algorithm: &Algorithm,
        envs: &EnvironmentPair<E>,
        config: ResolvedConfig,
        settings: &RunSettings,
    ) -> Result<ExperimentResult<T::Model>>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            %run_id,
            %algorithm,
            config = config.label(),
            total_steps = settings.total_steps,
            "Running single experiment"
        );

        // Training phase: the replicated surface is closed whether or not training succeeds
        let parallel = self
            .trainer
            .make_parallel(envs.train_factory(), settings.parallelism)?;
        let model = with_scoped(parallel, close_parallel::<T::Parallel>, "training", |env| {
            Ok(self.trainer.train(
                algorithm,
                env,
                &config.params,
                settings.total_steps,
                settings.verbosity,
            )?)
        })?;
        debug!(%run_id, "Training complete");

        let train =
            self.evaluate_phase(&model, envs.train_factory(), Phase::TrainData, settings)?;
        let test =
            self.evaluate_phase(&model, envs.test_factory(), Phase::TestData, settings)?;

        info!(
            %run_id,
            %algorithm,
            train_return_pct = train.metrics.avg_return_pct,
            test_return_pct = test.metrics.avg_return_pct,
            "Experiment complete"
        );

        Ok(ExperimentResult {
            run_id,
            model,
            algorithm: algorithm.name().to_string(),
            config,
            total_steps: settings.total_steps,
            train,
            test,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn evaluate_phase<E>(
        &self,
        model: &T::Model,
        factory: &EnvFactory<E>,
        phase: Phase,
        settings: &RunSettings,
    ) -> Result<PhaseResult>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let env = factory().map_err(|e| {
            SweepError::contract_violation(
                phase.name(),
                format!("environment factory failed: {e:#}"),
            )
        })?;

        let evaluation = with_scoped(env, close_env::<E>, phase.name(), |env| {
            env.reset().map_err(|e| {
                SweepError::contract_violation(
                    phase.name(),
                    format!("reset before use failed: {e:#}"),
                )
            })?;
            Ok(self.evaluator.evaluate(model, env, settings.eval_episodes)?)
        })?;
        debug!(
            phase = phase.name(),
            episodes = evaluation.episodes.len(),
            "Evaluation complete"
        );

        Ok(PhaseResult::from_evaluation(evaluation))
    }
}
