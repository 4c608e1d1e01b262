//! Sweep Orchestrator
//!
//! Turns algorithm, preset and environment comparisons (and their full cross
//! product) into cell-by-cell executions. Every comparison is built from one
//! [`SweepPlan`] traversal; a failing cell is recorded as an error result
//! and never stops the cells after it.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::collaborators::{Algorithm, Evaluator, Trainer};
use super::environment::{Environment, EnvironmentPair};
use super::executor::{ExperimentExecutor, RunSettings};
use super::labeled::Labeled;
use super::params::{ConfigResolver, ResolvedConfig};
use super::plan::{CellConfig, CellSpec, SweepPlan};
use super::presets::{PRESET_COMPARISON_DEFAULTS, SWEEP_PRESET_DEFAULTS};
use super::result::{tally, Comparison, ExperimentOutcome, ExperimentResult, SweepResult};
use crate::error::Result;

/// Key used for the lone environment of single-environment comparisons
const SOLE_ENVIRONMENT: &str = "environment";

/// Runs sweeps of single experiments, one cell at a time
pub struct SweepRunner<T, V> {
    executor: ExperimentExecutor<T, V>,
    settings: RunSettings,
}

impl<T, V> SweepRunner<T, V> {
    pub fn new(trainer: T, evaluator: V) -> Self {
        Self {
            executor: ExperimentExecutor::new(trainer, evaluator),
            settings: RunSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn executor(&self) -> &ExperimentExecutor<T, V> {
        &self.executor
    }

    /// Run one experiment without failure isolation
    ///
    /// An explicit config takes precedence over `preset`.
    pub fn run_single_experiment<E>(
        &self,
        algorithm: &Algorithm,
        envs: &EnvironmentPair<E>,
        preset: Option<&str>,
        explicit: Option<&Value>,
    ) -> Result<ExperimentResult<T::Model>>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let config = ConfigResolver::new(self.executor.trainer().presets())
            .resolve(algorithm, preset, explicit)?;
        self.executor.run(algorithm, envs, config, &self.settings)
    }

    /// Compare algorithms on one environment under one preset
    pub fn run_algorithm_comparison<E>(
        &self,
        algorithms: &[Algorithm],
        envs: &EnvironmentPair<E>,
        preset: &str,
    ) -> Result<Comparison<T::Model>>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        info!(
            algorithms = algorithms.len(),
            preset,
            total_steps = self.settings.total_steps,
            "Algorithm comparison"
        );
        let environments = sole_environment(envs);
        let plan = SweepPlan::cross(
            algorithms,
            environments.keys(),
            &[preset.to_string()],
            &BTreeMap::new(),
        )?;

        Ok(self
            .traverse(&plan, &environments)
            .into_iter()
            .map(|(cell, outcome)| (cell.algorithm.name().to_string(), outcome))
            .collect())
    }

    /// Compare presets for one algorithm on one environment
    ///
    /// `None` compares `default`, `explorative` and `conservative`.
    pub fn run_preset_comparison<E>(
        &self,
        algorithm: &Algorithm,
        envs: &EnvironmentPair<E>,
        presets: Option<&[String]>,
    ) -> Result<Comparison<T::Model>>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let presets = presets_or(presets, &PRESET_COMPARISON_DEFAULTS);
        info!(%algorithm, presets = ?presets, "Preset comparison");
        let environments = sole_environment(envs);
        let plan = SweepPlan::cross(
            std::slice::from_ref(algorithm),
            environments.keys(),
            &presets,
            &BTreeMap::new(),
        )?;

        Ok(self
            .traverse(&plan, &environments)
            .into_iter()
            .map(|(cell, outcome)| (cell.label().to_string(), outcome))
            .collect())
    }

    /// Compare environments for one algorithm under one preset
    pub fn run_environment_comparison<E>(
        &self,
        algorithm: &Algorithm,
        environments: &Labeled<EnvironmentPair<E>>,
        preset: &str,
    ) -> Result<Comparison<T::Model>>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        info!(
            %algorithm,
            preset,
            environments = ?environments.keys().collect::<Vec<_>>(),
            "Environment comparison"
        );
        let plan = SweepPlan::cross(
            std::slice::from_ref(algorithm),
            environments.keys(),
            &[preset.to_string()],
            &BTreeMap::new(),
        )?;

        Ok(self
            .traverse(&plan, environments)
            .into_iter()
            .map(|(cell, outcome)| (cell.environment, outcome))
            .collect())
    }

    /// Plan a comprehensive sweep without running it
    pub fn describe_comprehensive<E>(
        &self,
        algorithms: &[Algorithm],
        environments: &Labeled<EnvironmentPair<E>>,
        presets: Option<&[String]>,
        custom_configs: &BTreeMap<String, Value>,
    ) -> Result<SweepPlan> {
        let presets = presets_or(presets, &SWEEP_PRESET_DEFAULTS);
        SweepPlan::cross(algorithms, environments.keys(), &presets, custom_configs)
    }

    /// Run the full algorithms x environments x (presets | custom) matrix
    ///
    /// `None` presets means `default` and `explorative`. Invalid custom
    /// configurations fail the whole sweep before any cell runs.
    pub fn run_comprehensive<E>(
        &self,
        algorithms: &[Algorithm],
        environments: &Labeled<EnvironmentPair<E>>,
        presets: Option<&[String]>,
        custom_configs: &BTreeMap<String, Value>,
    ) -> Result<SweepResult<T::Model>>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let plan =
            self.describe_comprehensive(algorithms, environments, presets, custom_configs)?;
        info!(
            algorithms = ?algorithms.iter().map(Algorithm::name).collect::<Vec<_>>(),
            environments = ?environments.keys().collect::<Vec<_>>(),
            custom = ?custom_configs.keys().collect::<Vec<_>>(),
            total_combinations = plan.len(),
            "Comprehensive sweep"
        );

        // Every algorithm and environment gets its slot even if no cell lands in it
        let mut results: SweepResult<T::Model> = Labeled::with_capacity(algorithms.len());
        for algorithm in algorithms {
            let by_env = results.get_or_insert_with(algorithm.name(), Labeled::new);
            for env_name in environments.keys() {
                by_env.insert(env_name, Labeled::new());
            }
        }

        for (cell, outcome) in self.traverse(&plan, environments) {
            results
                .get_or_insert_with(cell.algorithm.name(), Labeled::new)
                .get_or_insert_with(&cell.environment, Labeled::new)
                .insert(cell.label(), outcome);
        }

        let (succeeded, failed) = tally(&results);
        info!(succeeded, failed, "Comprehensive sweep finished");
        Ok(results)
    }

    /// Execute every cell of `plan` in order
    fn traverse<E>(
        &self,
        plan: &SweepPlan,
        environments: &Labeled<EnvironmentPair<E>>,
    ) -> Vec<(CellSpec, ExperimentOutcome<T::Model>)>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let sweep_id = Uuid::new_v4();
        info!(%sweep_id, cells = plan.len(), "Starting sweep");

        let mut outcomes = Vec::with_capacity(plan.len());
        for (idx, cell) in plan.cells().iter().enumerate() {
            info!(
                %sweep_id,
                cell = idx + 1,
                of = plan.len(),
                "Running: {} + {} + {}",
                cell.algorithm,
                cell.environment,
                cell.label()
            );
            let outcome = match environments.get(&cell.environment) {
                Some(envs) => self.run_cell(cell, envs),
                None => ExperimentOutcome::failure(format!(
                    "unknown environment '{}'",
                    cell.environment
                )),
            };
            if let Some(error) = outcome.error() {
                warn!(
                    %sweep_id,
                    algorithm = %cell.algorithm,
                    environment = %cell.environment,
                    config = cell.label(),
                    "Cell failed: {}",
                    error
                );
            }
            outcomes.push((cell.clone(), outcome));
        }
        outcomes
    }

    /// Run one cell, converting any error or panic into an error result
    fn run_cell<E>(
        &self,
        cell: &CellSpec,
        envs: &EnvironmentPair<E>,
    ) -> ExperimentOutcome<T::Model>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let attempt =
            panic::catch_unwind(AssertUnwindSafe(|| self.execute_cell(cell, envs)));

        match attempt {
            Ok(Ok(result)) => ExperimentOutcome::success(result),
            Ok(Err(err)) => ExperimentOutcome::failure(err.to_string()),
            Err(payload) => ExperimentOutcome::failure(panic_message(payload.as_ref())),
        }
    }

    fn execute_cell<E>(
        &self,
        cell: &CellSpec,
        envs: &EnvironmentPair<E>,
    ) -> Result<ExperimentResult<T::Model>>
    where
        E: Environment,
        T: Trainer<E>,
        V: Evaluator<E, T::Model>,
    {
        let config = match &cell.config {
            CellConfig::Custom(params) => ResolvedConfig::custom(params.clone()),
            CellConfig::Preset(name) => {
                ConfigResolver::new(self.executor.trainer().presets()).resolve(
                    &cell.algorithm,
                    Some(name.as_str()),
                    None,
                )?
            }
        };
        self.executor.run(&cell.algorithm, envs, config, &self.settings)
    }
}

fn sole_environment<E>(envs: &EnvironmentPair<E>) -> Labeled<EnvironmentPair<E>> {
    let mut environments = Labeled::with_capacity(1);
    environments.insert(SOLE_ENVIRONMENT, envs.clone());
    environments
}

fn presets_or(presets: Option<&[String]>, defaults: &[&str]) -> Vec<String> {
    match presets {
        Some(presets) => presets.to_vec(),
        None => defaults.iter().map(|p| p.to_string()).collect(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {msg}")
    } else {
        "panic: unknown payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extracts_text() {
        let payload: Box<dyn Any + Send> = Box::new("index out of bounds");
        assert_eq!(panic_message(payload.as_ref()), "panic: index out of bounds");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bad state"));
        assert_eq!(panic_message(payload.as_ref()), "panic: bad state");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "panic: unknown payload");
    }

    #[test]
    fn test_presets_or_defaults() {
        assert_eq!(
            presets_or(None, &PRESET_COMPARISON_DEFAULTS),
            vec!["default", "explorative", "conservative"]
        );
        assert_eq!(
            presets_or(None, &SWEEP_PRESET_DEFAULTS),
            vec!["default", "explorative"]
        );
        let custom = vec!["conservative".to_string()];
        assert_eq!(presets_or(Some(&custom), &SWEEP_PRESET_DEFAULTS), custom);
    }
}
