//! Experiment sweep orchestration
//!
//! Drives training and evaluation of RL trading policies across algorithms,
//! hyperparameter presets and market environments, isolating each cell's
//! failure and collecting ordered, comparable results.

pub mod aggregate;
pub mod collaborators;
pub mod environment;
pub mod executor;
pub mod labeled;
pub mod metrics;
pub mod params;
pub mod plan;
pub mod presets;
pub mod result;
pub mod runner;

pub use aggregate::{
    action_breakdown, action_breakdowns, summarize_comparison, summarize_sweep, ComparisonView,
    RowCells, SummaryRow, ViewKind,
};
pub use collaborators::{Algorithm, Evaluation, Evaluator, Trainer, Verbosity};
pub use environment::{EnvFactory, Environment, EnvironmentPair, ParallelEnv, VecEnvironment};
pub use executor::{ExperimentExecutor, RunSettings};
pub use labeled::Labeled;
pub use metrics::{
    average_return_pct, compare_actions, mean, population_std, ActionStats, ActionUsageRow,
    EpisodeOutcome, EpisodeRecord, PhaseMetrics, TopAction,
};
pub use params::{
    custom_config, validate_explicit, ConfigResolver, ConfigSource, ParamMap, ResolvedConfig,
    CUSTOM_LABEL,
};
pub use plan::{CellConfig, CellSpec, SweepPlan};
pub use presets::{
    BuiltinPresets, PresetRegistry, DEFAULT_PRESET, PRESET_COMPARISON_DEFAULTS,
    SWEEP_PRESET_DEFAULTS,
};
pub use result::{
    tally, Comparison, ErrorResult, ExperimentOutcome, ExperimentResult, PhaseResult, SweepResult,
};
pub use runner::SweepRunner;
