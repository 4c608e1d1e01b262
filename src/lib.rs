pub mod config;
pub mod error;
pub mod sim;
pub mod sweep;

pub use config::AppConfig;
pub use error::{Result, SweepError};
pub use sweep::{
    Algorithm, ComparisonView, EnvironmentPair, ExperimentOutcome, ExperimentResult, Labeled,
    RunSettings, SweepPlan, SweepResult, SweepRunner,
};
