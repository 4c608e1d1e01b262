//! Named hyperparameter presets
//!
//! Recognized preset names and their parameters belong to the training
//! side; the orchestrator only asks a registry to resolve them.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::collaborators::Algorithm;
use super::params::ParamMap;
use crate::error::{Result, SweepError};

/// Preset used when neither a preset nor an explicit map is given
pub const DEFAULT_PRESET: &str = "default";

/// Presets compared by a preset comparison when none are supplied
pub const PRESET_COMPARISON_DEFAULTS: [&str; 3] = ["default", "explorative", "conservative"];

/// Presets crossed by a comprehensive sweep when none are supplied
pub const SWEEP_PRESET_DEFAULTS: [&str; 2] = ["default", "explorative"];

/// Resolves preset names to parameter maps
#[cfg_attr(test, mockall::automock)]
pub trait PresetRegistry {
    /// Parameters for `name`, or `SweepError::UnknownPreset`
    fn preset(&self, algorithm: &Algorithm, name: &str) -> Result<ParamMap>;
}

/// In-memory preset table keyed by algorithm name, then preset name
#[derive(Debug, Clone, Default)]
pub struct BuiltinPresets {
    table: BTreeMap<String, BTreeMap<String, ParamMap>>,
}

impl BuiltinPresets {
    /// Empty registry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Standard presets for the common policy-gradient and actor-critic families
    pub fn standard() -> Self {
        Self::empty()
            .with_preset("PPO", "default", ppo(3e-4, 0.01, 0.2, 10))
            .with_preset("PPO", "explorative", ppo(5e-4, 0.05, 0.3, 10))
            .with_preset("PPO", "conservative", ppo(1e-4, 0.0, 0.1, 5))
            .with_preset("A2C", "default", a2c(7e-4, 0.0, 5))
            .with_preset("A2C", "explorative", a2c(1e-3, 0.05, 8))
            .with_preset("A2C", "conservative", a2c(3e-4, 0.0, 16))
            .with_preset("SAC", "default", sac(3e-4, json!("auto"), 256))
            .with_preset("SAC", "explorative", sac(5e-4, json!(0.2), 256))
            .with_preset("SAC", "conservative", sac(1e-4, json!(0.05), 512))
    }

    pub fn with_preset(
        mut self,
        algorithm: impl Into<String>,
        name: impl Into<String>,
        params: ParamMap,
    ) -> Self {
        self.table
            .entry(algorithm.into())
            .or_default()
            .insert(name.into(), params);
        self
    }
}

impl PresetRegistry for BuiltinPresets {
    fn preset(&self, algorithm: &Algorithm, name: &str) -> Result<ParamMap> {
        self.table
            .get(algorithm.name())
            .and_then(|presets| presets.get(name))
            .cloned()
            .ok_or_else(|| SweepError::UnknownPreset {
                algorithm: algorithm.name().to_string(),
                preset: name.to_string(),
            })
    }
}

fn object(value: Value) -> ParamMap {
    match value {
        Value::Object(map) => map,
        _ => ParamMap::new(),
    }
}

fn ppo(learning_rate: f64, ent_coef: f64, clip_range: f64, n_epochs: u32) -> ParamMap {
    object(json!({
        "learning_rate": learning_rate,
        "n_steps": 2048,
        "batch_size": 64,
        "n_epochs": n_epochs,
        "gamma": 0.99,
        "gae_lambda": 0.95,
        "clip_range": clip_range,
        "ent_coef": ent_coef,
        "vf_coef": 0.5,
        "max_grad_norm": 0.5,
    }))
}

fn a2c(learning_rate: f64, ent_coef: f64, n_steps: u32) -> ParamMap {
    object(json!({
        "learning_rate": learning_rate,
        "n_steps": n_steps,
        "gamma": 0.99,
        "gae_lambda": 1.0,
        "ent_coef": ent_coef,
        "vf_coef": 0.25,
    }))
}

fn sac(learning_rate: f64, ent_coef: Value, batch_size: u32) -> ParamMap {
    object(json!({
        "learning_rate": learning_rate,
        "buffer_size": 1_000_000,
        "batch_size": batch_size,
        "gamma": 0.99,
        "tau": 0.005,
        "ent_coef": ent_coef,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_presets_cover_comparison_defaults() {
        let presets = BuiltinPresets::standard();
        for algo in ["PPO", "A2C", "SAC"] {
            let algorithm = Algorithm::new(algo);
            for name in PRESET_COMPARISON_DEFAULTS {
                assert!(
                    presets.preset(&algorithm, name).is_ok(),
                    "{algo} should define preset {name}"
                );
            }
        }
    }

    #[test]
    fn test_unknown_preset() {
        let presets = BuiltinPresets::standard();
        let err = presets
            .preset(&Algorithm::new("PPO"), "reckless")
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown preset 'reckless' for PPO");
    }

    #[test]
    fn test_unknown_algorithm_has_no_presets() {
        let presets = BuiltinPresets::standard();
        let algorithm = Algorithm::new("DQN");
        assert!(presets.preset(&algorithm, "default").is_err());
    }

    #[test]
    fn test_with_preset_overrides() {
        let presets = BuiltinPresets::standard().with_preset(
            "PPO",
            "default",
            object(json!({"learning_rate": 0.01})),
        );
        let params = presets.preset(&Algorithm::new("PPO"), "default").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params["learning_rate"], json!(0.01));
    }
}
