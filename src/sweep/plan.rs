//! Sweep plan
//!
//! Expands algorithms x environments x (presets | custom) into the ordered
//! list of cells a sweep executes. Configuration shape is validated here,
//! before any cell runs.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::collaborators::Algorithm;
use super::params::{validate_explicit, ParamMap, CUSTOM_LABEL};
use crate::error::{Result, SweepError};

/// How one cell is configured
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellConfig {
    Preset(String),
    Custom(ParamMap),
}

impl CellConfig {
    pub fn label(&self) -> &str {
        match self {
            CellConfig::Preset(name) => name,
            CellConfig::Custom(_) => CUSTOM_LABEL,
        }
    }
}

/// One (algorithm, environment, config) combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSpec {
    pub algorithm: Algorithm,
    pub environment: String,
    pub config: CellConfig,
}

impl CellSpec {
    pub fn label(&self) -> &str {
        self.config.label()
    }
}

/// Ordered, exhaustive list of cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepPlan {
    cells: Vec<CellSpec>,
}

impl SweepPlan {
    /// Expand the full cross product
    ///
    /// Traversal order: algorithms (input order), then environments (input
    /// order), then presets (input order). An algorithm with an entry in
    /// `custom_configs` contributes exactly one `custom` cell per environment
    /// instead of one cell per preset.
    pub fn cross<'a>(
        algorithms: &[Algorithm],
        environments: impl IntoIterator<Item = &'a str>,
        presets: &[String],
        custom_configs: &BTreeMap<String, Value>,
    ) -> Result<Self> {
        ensure_unique("algorithm", algorithms.iter().map(Algorithm::name))?;
        ensure_unique("preset", presets.iter().map(String::as_str))?;

        let mut customs: BTreeMap<&str, &ParamMap> = BTreeMap::new();
        for (algo_name, config) in custom_configs {
            customs.insert(algo_name, validate_explicit(algo_name, config)?);
        }
        for algo_name in customs.keys() {
            if !algorithms.iter().any(|a| a.name() == *algo_name) {
                warn!(
                    algorithm = algo_name,
                    "Custom config given for an algorithm not in the sweep, ignoring"
                );
            }
        }

        let environments: Vec<&str> = environments.into_iter().collect();
        ensure_unique("environment", environments.iter().copied())?;

        let mut cells = Vec::new();
        for algorithm in algorithms {
            for env_name in &environments {
                match customs.get(algorithm.name()) {
                    Some(params) => cells.push(CellSpec {
                        algorithm: algorithm.clone(),
                        environment: env_name.to_string(),
                        config: CellConfig::Custom((*params).clone()),
                    }),
                    None => {
                        for preset in presets {
                            cells.push(CellSpec {
                                algorithm: algorithm.clone(),
                                environment: env_name.to_string(),
                                config: CellConfig::Preset(preset.clone()),
                            });
                        }
                    }
                }
            }
        }

        Ok(Self { cells })
    }

    pub fn cells(&self) -> &[CellSpec] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells configured by an explicit map
    pub fn custom_cells(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c.config, CellConfig::Custom(_)))
            .count()
    }
}

fn ensure_unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SweepError::DuplicateKey {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn algos(names: &[&str]) -> Vec<Algorithm> {
        names.iter().map(|n| Algorithm::new(*n)).collect()
    }

    fn presets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_cross_product_order() {
        let plan = SweepPlan::cross(
            &algos(&["PPO", "A2C"]),
            ["bull", "bear"],
            &presets(&["default", "explorative"]),
            &BTreeMap::new(),
        )
        .unwrap();

        let order: Vec<String> = plan
            .cells()
            .iter()
            .map(|c| format!("{}/{}/{}", c.algorithm, c.environment, c.label()))
            .collect();
        assert_eq!(
            order,
            vec![
                "PPO/bull/default",
                "PPO/bull/explorative",
                "PPO/bear/default",
                "PPO/bear/explorative",
                "A2C/bull/default",
                "A2C/bull/explorative",
                "A2C/bear/default",
                "A2C/bear/explorative",
            ]
        );
    }

    #[test]
    fn test_custom_config_replaces_presets_for_that_algorithm() {
        let mut custom = BTreeMap::new();
        custom.insert("PPO".to_string(), json!({"learning_rate": 0.001}));

        let plan = SweepPlan::cross(
            &algos(&["PPO", "A2C"]),
            ["bull", "bear"],
            &presets(&["default", "explorative"]),
            &custom,
        )
        .unwrap();

        // PPO: 1 custom cell per env, A2C: 2 preset cells per env
        assert_eq!(plan.len(), 6);
        assert_eq!(plan.custom_cells(), 2);
        let ppo_labels: Vec<&str> = plan
            .cells()
            .iter()
            .filter(|c| c.algorithm.name() == "PPO")
            .map(CellSpec::label)
            .collect();
        assert_eq!(ppo_labels, vec!["custom", "custom"]);
    }

    #[test]
    fn test_invalid_custom_config_fails_fast() {
        let mut custom = BTreeMap::new();
        custom.insert("SAC".to_string(), json!("fast"));

        let err = SweepPlan::cross(
            &algos(&["PPO"]),
            ["bull"],
            &presets(&["default"]),
            &custom,
        )
        .unwrap_err();

        match err {
            SweepError::InvalidConfigKind { algorithm, .. } => assert_eq!(algorithm, "SAC"),
            other => panic!("expected InvalidConfigKind, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_algorithm_rejected() {
        let err = SweepPlan::cross(
            &algos(&["PPO", "PPO"]),
            ["bull"],
            &presets(&["default"]),
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SweepError::DuplicateKey { kind: "algorithm", .. }));
    }

    #[test]
    fn test_empty_environments_yield_empty_plan() {
        let plan = SweepPlan::cross(
            &algos(&["PPO"]),
            std::iter::empty(),
            &presets(&["default"]),
            &BTreeMap::new(),
        )
        .unwrap();
        assert!(plan.is_empty());
    }
}
