use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::sim::{env_factory, TradingEnv, TradingEnvConfig};
use crate::sweep::{Algorithm, EnvironmentPair, Labeled, RunSettings, Verbosity};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    pub sweep: SweepConfig,
    /// Market environments, in sweep order
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
    /// Explicit parameter maps replacing presets for one algorithm each
    #[serde(default)]
    pub custom_configs: Vec<CustomConfigEntry>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Training step budget per run
    #[serde(default = "default_total_steps")]
    pub total_steps: u64,
    /// Training environment replicas
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Episodes per evaluation phase
    #[serde(default = "default_eval_episodes")]
    pub eval_episodes: usize,
    /// Ask trainers for progress output
    #[serde(default)]
    pub verbose: bool,
}

fn default_total_steps() -> u64 {
    50_000
}

fn default_parallelism() -> usize {
    4
}

fn default_eval_episodes() -> usize {
    5
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total_steps: default_total_steps(),
            parallelism: default_parallelism(),
            eval_episodes: default_eval_episodes(),
            verbose: false,
        }
    }
}

impl RunConfig {
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            total_steps: self.total_steps,
            parallelism: self.parallelism,
            eval_episodes: self.eval_episodes,
            verbosity: Verbosity::from_flag(self.verbose),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Algorithm names, in sweep order
    pub algorithms: Vec<String>,
    /// Presets to cross (default: "default" and "explorative")
    #[serde(default)]
    pub presets: Option<Vec<String>>,
}

impl SweepConfig {
    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.algorithms.iter().map(|name| Algorithm::new(name.as_str())).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    /// Environment used for training and train-data evaluation
    #[serde(default)]
    pub train: TradingEnvConfig,
    /// Held-out environment used for test-data evaluation
    #[serde(default)]
    pub test: TradingEnvConfig,
}

impl EnvironmentConfig {
    pub fn pair(&self) -> EnvironmentPair<TradingEnv> {
        EnvironmentPair::from_factories(
            env_factory(self.train.clone()),
            env_factory(self.test.clone()),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomConfigEntry {
    pub algorithm: String,
    /// Must be a table; other shapes are rejected before the sweep starts
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Filter directive applying `level` to dependencies and to this crate alike
    pub fn filter_directive(&self) -> String {
        format!("{0},quantsweep={0}", self.level)
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("run.total_steps", default_total_steps())?
            .set_default("run.parallelism", default_parallelism() as u64)?
            .set_default("run.eval_episodes", default_eval_episodes() as u64)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/ci.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QUANTSWEEP_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (QUANTSWEEP__RUN__TOTAL_STEPS, etc.)
            .add_source(
                Environment::with_prefix("QUANTSWEEP")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Environment pairs keyed by name, in configured order
    pub fn environment_pairs(&self) -> Labeled<EnvironmentPair<TradingEnv>> {
        self.environments
            .iter()
            .map(|env| (env.name.as_str(), env.pair()))
            .collect()
    }

    /// Custom configurations keyed by algorithm name
    pub fn custom_config_map(&self) -> BTreeMap<String, Value> {
        self.custom_configs
            .iter()
            .map(|entry| (entry.algorithm.clone(), entry.params.clone()))
            .collect()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Validate sweep shape
        if self.sweep.algorithms.is_empty() {
            errors.push("sweep.algorithms must not be empty".to_string());
        }
        if let Some(presets) = &self.sweep.presets {
            if presets.is_empty() {
                errors.push("sweep.presets must not be empty when given".to_string());
            }
        }
        if self.environments.is_empty() {
            errors.push("at least one environment must be configured".to_string());
        }

        let mut names = HashSet::new();
        for env in &self.environments {
            if !names.insert(env.name.as_str()) {
                errors.push(format!("duplicate environment name: {}", env.name));
            }
            for (phase, cfg) in [("train", &env.train), ("test", &env.test)] {
                if cfg.initial_capital <= 0.0 {
                    errors.push(format!(
                        "{}.{phase}.initial_capital must be positive",
                        env.name
                    ));
                }
                if cfg.max_steps == 0 {
                    errors.push(format!(
                        "{}.{phase}.max_steps must be positive",
                        env.name
                    ));
                }
                if cfg.market.volatility < 0.0 {
                    errors.push(format!(
                        "{}.{phase}.market.volatility must be non-negative",
                        env.name
                    ));
                }
                if cfg.market.initial_price <= 0.0 {
                    errors.push(format!(
                        "{}.{phase}.market.initial_price must be positive",
                        env.name
                    ));
                }
            }
        }

        let mut custom = HashSet::new();
        for entry in &self.custom_configs {
            if !custom.insert(entry.algorithm.as_str()) {
                errors.push(format!("duplicate custom config for {}", entry.algorithm));
            }
        }

        // Validate run params
        if self.run.parallelism == 0 {
            errors.push("run.parallelism must be at least 1".to_string());
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            errors.push(format!("unknown logging.level: {}", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("default.toml"), body).unwrap();
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("quantsweep-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_load_from_toml() {
        let dir = temp_dir("load");
        write_config(
            &dir,
            r#"
[run]
total_steps = 1000
parallelism = 2

[sweep]
algorithms = ["MOMENTUM", "CONTRARIAN"]

[[environments]]
name = "bull"
[environments.train.market]
trend = 0.3
seed = 1

[[environments]]
name = "bear"

[[custom_configs]]
algorithm = "CONTRARIAN"
params = { lookback = 8, threshold = 0.002 }
"#,
        );

        let config = AppConfig::load_from(&dir).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.total_steps, 1000);
        assert_eq!(config.run.eval_episodes, 5);
        assert_eq!(
            config.sweep.algorithms(),
            vec![Algorithm::new("MOMENTUM"), Algorithm::new("CONTRARIAN")]
        );
        assert!(config.sweep.presets.is_none());

        let envs = config.environment_pairs();
        assert_eq!(envs.keys().collect::<Vec<_>>(), vec!["bull", "bear"]);
        assert_eq!(config.environments[0].train.market.trend, 0.3);
        assert_eq!(config.environments[0].test.market.trend, 0.0);

        let custom = config.custom_config_map();
        assert_eq!(custom["CONTRARIAN"]["lookback"], 8);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let dir = temp_dir("invalid");
        write_config(
            &dir,
            r#"
[run]
parallelism = 0

[sweep]
algorithms = []

[[environments]]
name = "flat"
[environments.test]
max_steps = 0

[[environments]]
name = "flat"

[logging]
level = "loud"
"#,
        );

        let errors = AppConfig::load_from(&dir).unwrap().validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("sweep.algorithms")));
        assert!(errors.iter().any(|e| e.contains("duplicate environment name: flat")));
        assert!(errors.iter().any(|e| e.contains("flat.test.max_steps")));
        assert!(errors.iter().any(|e| e.contains("run.parallelism")));
        assert!(errors.iter().any(|e| e.contains("logging.level")));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_log_level_applies_to_crate_target() {
        let logging = LoggingConfig {
            level: "error".to_string(),
            json: false,
        };
        assert_eq!(logging.filter_directive(), "error,quantsweep=error");
        assert!(!logging.filter_directive().contains("debug"));
        assert_eq!(
            LoggingConfig::default().filter_directive(),
            "info,quantsweep=info"
        );
    }

    #[test]
    fn test_run_settings_conversion() {
        let run = RunConfig {
            verbose: true,
            ..RunConfig::default()
        };
        let settings = run.settings();
        assert_eq!(settings.total_steps, 50_000);
        assert_eq!(settings.parallelism, 4);
        assert!(settings.verbosity.is_verbose());
    }
}
