//! Configuration resolution
//!
//! A run is configured either by a named preset or by an explicit parameter
//! map. The explicit map always wins and is never merged with a preset.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::collaborators::Algorithm;
use super::presets::{PresetRegistry, DEFAULT_PRESET};
use crate::error::{Result, SweepError};

/// Parameter name to parameter value
pub type ParamMap = Map<String, Value>;

/// Run label used for cells configured by an explicit map
pub const CUSTOM_LABEL: &str = "custom";

/// Where a resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Preset(String),
    Custom,
}

impl ConfigSource {
    /// Label the run is reported under
    pub fn label(&self) -> &str {
        match self {
            ConfigSource::Preset(name) => name,
            ConfigSource::Custom => CUSTOM_LABEL,
        }
    }

    /// Preset name, or `None` when an explicit map was used
    pub fn preset(&self) -> Option<&str> {
        match self {
            ConfigSource::Preset(name) => Some(name),
            ConfigSource::Custom => None,
        }
    }
}

/// Parameters that fully determine one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub source: ConfigSource,
    pub params: ParamMap,
}

impl ResolvedConfig {
    pub fn custom(params: ParamMap) -> Self {
        Self {
            source: ConfigSource::Custom,
            params,
        }
    }

    pub fn preset(name: impl Into<String>, params: ParamMap) -> Self {
        Self {
            source: ConfigSource::Preset(name.into()),
            params,
        }
    }

    pub fn label(&self) -> &str {
        self.source.label()
    }
}

/// Build a parameter map from named values
///
/// ```
/// use quantsweep::sweep::custom_config;
///
/// let config = custom_config([("learning_rate", 0.001), ("gamma", 0.95)]);
/// assert_eq!(config.len(), 2);
/// ```
pub fn custom_config<K, V, I>(params: I) -> ParamMap
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Check that an explicit configuration is a parameter mapping
pub fn validate_explicit<'a>(algorithm: &str, explicit: &'a Value) -> Result<&'a ParamMap> {
    match explicit {
        Value::Object(map) => Ok(map),
        other => Err(SweepError::InvalidConfigKind {
            algorithm: algorithm.to_string(),
            found: value_kind(other).to_string(),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Applies preset-versus-explicit precedence against a preset registry
pub struct ConfigResolver<'a> {
    presets: &'a dyn PresetRegistry,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(presets: &'a dyn PresetRegistry) -> Self {
        Self { presets }
    }

    /// Resolve the configuration for one run
    ///
    /// With an explicit map the preset is ignored. Without either, the
    /// `default` preset is used.
    pub fn resolve(
        &self,
        algorithm: &Algorithm,
        preset: Option<&str>,
        explicit: Option<&Value>,
    ) -> Result<ResolvedConfig> {
        if let Some(explicit) = explicit {
            let params = validate_explicit(algorithm.name(), explicit)?;
            if let Some(ignored) = preset {
                debug!(
                    %algorithm,
                    preset = ignored,
                    "Explicit config supplied, ignoring preset"
                );
            }
            return Ok(ResolvedConfig::custom(params.clone()));
        }

        let name = preset.unwrap_or(DEFAULT_PRESET);
        let params = self.presets.preset(algorithm, name)?;
        debug!(%algorithm, preset = name, params = params.len(), "Resolved preset");
        Ok(ResolvedConfig::preset(name, params))
    }
}
