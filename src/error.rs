use thiserror::Error;

/// Main error type for sweep orchestration
#[derive(Error, Debug)]
pub enum SweepError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config kind for {algorithm}: expected a parameter mapping, got {found}")]
    InvalidConfigKind { algorithm: String, found: String },

    #[error("Unknown preset '{preset}' for {algorithm}")]
    UnknownPreset { algorithm: String, preset: String },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateKey { kind: &'static str, name: String },

    // Environment lifecycle errors
    #[error("Environment contract violation ({phase}): {reason}")]
    EnvironmentContractViolation { phase: String, reason: String },

    // Collaborator failures (training, evaluation, vectorization)
    #[error("{0}")]
    Collaborator(#[from] anyhow::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl SweepError {
    pub fn contract_violation(phase: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SweepError::EnvironmentContractViolation {
            phase: phase.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for SweepError
pub type Result<T> = std::result::Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_keeps_message() {
        let err: SweepError = anyhow::anyhow!("timeout").into();
        assert_eq!(err.to_string(), "timeout");
    }

    #[test]
    fn test_invalid_config_kind_names_algorithm() {
        let err = SweepError::InvalidConfigKind {
            algorithm: "PPO".to_string(),
            found: "array".to_string(),
        };
        assert!(err.to_string().contains("PPO"));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_contract_violation_display() {
        let err = SweepError::contract_violation("test evaluation", "close failed");
        assert_eq!(
            err.to_string(),
            "Environment contract violation (test evaluation): close failed"
        );
    }
}
