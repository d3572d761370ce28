//! Error types for the deployment engine

use thiserror::Error;

/// Main error type for the deployment engine
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Hook error: {0}")]
    HookError(String),

    #[error("Activation error: {0}")]
    ActivationError(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailure(String),

    #[error("Smoke test failed: {0}")]
    SmokeTestFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Taxonomy name used in deployment outcomes
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::ConfigError(_) | DeployError::YamlError(_) => "configuration",
            DeployError::BuildError(_) => "build",
            DeployError::HookError(_) => "hook",
            DeployError::ActivationError(_) => "activation",
            DeployError::HealthCheckFailure(_) => "health_check",
            DeployError::SmokeTestFailure(_) => "smoke_test",
            DeployError::IoError(_) | DeployError::HttpError(_) | DeployError::Internal(_) => {
                "internal"
            }
        }
    }

    /// Whether a release-based strategy should roll back after this error.
    ///
    /// Only a failed post-activation health gate qualifies.
    pub fn triggers_rollback(&self) -> bool {
        matches!(self, DeployError::HealthCheckFailure(_))
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}

impl From<url::ParseError> for DeployError {
    fn from(err: url::ParseError) -> Self {
        DeployError::ConfigError(format!("Invalid URL: {}", err))
    }
}
