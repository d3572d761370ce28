//! Deployment outcome reported by the orchestrator

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::app::StrategyKind;
use crate::errors::DeployError;

/// Final status of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failure,
}

/// What a successful deploy activated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActiveTarget {
    /// Release id now behind the active pointer
    Release { id: String },
    /// Slot now active, and the port the reverse proxy should adopt
    Slot { name: String, port: u16 },
}

/// Single reported result of a deploy invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub app: Option<String>,
    pub revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    pub status: DeploymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveTarget>,
    /// Human-readable failure cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Error taxonomy name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub duration: Duration,
}

impl DeploymentOutcome {
    pub fn success(
        app: &str,
        revision: &str,
        strategy: StrategyKind,
        active: ActiveTarget,
        duration: Duration,
    ) -> Self {
        Self {
            app: Some(app.to_string()),
            revision: revision.to_string(),
            strategy: Some(strategy),
            status: DeploymentStatus::Success,
            active: Some(active),
            cause: None,
            error_kind: None,
            duration,
        }
    }

    pub fn failure(
        app: Option<&str>,
        revision: &str,
        strategy: Option<StrategyKind>,
        error: &DeployError,
        duration: Duration,
    ) -> Self {
        Self {
            app: app.map(str::to_string),
            revision: revision.to_string(),
            strategy,
            status: DeploymentStatus::Failure,
            active: None,
            cause: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }
}
