//! Health probe results

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of a single probe attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub url: String,
    /// HTTP status, `None` when no response arrived
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
