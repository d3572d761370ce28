//! Host config (`config.yml` in the deployment root).
//!
//! Written once by host bootstrap and kept across deploys.

use serde::{Deserialize, Serialize};

/// Process manager supervising the app on this host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    #[default]
    Systemd,
    Pm2,
}

/// Host-level settings for one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Port the app listens on (blue slot; green uses `port + 1`)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Process manager
    #[serde(default)]
    pub manager: ManagerKind,

    /// Environment name, selects the `.env.<env>` secrets file
    #[serde(default = "default_env")]
    pub env: String,

    /// Monitoring settings, consumed by the monitoring agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringConfig>,
}

fn default_port() -> u16 {
    8000
}

fn default_env() -> String {
    "production".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            manager: ManagerKind::default(),
            env: default_env(),
            monitoring: None,
        }
    }
}

/// Monitoring agent settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Connection string, may reference an env var like `${OBSERV_DB_URL}`
    #[serde(default)]
    pub postgres_url: Option<String>,

    /// Seconds between metric collections
    #[serde(default = "default_collection_interval")]
    pub collection_interval: u64,

    #[serde(default)]
    pub health_checks: Vec<MonitoredEndpoint>,

    #[serde(default)]
    pub log_files: Vec<String>,
}

fn default_collection_interval() -> u64 {
    60
}

/// Endpoint polled by the monitoring agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredEndpoint {
    pub url: String,

    #[serde(default = "default_check_interval")]
    pub interval: u64,

    #[serde(default = "default_check_timeout")]
    pub timeout: u64,
}

fn default_check_interval() -> u64 {
    30
}

fn default_check_timeout() -> u64 {
    5
}
