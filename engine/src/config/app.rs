//! Per-app deployment config (`deploy.yml`), committed with the code.
//!
//! Parsing goes through loosely typed `Raw*` structs first so every
//! validation failure surfaces as a [`DeployError::ConfigError`] with a
//! readable message, before any side effect happens.

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// File name of the app config at the repository root
pub const APP_CONFIG_FILE: &str = "deploy.yml";

/// Starter config written by `shipwright init`
pub const STARTER_APP_CONFIG: &str = r#"# Deployment config, read from the pushed commit on every deploy
name: my-app
type: python            # python | docker
healthCheck: /health
# command: python -m uvicorn main:app --host 0.0.0.0 --port 8000

deployment:
  strategy: simple      # simple | blue-green | rolling
  # keepInactive: false # blue-green: keep the old slot running
  # batchDelay: 10      # rolling: settle time in seconds

# hooks:
#   preDeploy: scripts/migrate.sh
#   postDeploy: scripts/notify.sh

# smokeTests:
#   - endpoint: /
#     method: GET
#     expectedStatus: 200
#   - script: smoke/check.sh
"#;

const SUPPORTED_TYPES: [&str; 2] = ["python", "docker"];
const KNOWN_UNSUPPORTED_TYPES: [&str; 2] = ["node", "static"];
const VALID_STRATEGIES: [&str; 3] = ["simple", "blue-green", "rolling"];

/// Kind of application being deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    /// Interpreted app run from an isolated virtualenv
    Python,
    /// Container image built from the release's Dockerfile
    Docker,
}

impl AppType {
    pub fn parse(value: &str) -> Result<Self, DeployError> {
        match value {
            "python" => Ok(AppType::Python),
            "docker" => Ok(AppType::Docker),
            other if KNOWN_UNSUPPORTED_TYPES.contains(&other) => Err(DeployError::ConfigError(
                format!("Unsupported app type: {}", other),
            )),
            other => Err(DeployError::ConfigError(format!(
                "Invalid type: {}. Must be one of {:?}",
                other, SUPPORTED_TYPES
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppType::Python => "python",
            AppType::Docker => "docker",
        }
    }
}

/// Deployment algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    Simple,
    BlueGreen,
    Rolling,
}

impl StrategyKind {
    pub fn parse(value: &str) -> Result<Self, DeployError> {
        match value {
            "simple" => Ok(StrategyKind::Simple),
            "blue-green" => Ok(StrategyKind::BlueGreen),
            "rolling" => Ok(StrategyKind::Rolling),
            other => Err(DeployError::ConfigError(format!(
                "Invalid strategy: {}. Must be one of {:?}",
                other, VALID_STRATEGIES
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Simple => "simple",
            StrategyKind::BlueGreen => "blue-green",
            StrategyKind::Rolling => "rolling",
        }
    }
}

/// Strategy selection and its options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOptions {
    pub strategy: StrategyKind,
    /// Blue-green: leave the previously active slot running
    pub keep_inactive: bool,
    /// Rolling: settle time before the health check
    pub batch_delay: Duration,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Simple,
            keep_inactive: false,
            batch_delay: Duration::from_secs(10),
        }
    }
}

/// Lifecycle points a hook can run at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    PreDeploy,
    PostDeploy,
}

impl HookPoint {
    pub fn name(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "preDeploy",
            HookPoint::PostDeploy => "postDeploy",
        }
    }
}

/// Hook script paths, relative to the deployed tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    pub pre_deploy: Option<String>,
    pub post_deploy: Option<String>,
}

impl Hooks {
    pub fn path_for(&self, point: HookPoint) -> Option<&str> {
        match point {
            HookPoint::PreDeploy => self.pre_deploy.as_deref(),
            HookPoint::PostDeploy => self.post_deploy.as_deref(),
        }
    }
}

/// Functional check run against a blue-green target before the switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeTest {
    Http {
        endpoint: String,
        method: Method,
        expected_status: u16,
        expected_body: Option<String>,
    },
    /// Script path relative to the deployment root
    Script { path: String },
}

/// Validated app config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub name: String,
    pub app_type: AppType,
    pub health_check: String,
    pub command: Option<String>,
    pub hooks: Hooks,
    pub deployment: DeploymentOptions,
    pub smoke_tests: Vec<SmokeTest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAppConfig {
    name: Option<String>,
    #[serde(rename = "type")]
    app_type: Option<String>,
    health_check: Option<String>,
    command: Option<String>,
    #[serde(default)]
    hooks: RawHooks,
    #[serde(default)]
    deployment: RawDeployment,
    #[serde(default)]
    smoke_tests: Vec<RawSmokeTest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHooks {
    pre_deploy: Option<String>,
    post_deploy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeployment {
    strategy: Option<String>,
    keep_inactive: Option<bool>,
    batch_delay: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSmokeTest {
    endpoint: Option<String>,
    method: Option<String>,
    expected_status: Option<u16>,
    expected_body: Option<String>,
    script: Option<String>,
}

impl AppConfig {
    /// Parse and validate `deploy.yml` contents
    pub fn from_yaml(contents: &str) -> Result<Self, DeployError> {
        if contents.trim().is_empty() {
            return Err(DeployError::ConfigError(format!("{} is empty", APP_CONFIG_FILE)));
        }
        let raw: RawAppConfig = serde_yaml::from_str(contents)
            .map_err(|e| DeployError::ConfigError(format!("Invalid YAML: {}", e)))?;
        Self::validate(raw)
    }

    fn validate(raw: RawAppConfig) -> Result<Self, DeployError> {
        let name = required(raw.name, "name")?;
        let app_type = required(raw.app_type, "type")?;
        let health_check = required(raw.health_check, "healthCheck")?;

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(DeployError::ConfigError(format!(
                "Invalid name: {} (letters, digits, '-', '_' and '.' only)",
                name
            )));
        }

        let app_type = AppType::parse(&app_type)?;

        if !health_check.starts_with('/') {
            return Err(DeployError::ConfigError(format!(
                "healthCheck must be a path starting with '/': {}",
                health_check
            )));
        }

        let defaults = DeploymentOptions::default();
        let deployment = DeploymentOptions {
            strategy: match raw.deployment.strategy.as_deref() {
                Some(s) => StrategyKind::parse(s)?,
                None => defaults.strategy,
            },
            keep_inactive: raw.deployment.keep_inactive.unwrap_or(defaults.keep_inactive),
            batch_delay: raw
                .deployment
                .batch_delay
                .map(Duration::from_secs)
                .unwrap_or(defaults.batch_delay),
        };

        let smoke_tests = raw
            .smoke_tests
            .into_iter()
            .enumerate()
            .map(|(idx, test)| parse_smoke_test(idx, test))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AppConfig {
            name,
            app_type,
            health_check,
            command: raw.command.filter(|c| !c.trim().is_empty()),
            hooks: Hooks {
                pre_deploy: raw.hooks.pre_deploy,
                post_deploy: raw.hooks.post_deploy,
            },
            deployment,
            smoke_tests,
        })
    }

    pub fn strategy(&self) -> StrategyKind {
        self.deployment.strategy
    }

    /// Command that starts the app listening on `port`
    pub fn start_command(&self, port: u16) -> String {
        if let Some(command) = &self.command {
            return command.clone();
        }
        match self.app_type {
            AppType::Python => "python main.py".to_string(),
            AppType::Docker => format!(
                "docker run -d --name {name} -p {port}:8000 {name}:latest",
                name = self.name,
                port = port
            ),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, DeployError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DeployError::ConfigError(format!(
            "Missing required field: {}",
            field
        ))),
    }
}

fn parse_smoke_test(idx: usize, raw: RawSmokeTest) -> Result<SmokeTest, DeployError> {
    match (raw.endpoint, raw.script) {
        (Some(endpoint), None) => {
            if !endpoint.starts_with('/') {
                return Err(DeployError::ConfigError(format!(
                    "smokeTests[{}]: endpoint must start with '/': {}",
                    idx, endpoint
                )));
            }
            let method = match raw.method {
                Some(m) => Method::from_bytes(m.to_uppercase().as_bytes()).map_err(|_| {
                    DeployError::ConfigError(format!(
                        "smokeTests[{}]: invalid HTTP method: {}",
                        idx, m
                    ))
                })?,
                None => Method::GET,
            };
            Ok(SmokeTest::Http {
                endpoint,
                method,
                expected_status: raw.expected_status.unwrap_or(200),
                expected_body: raw.expected_body,
            })
        }
        (None, Some(path)) => Ok(SmokeTest::Script { path }),
        (Some(_), Some(_)) => Err(DeployError::ConfigError(format!(
            "smokeTests[{}]: set either endpoint or script, not both",
            idx
        ))),
        (None, None) => Err(DeployError::ConfigError(format!(
            "smokeTests[{}]: endpoint or script is required",
            idx
        ))),
    }
}
