//! Loading app and host config from where they live

use std::path::Path;

use tracing::debug;

use crate::config::app::{AppConfig, APP_CONFIG_FILE};
use crate::config::host::HostConfig;
use crate::deploy::git::Git;
use crate::errors::DeployError;
use crate::storage::layout::DeploymentLayout;

/// Read and validate `deploy.yml` as committed at `revision`.
///
/// Config travels with the commit, so the working tree is never consulted.
pub async fn extract_app_config(
    git: &Git,
    source: &Path,
    revision: &str,
) -> Result<AppConfig, DeployError> {
    debug!("Reading {} at {}", APP_CONFIG_FILE, revision);
    let contents = git
        .show_file(source, revision, APP_CONFIG_FILE)
        .await?
        .ok_or_else(|| {
            DeployError::ConfigError(format!(
                "{} not found in repository at {}",
                APP_CONFIG_FILE, revision
            ))
        })?;
    AppConfig::from_yaml(&contents)
}

/// Load `config.yml` from the deployment root
pub async fn load_host_config(layout: &DeploymentLayout) -> Result<HostConfig, DeployError> {
    let file = layout.host_config_file();
    if !file.exists().await {
        return Err(DeployError::ConfigError(format!(
            "Host config not found: {}",
            file.path().display()
        )));
    }
    let contents = file.read_string().await?;
    if contents.trim().is_empty() {
        return Ok(HostConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| {
        DeployError::ConfigError(format!("Invalid {}: {}", file.path().display(), e))
    })
}
