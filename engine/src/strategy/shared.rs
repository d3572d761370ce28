//! Steps shared by all strategies

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::app::HookPoint;
use crate::errors::DeployError;
use crate::exec::CommandSpec;
use crate::filesys::file::File;
use crate::health::local_url;
use crate::release::{ReleaseManager, KEEP_RELEASES};
use crate::strategy::DeployContext;

/// Run the hook configured for `point` inside `working_dir`.
///
/// A missing config entry or script is skipped; a non-zero exit aborts.
pub async fn run_hook(
    ctx: &DeployContext,
    point: HookPoint,
    working_dir: &Path,
) -> Result<(), DeployError> {
    let Some(relative) = ctx.app.hooks.path_for(point) else {
        return Ok(());
    };

    let script = File::new(working_dir.join(relative));
    if !script.exists().await {
        warn!("{} hook {} not found, skipping", point.name(), script.path().display());
        return Ok(());
    }
    if !script.is_executable().await {
        return Err(DeployError::HookError(format!(
            "{} hook {} is not executable",
            point.name(),
            relative
        )));
    }

    info!("Running {} hook...", point.name());
    let spec = CommandSpec::new(script.path().to_string_lossy()).current_dir(working_dir);
    let output = ctx
        .runner
        .run(&spec)
        .await
        .map_err(|e| DeployError::HookError(format!("{} hook could not run: {}", point.name(), e)))?;

    for line in output.stdout.lines() {
        debug!(hook = point.name(), "{}", line);
    }
    if !output.success() {
        return Err(DeployError::HookError(format!(
            "{} hook failed: {}",
            point.name(),
            output.failure_detail()
        )));
    }
    Ok(())
}

/// Copy `.env.<environment>` from the deployment root to `<target>/.env`.
///
/// Returns whether a file was copied; absence is not an error.
pub async fn copy_env_file(ctx: &DeployContext, target_dir: &Path) -> Result<bool, DeployError> {
    let env_file = ctx.layout.env_file(&ctx.host.env);
    if !env_file.exists().await {
        debug!("No {} to propagate", env_file.path().display());
        return Ok(false);
    }
    env_file.copy_to(&target_dir.join(".env")).await?;
    info!("Copied {} into {}", env_file.path().display(), target_dir.display());
    Ok(true)
}

/// Point `previous` at the current release, then `current` at `release_dir`.
///
/// Each pointer write is an atomic rename.
pub async fn rotate_pointers(ctx: &DeployContext, release_dir: &Path) -> Result<(), DeployError> {
    let current = ctx.layout.current_pointer();
    let previous = ctx.layout.previous_pointer();

    if let Some(active) = current.target().await? {
        previous.point_to(&active).await?;
    }
    current.point_to(release_dir).await?;
    info!("Symlink updated: current -> {}", release_dir.display());
    Ok(())
}

/// Health endpoint of the app on `port`
pub fn health_url(ctx: &DeployContext, port: u16) -> Result<String, DeployError> {
    local_url(port, &ctx.app.health_check)
}

/// Release retention; failures are warnings only
pub async fn retire_releases(releases: &ReleaseManager) {
    match releases.retire(KEEP_RELEASES).await {
        Ok(removed) if !removed.is_empty() => {
            info!("Retired {} old release(s)", removed.len());
        }
        Ok(_) => {}
        Err(e) => warn!("Could not cleanup old releases: {}", e),
    }
}
