//! Git operations against the source repository

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

/// Thin wrapper over the `git` CLI
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn CommandRunner>,
}

impl Git {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        self.runner
            .run(spec)
            .await
            .map_err(|e| DeployError::BuildError(format!("{} failed: {}", spec, e)))
    }

    /// Materialize a full checkout of `revision` from `source` into `target`.
    ///
    /// `target` must not exist yet. On failure the caller owns cleanup.
    pub async fn checkout(
        &self,
        source: &Path,
        revision: &str,
        target: &Path,
    ) -> Result<(), DeployError> {
        info!("Checking out {} from {} into {}", revision, source.display(), target.display());

        debug!("Cloning repository...");
        let clone = CommandSpec::new("git")
            .args(["clone", "--quiet"])
            .path_arg(source)
            .path_arg(target);
        let output = self.run(&clone).await?;
        if !output.success() {
            return Err(DeployError::BuildError(format!(
                "Failed to clone: {}",
                output.failure_detail()
            )));
        }

        debug!("Checking out revision {}...", revision);
        let checkout = CommandSpec::new("git")
            .arg("-C")
            .path_arg(target)
            .args(["checkout", "--quiet", revision]);
        let output = self.run(&checkout).await?;
        if !output.success() {
            return Err(DeployError::BuildError(format!(
                "Failed to checkout {}: {}",
                revision,
                output.failure_detail()
            )));
        }

        Ok(())
    }

    /// Read a file as committed at `revision`, `None` if it is not there
    pub async fn show_file(
        &self,
        source: &Path,
        revision: &str,
        file: &str,
    ) -> Result<Option<String>, DeployError> {
        let spec = CommandSpec::new("git")
            .arg("--git-dir")
            .path_arg(source)
            .arg("show")
            .arg(format!("{}:{}", revision, file));
        let output = self.runner.run(&spec).await.map_err(|e| {
            DeployError::ConfigError(format!("Could not read {} at {}: {}", file, revision, e))
        })?;
        if !output.success() {
            debug!("git show {}:{} failed: {}", revision, file, output.failure_detail());
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }
}
