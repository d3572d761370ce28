//! Isolated virtualenv installs for python apps

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::errors::DeployError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::filesys::file::File;

/// Manifest installed into the virtualenv when present
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Virtualenv directory name inside the deployed tree
pub const VENV_DIR: &str = "venv";

#[derive(Clone)]
pub struct VirtualenvInstaller {
    runner: Arc<dyn CommandRunner>,
}

impl VirtualenvInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        self.runner
            .run(spec)
            .await
            .map_err(|e| DeployError::BuildError(format!("{} failed: {}", spec, e)))
    }

    /// Create `<dir>/venv` and install `requirements.txt` if there is one
    pub async fn install(&self, dir: &Path) -> Result<(), DeployError> {
        let venv_dir = dir.join(VENV_DIR);

        info!("Creating Python virtual environment...");
        let create = CommandSpec::new("python3")
            .args(["-m", "venv"])
            .path_arg(&venv_dir);
        let output = self.run(&create).await?;
        if !output.success() {
            return Err(DeployError::BuildError(format!(
                "Failed to create venv: {}",
                output.failure_detail()
            )));
        }

        let requirements = File::new(dir.join(REQUIREMENTS_FILE));
        if !requirements.exists().await {
            info!("No {} found, skipping dependency installation", REQUIREMENTS_FILE);
            return Ok(());
        }

        info!("Installing dependencies from {}...", REQUIREMENTS_FILE);
        let pip = venv_dir.join("bin").join("pip");
        let install = CommandSpec::new(pip.to_string_lossy())
            .arg("install")
            .arg("-r")
            .path_arg(requirements.path())
            .current_dir(dir);
        let output = self.run(&install).await?;
        if !output.success() {
            return Err(DeployError::BuildError(format!(
                "Failed to install dependencies: {}",
                output.failure_detail()
            )));
        }

        info!("Dependencies installed");
        Ok(())
    }
}
