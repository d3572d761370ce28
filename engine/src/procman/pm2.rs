//! pm2-managed processes

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::host::ManagerKind;
use crate::errors::DeployError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::procman::{ProcessManager, ServiceSpec};

pub struct Pm2 {
    runner: Arc<dyn CommandRunner>,
}

impl Pm2 {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn pm2(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        self.runner
            .run(spec)
            .await
            .map_err(|e| DeployError::ActivationError(format!("{} failed: {}", spec, e)))
    }

    async fn pm2_checked(&self, spec: CommandSpec) -> Result<(), DeployError> {
        let output = self.pm2(&spec).await?;
        if !output.success() {
            return Err(DeployError::ActivationError(format!(
                "{} failed: {}",
                spec,
                output.failure_detail()
            )));
        }
        Ok(())
    }

    fn restart_spec(service: &ServiceSpec) -> CommandSpec {
        CommandSpec::new("pm2")
            .args(["restart", service.name.as_str(), "--update-env"])
            .env("PORT", service.port.to_string())
    }

    /// Register a process pm2 has never seen
    async fn launch(&self, service: &ServiceSpec) -> Result<(), DeployError> {
        let start = CommandSpec::new("pm2")
            .args(["start", service.command.as_str(), "--name", service.name.as_str(), "--cwd"])
            .path_arg(&service.working_dir)
            .current_dir(&service.working_dir)
            .env("PORT", service.port.to_string());
        self.pm2_checked(start).await?;
        info!("Started {} (port {})", service.name, service.port);
        Ok(())
    }
}

#[async_trait]
impl ProcessManager for Pm2 {
    fn kind(&self) -> ManagerKind {
        ManagerKind::Pm2
    }

    async fn reload(&self, name: &str) -> Result<(), DeployError> {
        self.pm2_checked(CommandSpec::new("pm2").args(["reload", name]))
            .await?;
        info!("Reloaded pm2 process {}", name);
        Ok(())
    }

    async fn graceful_reload(&self, name: &str) -> Result<(), DeployError> {
        info!("Rolling restart with PM2...");
        self.pm2_checked(CommandSpec::new("pm2").args(["reload", name, "--update-env"]))
            .await?;
        info!("PM2 rolling restart complete");
        Ok(())
    }

    async fn start(&self, service: &ServiceSpec) -> Result<(), DeployError> {
        let output = self.pm2(&Self::restart_spec(service)).await?;
        if output.success() {
            info!("Restarted {} (port {})", service.name, service.port);
            return Ok(());
        }

        debug!("{} is not known to pm2 yet, starting it", service.name);
        self.launch(service).await
    }

    async fn ensure_running(&self, service: &ServiceSpec) -> Result<(), DeployError> {
        let describe = self
            .pm2(&CommandSpec::new("pm2").args(["describe", service.name.as_str()]))
            .await?;
        if !describe.success() {
            debug!("{} is not known to pm2, starting it", service.name);
            return self.launch(service).await;
        }
        if describe.stdout.contains("online") {
            info!("{} is already running", service.name);
            return Ok(());
        }

        self.pm2_checked(Self::restart_spec(service)).await?;
        info!("Restarted stopped process {} (port {})", service.name, service.port);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), DeployError> {
        self.pm2_checked(CommandSpec::new("pm2").args(["stop", name]))
            .await?;
        info!("Stopped {}", name);
        Ok(())
    }
}
