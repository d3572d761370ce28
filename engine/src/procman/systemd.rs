//! systemd-managed services.
//!
//! Unit files, including the per-slot `<app>-blue` / `<app>-green` units,
//! are provisioned by host bootstrap; this module only drives `systemctl`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::host::ManagerKind;
use crate::errors::DeployError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::procman::{ProcessManager, ServiceSpec};

pub struct Systemd {
    runner: Arc<dyn CommandRunner>,
}

impl Systemd {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn systemctl(&self, action: &str, name: &str) -> Result<CommandOutput, DeployError> {
        self.runner
            .run(&CommandSpec::new("systemctl").args([action, name]))
            .await
            .map_err(|e| {
                DeployError::ActivationError(format!("systemctl {} {} failed: {}", action, name, e))
            })
    }

    async fn systemctl_checked(&self, action: &str, name: &str) -> Result<(), DeployError> {
        let output = self.systemctl(action, name).await?;
        if !output.success() {
            return Err(DeployError::ActivationError(format!(
                "systemctl {} {} failed: {}",
                action,
                name,
                output.failure_detail()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessManager for Systemd {
    fn kind(&self) -> ManagerKind {
        ManagerKind::Systemd
    }

    async fn reload(&self, name: &str) -> Result<(), DeployError> {
        self.systemctl_checked("reload", name).await?;
        info!("Reloaded systemd service {}", name);
        Ok(())
    }

    async fn graceful_reload(&self, name: &str) -> Result<(), DeployError> {
        info!("Reloading systemd service {}...", name);
        let output = self.systemctl("reload-or-restart", name).await?;
        if output.success() {
            info!("Systemd reload complete");
            return Ok(());
        }

        // Treated like a clean reload: the shared health check follows.
        warn!(
            "reload-or-restart {} failed ({}), falling back to restart",
            name,
            output.failure_detail()
        );
        self.systemctl_checked("restart", name).await?;
        info!("Systemd restart complete");
        Ok(())
    }

    async fn start(&self, service: &ServiceSpec) -> Result<(), DeployError> {
        self.systemctl_checked("restart", &service.name).await?;
        info!("Started {} (port {})", service.name, service.port);
        Ok(())
    }

    async fn ensure_running(&self, service: &ServiceSpec) -> Result<(), DeployError> {
        // `systemctl start` is a no-op for an active unit
        self.systemctl_checked("start", &service.name).await?;
        info!("{} is running (port {})", service.name, service.port);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), DeployError> {
        self.systemctl_checked("stop", name).await?;
        info!("Stopped {}", name);
        Ok(())
    }
}
