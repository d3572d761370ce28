//! Process manager control (systemd / pm2)

pub mod pm2;
pub mod systemd;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::host::ManagerKind;
use crate::errors::DeployError;
use crate::exec::CommandRunner;

pub use pm2::Pm2;
pub use systemd::Systemd;

/// A supervised service bound to a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub working_dir: PathBuf,
    pub port: u16,
    /// Start command, used when the manager has to create the process
    pub command: String,
}

/// Process manager operations, addressed by service name.
///
/// Every failing command, including one that cannot be spawned, surfaces as
/// [`DeployError::ActivationError`].
#[async_trait]
pub trait ProcessManager: Send + Sync {
    fn kind(&self) -> ManagerKind;

    /// Reload after the active pointer moved
    async fn reload(&self, name: &str) -> Result<(), DeployError>;

    /// Graceful, staggered restart used by rolling deploys
    async fn graceful_reload(&self, name: &str) -> Result<(), DeployError>;

    /// Start the service, restarting it if it already runs
    async fn start(&self, service: &ServiceSpec) -> Result<(), DeployError>;

    /// Start the service only if it is not running; a running one is left alone
    async fn ensure_running(&self, service: &ServiceSpec) -> Result<(), DeployError>;

    async fn stop(&self, name: &str) -> Result<(), DeployError>;
}

/// Process manager selected by the host config
pub fn for_host(kind: ManagerKind, runner: Arc<dyn CommandRunner>) -> Arc<dyn ProcessManager> {
    match kind {
        ManagerKind::Systemd => Arc::new(Systemd::new(runner)),
        ManagerKind::Pm2 => Arc::new(Pm2::new(runner)),
    }
}
