//! Deployment strategies.
//!
//! The set of strategies is closed: [`Strategy`] is an enum over the three
//! algorithms, chosen from the validated app config. Shared steps (hooks,
//! secrets propagation, pointer rotation) are free functions in [`shared`]
//! that take the [`DeployContext`] explicitly.

pub mod blue_green;
pub mod fsm;
pub mod releases;
pub mod shared;
pub mod smoke;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Sleeper, TokioSleeper};
use crate::config::app::{AppConfig, StrategyKind};
use crate::config::host::HostConfig;
use crate::config::timings::Timings;
use crate::deploy::git::Git;
use crate::errors::DeployError;
use crate::exec::{CommandRunner, SystemRunner};
use crate::health::{HealthProber, HttpClient, ReqwestClient};
use crate::models::deployment::ActiveTarget;
use crate::procman::{self, ProcessManager};
use crate::release::ReleaseManager;
use crate::storage::layout::DeploymentLayout;

pub use blue_green::BlueGreenStrategy;
pub use releases::{ReleaseFlavor, ReleaseStrategy};

/// External collaborators every strategy talks through
#[derive(Clone)]
pub struct Toolkit {
    pub runner: Arc<dyn CommandRunner>,
    pub http: Arc<dyn HttpClient>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Toolkit {
    /// Real processes, real HTTP, real sleeps
    pub fn system() -> Result<Self, DeployError> {
        Ok(Self {
            runner: Arc::new(SystemRunner),
            http: Arc::new(ReqwestClient::new()?),
            sleeper: Arc::new(TokioSleeper),
        })
    }
}

/// Everything one deploy invocation works with
#[derive(Clone)]
pub struct DeployContext {
    pub app: AppConfig,
    pub host: HostConfig,
    pub layout: DeploymentLayout,
    pub timings: Timings,
    pub runner: Arc<dyn CommandRunner>,
    pub http: Arc<dyn HttpClient>,
    pub sleeper: Arc<dyn Sleeper>,
    pub process_manager: Arc<dyn ProcessManager>,
    pub prober: HealthProber,
    pub git: Git,
}

impl DeployContext {
    pub fn new(
        app: AppConfig,
        host: HostConfig,
        layout: DeploymentLayout,
        toolkit: Toolkit,
        timings: Timings,
    ) -> Self {
        let process_manager = procman::for_host(host.manager, toolkit.runner.clone());
        Self {
            prober: HealthProber::new(toolkit.http.clone(), toolkit.sleeper.clone()),
            git: Git::new(toolkit.runner.clone()),
            app,
            host,
            layout,
            timings,
            runner: toolkit.runner,
            http: toolkit.http,
            sleeper: toolkit.sleeper,
            process_manager,
        }
    }

    /// Replace the host-selected process manager
    pub fn with_process_manager(mut self, process_manager: Arc<dyn ProcessManager>) -> Self {
        self.process_manager = process_manager;
        self
    }

    pub fn release_manager(&self) -> ReleaseManager {
        ReleaseManager::new(self.layout.clone(), self.git.clone())
    }
}

/// Result of a best-effort rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RollbackOutcome {
    /// Active pointer moved back and the process restarted
    RolledBack {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
    },
    /// Pointer moved back but the process manager command failed
    Incomplete { target: String, reason: String },
    /// Nothing to roll back to; operator action required
    Unrecoverable { reason: String },
}

/// One of the three deployment algorithms
pub enum Strategy {
    Simple(ReleaseStrategy),
    Rolling(ReleaseStrategy),
    BlueGreen(BlueGreenStrategy),
}

impl Strategy {
    /// Strategy named by the app config
    pub fn for_context(ctx: DeployContext) -> Result<Self, DeployError> {
        let strategy = match ctx.app.strategy() {
            StrategyKind::Simple => Strategy::Simple(ReleaseStrategy::new(ctx, ReleaseFlavor::Simple)),
            StrategyKind::Rolling => {
                Strategy::Rolling(ReleaseStrategy::new(ctx, ReleaseFlavor::Rolling))
            }
            StrategyKind::BlueGreen => Strategy::BlueGreen(BlueGreenStrategy::new(ctx)?),
        };
        Ok(strategy)
    }

    pub fn context(&self) -> &DeployContext {
        match self {
            Strategy::Simple(s) | Strategy::Rolling(s) => s.context(),
            Strategy::BlueGreen(s) => s.context(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.context().app.name
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Simple(_) => StrategyKind::Simple,
            Strategy::Rolling(_) => StrategyKind::Rolling,
            Strategy::BlueGreen(_) => StrategyKind::BlueGreen,
        }
    }

    /// Deploy `revision` from the repository at `source`
    pub async fn deploy(&self, source: &Path, revision: &str) -> Result<ActiveTarget, DeployError> {
        match self {
            Strategy::Simple(s) | Strategy::Rolling(s) => s.deploy(source, revision).await,
            Strategy::BlueGreen(s) => s.deploy(source, revision).await,
        }
    }

    /// Best-effort rollback; never fails, the outcome is logged and returned
    pub async fn rollback(&self) -> RollbackOutcome {
        match self {
            Strategy::Simple(s) | Strategy::Rolling(s) => s.rollback().await,
            Strategy::BlueGreen(s) => s.rollback().await,
        }
    }
}
