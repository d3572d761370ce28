//! Deployment entry point.
//!
//! Ties config extraction, strategy selection and reporting together and
//! guarantees a single outcome per invocation, whatever happens inside.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::config::app::StrategyKind;
use crate::config::loader::{extract_app_config, load_host_config};
use crate::config::timings::Timings;
use crate::deploy::git::Git;
use crate::errors::DeployError;
use crate::models::deployment::{ActiveTarget, DeploymentOutcome};
use crate::procman::ProcessManager;
use crate::storage::layout::DeploymentLayout;
use crate::strategy::{DeployContext, RollbackOutcome, Strategy, Toolkit};
use crate::utils::short_revision;

pub struct Orchestrator {
    toolkit: Toolkit,
    timings: Timings,
    process_manager: Option<Arc<dyn ProcessManager>>,
}

/// What is known about the invocation so far, for reporting
#[derive(Default)]
struct Attempt {
    app: Option<String>,
    strategy: Option<StrategyKind>,
}

impl Orchestrator {
    pub fn new(toolkit: Toolkit, timings: Timings) -> Self {
        Self {
            toolkit,
            timings,
            process_manager: None,
        }
    }

    /// Use `process_manager` instead of the one named by the host config
    pub fn with_process_manager(mut self, process_manager: Arc<dyn ProcessManager>) -> Self {
        self.process_manager = Some(process_manager);
        self
    }

    /// Deploy `revision` of the repository at `source` into `root`.
    ///
    /// Never fails and never panics: every error, including a panic inside
    /// a strategy, becomes a failure outcome.
    pub async fn execute(&self, source: &Path, revision: &str, root: &Path) -> DeploymentOutcome {
        let started = Instant::now();
        let mut attempt = Attempt::default();
        info!(revision = short_revision(revision), root = %root.display(), "Starting deployment");

        let result = AssertUnwindSafe(self.deploy(source, revision, root, &mut attempt))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(DeployError::Internal(panic_message(panic))));

        let duration = started.elapsed();
        match result {
            Ok(active) => {
                info!(?active, ?duration, "Deployment complete");
                let app = attempt.app.unwrap_or_default();
                let strategy = attempt.strategy.unwrap_or_default();
                DeploymentOutcome::success(&app, revision, strategy, active, duration)
            }
            Err(e) => {
                error!(kind = e.kind(), "Deployment failed: {}", e);
                DeploymentOutcome::failure(
                    attempt.app.as_deref(),
                    revision,
                    attempt.strategy,
                    &e,
                    duration,
                )
            }
        }
    }

    async fn deploy(
        &self,
        source: &Path,
        revision: &str,
        root: &Path,
        attempt: &mut Attempt,
    ) -> Result<ActiveTarget, DeployError> {
        let strategy = self.strategy(source, revision, root).await?;
        attempt.app = Some(strategy.app_name().to_string());
        attempt.strategy = Some(strategy.kind());
        info!(
            app = strategy.app_name(),
            strategy = strategy.kind().name(),
            manager = ?strategy.context().process_manager.kind(),
            "Deploying"
        );

        strategy.deploy(source, revision).await
    }

    /// Roll the app in `root` back using the strategy configured at `revision`
    pub async fn rollback(
        &self,
        source: &Path,
        revision: &str,
        root: &Path,
    ) -> Result<RollbackOutcome, DeployError> {
        let strategy = self.strategy(source, revision, root).await?;
        info!(app = strategy.app_name(), strategy = strategy.kind().name(), "Rolling back");
        let outcome = strategy.rollback().await;
        if !matches!(outcome, RollbackOutcome::RolledBack { .. }) {
            warn!("Rollback did not complete: {:?}", outcome);
        }
        Ok(outcome)
    }

    /// Load both configs and build the strategy they select
    async fn strategy(
        &self,
        source: &Path,
        revision: &str,
        root: &Path,
    ) -> Result<Strategy, DeployError> {
        let layout = DeploymentLayout::new(root);
        if !tokio::fs::metadata(root).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(DeployError::ConfigError(format!(
                "Deployment directory not found: {}",
                root.display()
            )));
        }

        let git = Git::new(self.toolkit.runner.clone());
        let app = extract_app_config(&git, source, revision).await?;
        let host = load_host_config(&layout).await?;

        let mut ctx = DeployContext::new(app, host, layout, self.toolkit.clone(), self.timings.clone());
        if let Some(process_manager) = &self.process_manager {
            ctx = ctx.with_process_manager(process_manager.clone());
        }
        Strategy::for_context(ctx)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("deployment panicked: {}", detail)
}
