//! Release-based strategies: simple and rolling.
//!
//! Both create a release snapshot, rotate the `current` / `previous`
//! pointers onto it and gate on a health check. They differ in how the
//! process manager is told about the new code and in the wait before
//! probing.

use std::path::Path;

use tracing::{error, info, warn};

use crate::config::app::HookPoint;
use crate::deploy::installer::install_dependencies;
use crate::errors::DeployError;
use crate::models::deployment::ActiveTarget;
use crate::models::release::Release;
use crate::release::ReleaseManager;
use crate::strategy::fsm::{ReleaseEvent, ReleaseFsm};
use crate::strategy::shared::{copy_env_file, health_url, retire_releases, rotate_pointers, run_hook};
use crate::strategy::{DeployContext, RollbackOutcome};
use crate::utils::short_revision;

/// How the new release is put into service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseFlavor {
    /// Plain reload, startup grace, then probe
    Simple,
    /// Graceful staggered reload, settle delay, then probe
    Rolling,
}

pub struct ReleaseStrategy {
    ctx: DeployContext,
    releases: ReleaseManager,
    flavor: ReleaseFlavor,
}

impl ReleaseStrategy {
    pub fn new(ctx: DeployContext, flavor: ReleaseFlavor) -> Self {
        let releases = ctx.release_manager();
        Self { ctx, releases, flavor }
    }

    pub fn context(&self) -> &DeployContext {
        &self.ctx
    }

    pub async fn deploy(&self, source: &Path, revision: &str) -> Result<ActiveTarget, DeployError> {
        info!("Using {:?} deployment strategy", self.flavor);
        let ctx = &self.ctx;
        let mut fsm = ReleaseFsm::new();

        let release = self.releases.create(source, revision).await?;
        if let Err(e) = self.prepare(&release.dir, &release.id.to_string()).await {
            warn!("Release {} left inactive: {}", release.id, e);
            return Err(e);
        }
        transition(&mut fsm, ReleaseEvent::Create)?;

        rotate_pointers(ctx, &release.dir).await?;
        transition(&mut fsm, ReleaseEvent::Activate)?;

        self.activate().await?;

        if let Err(e) = self.verify(&release).await {
            transition(&mut fsm, ReleaseEvent::Fail(e.to_string()))?;
            if e.triggers_rollback() {
                match self.rollback().await {
                    RollbackOutcome::RolledBack { .. } => {
                        transition(&mut fsm, ReleaseEvent::Rollback)?;
                    }
                    other => error!("Rollback after failed health check: {:?}", other),
                }
            }
            info!(state = ?fsm.state(), "Release {} not activated", release.id);
            return Err(e);
        }

        run_hook(ctx, HookPoint::PostDeploy, &release.dir).await?;
        retire_releases(&self.releases).await;

        info!("Release {} ({}) is live", release.id, short_revision(&release.revision));
        Ok(ActiveTarget::Release {
            id: release.id.to_string(),
        })
    }

    /// Steps before the pointer swap; any failure leaves pointers untouched
    async fn prepare(&self, dir: &Path, build_tag: &str) -> Result<(), DeployError> {
        install_dependencies(self.ctx.runner.clone(), &self.ctx.app, dir, build_tag).await?;
        copy_env_file(&self.ctx, dir).await?;
        run_hook(&self.ctx, HookPoint::PreDeploy, dir).await
    }

    /// Health gate on the host port
    async fn verify(&self, release: &Release) -> Result<(), DeployError> {
        let ctx = &self.ctx;
        let url = health_url(ctx, ctx.host.port)?;
        let healthy = ctx
            .prober
            .check(
                &url,
                ctx.timings.probe_retries,
                ctx.timings.probe_delay,
                ctx.timings.probe_timeout,
            )
            .await;
        if !healthy {
            return Err(DeployError::HealthCheckFailure(format!(
                "Health check failed for release {} at {}",
                release.id, url
            )));
        }
        Ok(())
    }

    /// Tell the process manager and wait for the app to come up
    async fn activate(&self) -> Result<(), DeployError> {
        let ctx = &self.ctx;
        let name = ctx.app.name.as_str();
        match self.flavor {
            ReleaseFlavor::Simple => {
                // The health gate decides whether a failed reload matters.
                if let Err(e) = ctx.process_manager.reload(name).await {
                    warn!("Reload of {} failed: {}", name, e);
                }
                info!("Waiting {:?} for startup...", ctx.timings.startup_grace);
                ctx.sleeper.sleep(ctx.timings.startup_grace).await;
            }
            ReleaseFlavor::Rolling => {
                // Pointers already moved: a failed restart is surfaced as is.
                ctx.process_manager.graceful_reload(name).await?;
                let settle = ctx.app.deployment.batch_delay;
                info!("Waiting {:?} for stabilization...", settle);
                ctx.sleeper.sleep(settle).await;
            }
        }
        Ok(())
    }

    /// Move `previous` back over `current` and reload
    pub async fn rollback(&self) -> RollbackOutcome {
        warn!("Rolling back...");
        let ctx = &self.ctx;
        let current = ctx.layout.current_pointer();
        let previous = ctx.layout.previous_pointer();

        let target = match previous.target_name().await {
            Ok(Some(name)) => name,
            Ok(None) => {
                error!("No previous release to rollback to");
                return RollbackOutcome::Unrecoverable {
                    reason: "no previous release".to_string(),
                };
            }
            Err(e) => {
                error!("Could not read previous pointer: {}", e);
                return RollbackOutcome::Unrecoverable {
                    reason: e.to_string(),
                };
            }
        };

        match previous.move_over(&current).await {
            Ok(true) => {}
            Ok(false) => {
                return RollbackOutcome::Unrecoverable {
                    reason: "previous pointer vanished".to_string(),
                }
            }
            Err(e) => {
                error!("Could not restore current pointer: {}", e);
                return RollbackOutcome::Unrecoverable {
                    reason: e.to_string(),
                };
            }
        }

        let name = ctx.app.name.as_str();
        let reloaded = match self.flavor {
            ReleaseFlavor::Simple => ctx.process_manager.reload(name).await,
            ReleaseFlavor::Rolling => ctx.process_manager.graceful_reload(name).await,
        };
        match reloaded {
            Ok(()) => {
                info!("Rolled back to release {}", target);
                RollbackOutcome::RolledBack { target, port: None }
            }
            Err(e) => {
                error!("Rolled back to release {} but reload failed: {}", target, e);
                RollbackOutcome::Incomplete {
                    target,
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn transition(fsm: &mut ReleaseFsm, event: ReleaseEvent) -> Result<(), DeployError> {
    fsm.process(event).map_err(DeployError::Internal)?;
    info!(state = ?fsm.state(), "release state");
    Ok(())
}
