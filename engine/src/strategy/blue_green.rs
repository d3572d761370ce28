//! Blue-green deploys over two fixed slots.
//!
//! The inactive slot is rebuilt, started on its own port and verified
//! while the active slot keeps serving. Only a fully verified slot becomes
//! active, through a single atomic rewrite of the `current` pointer.

use std::path::Path;

use tracing::{error, info, warn};

use crate::config::app::HookPoint;
use crate::deploy::installer::install_dependencies;
use crate::errors::DeployError;
use crate::models::deployment::ActiveTarget;
use crate::models::slot::Slot;
use crate::procman::ServiceSpec;
use crate::strategy::shared::{copy_env_file, health_url, run_hook};
use crate::strategy::smoke::run_smoke_tests;
use crate::strategy::{DeployContext, RollbackOutcome};

pub struct BlueGreenStrategy {
    ctx: DeployContext,
    blue_port: u16,
    green_port: u16,
}

impl BlueGreenStrategy {
    /// Fails when the host port leaves no room for the green slot
    pub fn new(ctx: DeployContext) -> Result<Self, DeployError> {
        let base = ctx.host.port;
        let (Some(blue_port), Some(green_port)) = (Slot::Blue.port(base), Slot::Green.port(base)) else {
            return Err(DeployError::ConfigError(format!(
                "port {} leaves no room for the green slot on port + 1",
                base
            )));
        };
        Ok(Self {
            ctx,
            blue_port,
            green_port,
        })
    }

    fn port(&self, slot: Slot) -> u16 {
        match slot {
            Slot::Blue => self.blue_port,
            Slot::Green => self.green_port,
        }
    }

    pub fn context(&self) -> &DeployContext {
        &self.ctx
    }

    /// Slot behind the `current` pointer, if any
    pub async fn active_slot(&self) -> Result<Option<Slot>, DeployError> {
        let Some(name) = self.ctx.layout.current_pointer().target_name().await? else {
            return Ok(None);
        };
        match name.parse::<Slot>() {
            Ok(slot) => Ok(Some(slot)),
            Err(_) => {
                warn!("current points at {}, which is not a slot; treating as none", name);
                Ok(None)
            }
        }
    }

    fn service(&self, slot: Slot) -> ServiceSpec {
        let port = self.port(slot);
        ServiceSpec {
            name: slot.process_name(&self.ctx.app.name),
            working_dir: self.ctx.layout.slot_code_dir(slot).path().to_path_buf(),
            port,
            command: self.ctx.app.start_command(port),
        }
    }

    pub async fn deploy(&self, source: &Path, revision: &str) -> Result<ActiveTarget, DeployError> {
        info!("Using blue-green deployment strategy");
        let ctx = &self.ctx;

        let active = self.active_slot().await?;
        let target = Slot::target_for(active);
        let port = self.port(target);
        info!(
            "Active: {} -> Deploying to: {}",
            active.map(|s| s.name()).unwrap_or("none"),
            target
        );

        let code_dir = ctx.layout.slot_code_dir(target);
        self.rebuild_slot(target, source, revision).await?;

        // Pre-activation steps run in the target slot's tree only
        let build_tag = chrono::Utc::now().timestamp().to_string();
        install_dependencies(ctx.runner.clone(), &ctx.app, code_dir.path(), &build_tag).await?;
        copy_env_file(ctx, code_dir.path()).await?;
        run_hook(ctx, HookPoint::PreDeploy, code_dir.path()).await?;

        let service = self.service(target);
        ctx.process_manager.start(&service).await?;

        if let Err(e) = self.verify(target, port).await {
            self.stop_quietly(&service.name).await;
            return Err(e);
        }

        info!("{} healthy, switching...", target);
        ctx.layout
            .current_pointer()
            .point_to(Path::new(target.name()))
            .await?;
        info!("Switched to {}", target);
        info!("Note: Update your proxy/load balancer to port {}", port);

        run_hook(ctx, HookPoint::PostDeploy, code_dir.path()).await?;

        if let Some(old) = active {
            if ctx.app.deployment.keep_inactive {
                info!("Keeping {} running (keepInactive)", old);
            } else {
                self.stop_quietly(&old.process_name(&ctx.app.name)).await;
            }
        }

        Ok(ActiveTarget::Slot {
            name: target.name().to_string(),
            port,
        })
    }

    /// Wipe the slot's code tree and check out `revision` into it
    async fn rebuild_slot(&self, slot: Slot, source: &Path, revision: &str) -> Result<(), DeployError> {
        let slot_dir = self.ctx.layout.slot_dir(slot);
        let code_dir = self.ctx.layout.slot_code_dir(slot);
        slot_dir.create().await?;
        code_dir.delete().await?;

        if let Err(e) = self.ctx.git.checkout(source, revision, code_dir.path()).await {
            if let Err(cleanup) = code_dir.delete().await {
                warn!("Could not remove partial checkout in {}: {}", slot, cleanup);
            }
            return Err(e);
        }
        info!("Code deployed to {} environment", slot);
        Ok(())
    }

    /// Startup grace, consecutive health probes, then smoke tests
    async fn verify(&self, slot: Slot, port: u16) -> Result<(), DeployError> {
        let ctx = &self.ctx;
        info!("Testing {} environment on port {}...", slot, port);
        ctx.sleeper.sleep(ctx.timings.slot_grace).await;

        let url = health_url(ctx, port)?;
        let healthy = ctx
            .prober
            .check_consecutive(
                &url,
                ctx.timings.slot_probe_count,
                ctx.timings.slot_probe_spacing,
                ctx.timings.probe_timeout,
            )
            .await;
        if !healthy {
            return Err(DeployError::HealthCheckFailure(format!(
                "{} environment health check failed",
                slot
            )));
        }

        run_smoke_tests(ctx, port).await
    }

    async fn stop_quietly(&self, name: &str) {
        if let Err(e) = self.ctx.process_manager.stop(name).await {
            warn!("Could not stop {}: {}", name, e);
        }
    }

    /// Switch back to the other slot without re-verifying it.
    ///
    /// The slot is trusted to be healthy from when it was last active.
    pub async fn rollback(&self) -> RollbackOutcome {
        let ctx = &self.ctx;
        let active = match self.active_slot().await {
            Ok(Some(slot)) => slot,
            Ok(None) => {
                error!("No active environment");
                return RollbackOutcome::Unrecoverable {
                    reason: "no active environment".to_string(),
                };
            }
            Err(e) => {
                error!("Could not read active environment: {}", e);
                return RollbackOutcome::Unrecoverable {
                    reason: e.to_string(),
                };
            }
        };

        let target = active.other();
        info!("Rolling back from {} to {}", active, target);
        if let Err(e) = ctx.layout.current_pointer().point_to(Path::new(target.name())).await {
            error!("Could not switch current pointer: {}", e);
            return RollbackOutcome::Unrecoverable {
                reason: e.to_string(),
            };
        }

        let service = self.service(target);
        info!("Note: Update your proxy/load balancer to port {}", service.port);

        match ctx.process_manager.ensure_running(&service).await {
            Ok(()) => {
                info!("Rolled back to {}", target);
                RollbackOutcome::RolledBack {
                    target: target.name().to_string(),
                    port: Some(service.port),
                }
            }
            Err(e) => {
                error!("Switched to {} but could not start it: {}", target, e);
                RollbackOutcome::Incomplete {
                    target: target.name().to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}
