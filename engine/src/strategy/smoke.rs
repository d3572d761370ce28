//! Smoke tests run against a blue-green target before the switch

use tracing::{info, warn};

use crate::config::app::SmokeTest;
use crate::errors::DeployError;
use crate::exec::CommandSpec;
use crate::filesys::file::File;
use crate::health::local_url;
use crate::strategy::DeployContext;

/// Run every configured smoke test against the app on `port`.
///
/// Stops at the first failure.
pub async fn run_smoke_tests(ctx: &DeployContext, port: u16) -> Result<(), DeployError> {
    if ctx.app.smoke_tests.is_empty() {
        return Ok(());
    }

    info!("Running smoke tests...");
    for test in &ctx.app.smoke_tests {
        match test {
            SmokeTest::Http {
                endpoint,
                method,
                expected_status,
                expected_body,
            } => {
                let url = local_url(port, endpoint)?;
                let response = ctx
                    .http
                    .request(method.clone(), &url, ctx.timings.smoke_timeout)
                    .await
                    .map_err(|e| DeployError::SmokeTestFailure(format!("{}: {}", url, e)))?;

                if response.status != *expected_status {
                    return Err(DeployError::SmokeTestFailure(format!(
                        "{} {} returned {}, expected {}",
                        method, url, response.status, expected_status
                    )));
                }
                if let Some(expected) = expected_body {
                    if !response.body.contains(expected.as_str()) {
                        return Err(DeployError::SmokeTestFailure(format!(
                            "{} {}: unexpected response body",
                            method, url
                        )));
                    }
                }
                info!("Smoke test passed: {} {}", method, url);
            }
            SmokeTest::Script { path } => {
                let script = File::new(ctx.layout.resolve(path));
                if !script.exists().await {
                    warn!("Smoke test script {} not found, skipping", script.path().display());
                    continue;
                }

                let spec = CommandSpec::new(script.path().to_string_lossy())
                    .current_dir(ctx.layout.root())
                    .env("PORT", port.to_string());
                let output = ctx.runner.run(&spec).await.map_err(|e| {
                    DeployError::SmokeTestFailure(format!("{} could not run: {}", path, e))
                })?;
                if !output.success() {
                    return Err(DeployError::SmokeTestFailure(format!(
                        "{} failed: {}",
                        path,
                        output.failure_detail()
                    )));
                }
                info!("Smoke test passed: {}", path);
            }
        }
    }
    Ok(())
}
