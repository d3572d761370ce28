//! Bounded-retry health checks

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use url::Url;

use crate::clock::Sleeper;
use crate::errors::DeployError;
use crate::health::client::HttpClient;
use crate::models::health::HealthCheckResult;

/// URL of `path` on the app listening locally on `port`
pub fn local_url(port: u16, path: &str) -> Result<String, DeployError> {
    let base = Url::parse(&format!("http://localhost:{}", port))?;
    Ok(base.join(path)?.to_string())
}

/// Polls an HTTP endpoint until it answers 200
#[derive(Clone)]
pub struct HealthProber {
    http: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
}

impl HealthProber {
    pub fn new(http: Arc<dyn HttpClient>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { http, sleeper }
    }

    /// One GET; success iff the status is 200
    pub async fn probe_once(&self, url: &str, timeout: Duration) -> HealthCheckResult {
        let started = Instant::now();
        match self.http.get(url, timeout).await {
            Ok(response) => HealthCheckResult {
                url: url.to_string(),
                status: Some(response.status),
                elapsed: started.elapsed(),
                success: response.status == 200,
                error: None,
            },
            Err(e) => HealthCheckResult {
                url: url.to_string(),
                status: None,
                elapsed: started.elapsed(),
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Sequential polling: up to `retries` attempts, sleeping `delay`
    /// between failed attempts (never after the last one).
    pub async fn check(&self, url: &str, retries: u32, delay: Duration, timeout: Duration) -> bool {
        for attempt in 1..=retries {
            let result = self.probe_once(url, timeout).await;
            if result.success {
                info!(url = %url, elapsed_ms = result.elapsed.as_millis() as u64, "Health check passed");
                return true;
            }

            match (&result.status, &result.error) {
                (Some(status), _) => warn!(
                    "Health check returned {} (attempt {}/{})",
                    status, attempt, retries
                ),
                (None, Some(err)) => warn!(
                    "Health check failed (attempt {}/{}): {}",
                    attempt, retries, err
                ),
                (None, None) => warn!("Health check failed (attempt {}/{})", attempt, retries),
            }

            if attempt < retries {
                self.sleeper.sleep(delay).await;
            }
        }

        warn!("Health check failed after {} attempts: {}", retries, url);
        false
    }

    /// `count` independent single-shot probes spaced `spacing` apart.
    ///
    /// Every probe must pass; the first failure fails the whole gate.
    pub async fn check_consecutive(
        &self,
        url: &str,
        count: u32,
        spacing: Duration,
        timeout: Duration,
    ) -> bool {
        for probe in 1..=count {
            if !self.check(url, 1, Duration::ZERO, timeout).await {
                warn!("Probe {}/{} failed for {}", probe, count, url);
                return false;
            }
            if probe < count {
                self.sleeper.sleep(spacing).await;
            }
        }
        true
    }
}
