//! Container image builds for docker apps

use std::cmp::Reverse;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::filesys::file::File;

/// Number of built images kept per app
pub const KEEP_IMAGES: usize = 3;

/// Builds, tags and prunes app images through the `docker` CLI
#[derive(Clone)]
pub struct ImageBuilder {
    runner: Arc<dyn CommandRunner>,
}

impl ImageBuilder {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        self.runner
            .run(spec)
            .await
            .map_err(|e| DeployError::BuildError(format!("{} failed: {}", spec, e)))
    }

    /// Build `<image>:<tag>` from `context_dir`, float `latest`, prune old tags
    pub async fn build(&self, image: &str, tag: &str, context_dir: &Path) -> Result<(), DeployError> {
        if !File::new(context_dir.join("Dockerfile")).exists().await {
            return Err(DeployError::BuildError(
                "Dockerfile not found in release directory".to_string(),
            ));
        }

        let image_tag = format!("{}:{}", image, tag);
        info!("Building Docker image: {}...", image_tag);
        let build = CommandSpec::new("docker")
            .args(["build", "-t", &image_tag])
            .path_arg(context_dir);
        let output = self.run(&build).await?;
        if !output.success() {
            return Err(DeployError::BuildError(format!(
                "Docker build failed: {}",
                output.failure_detail()
            )));
        }
        info!("Image built: {}", image_tag);

        let latest = format!("{}:latest", image);
        let output = self
            .run(&CommandSpec::new("docker").args(["tag", &image_tag, &latest]))
            .await?;
        if !output.success() {
            return Err(DeployError::BuildError(format!(
                "Failed to tag {} as latest: {}",
                image_tag,
                output.failure_detail()
            )));
        }

        self.prune(image).await;
        Ok(())
    }

    /// Remove all but the newest [`KEEP_IMAGES`] tags, oldest first.
    ///
    /// Failures only produce warnings.
    pub async fn prune(&self, image: &str) {
        if let Err(e) = self.prune_inner(image).await {
            warn!("Could not cleanup old images for {}: {}", image, e);
        }
    }

    async fn prune_inner(&self, image: &str) -> Result<(), DeployError> {
        let list = CommandSpec::new("docker").args(["images", image, "--format", "{{.Tag}}"]);
        let output = self.runner.run(&list).await?;
        if !output.success() {
            return Err(DeployError::BuildError(output.failure_detail()));
        }

        let stale = stale_tags(&output.stdout, KEEP_IMAGES);
        for tag in stale {
            let image_tag = format!("{}:{}", image, tag);
            debug!("Removing old image: {}", image_tag);
            match self.runner.run(&CommandSpec::new("docker").args(["rmi", &image_tag])).await {
                Ok(out) if out.success() => info!("Removed old image: {}", image_tag),
                Ok(out) => warn!("Could not remove {}: {}", image_tag, out.failure_detail()),
                Err(e) => warn!("Could not remove {}: {}", image_tag, e),
            }
        }
        Ok(())
    }
}

/// Tags beyond the newest `keep`, ordered oldest first.
///
/// Numeric (timestamp) tags order numerically and rank above anything else.
fn stale_tags(listing: &str, keep: usize) -> Vec<String> {
    let mut tags: Vec<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "latest" && *t != "<none>")
        .collect();
    tags.sort_by_key(|t| Reverse((t.parse::<i64>().ok(), t.to_string())));
    tags.dedup();

    let mut stale: Vec<String> = tags.into_iter().skip(keep).map(str::to_string).collect();
    stale.reverse();
    stale
}
