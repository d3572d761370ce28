//! Creates and retires timestamp-identified release snapshots

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::deploy::git::Git;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::models::release::{Release, ReleaseId};
use crate::storage::layout::DeploymentLayout;

/// Releases kept by retention
pub const KEEP_RELEASES: usize = 3;

/// Owns `releases/` inside a deployment root
#[derive(Clone)]
pub struct ReleaseManager {
    layout: DeploymentLayout,
    git: Git,
}

impl ReleaseManager {
    pub fn new(layout: DeploymentLayout, git: Git) -> Self {
        Self { layout, git }
    }

    /// Directory of a release id
    pub fn release_dir(&self, id: ReleaseId) -> Dir {
        self.layout.releases_dir().subdir(&id.to_string())
    }

    /// Existing release ids, ascending. Non-numeric entries are ignored.
    pub async fn list(&self) -> Result<Vec<ReleaseId>, DeployError> {
        let releases_dir = self.layout.releases_dir();
        if !releases_dir.exists().await {
            return Ok(Vec::new());
        }

        let mut ids: Vec<ReleaseId> = releases_dir
            .list_dirs()
            .await?
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.parse().ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Check out `revision` from `source` into a fresh release directory.
    ///
    /// A failed checkout leaves no directory behind.
    pub async fn create(&self, source: &Path, revision: &str) -> Result<Release, DeployError> {
        self.layout.releases_dir().create().await?;

        let existing = self.list().await?;
        let id = allocate_id(&existing, chrono::Utc::now().timestamp());
        let dir = self.release_dir(id);
        info!("Creating release: {}", dir.path().display());

        if let Err(e) = self.git.checkout(source, revision, dir.path()).await {
            if let Err(cleanup) = dir.delete().await {
                warn!("Could not remove failed release {}: {}", id, cleanup);
            }
            return Err(e);
        }

        info!("Release created: {}", id);
        Ok(Release {
            id,
            dir: dir.path().to_path_buf(),
            revision: revision.to_string(),
        })
    }

    /// Delete all but the newest `keep` releases.
    ///
    /// Releases behind the `current` or `previous` pointer are never
    /// deleted. Returns the ids that were removed.
    pub async fn retire(&self, keep: usize) -> Result<Vec<ReleaseId>, DeployError> {
        let ids = self.list().await?;
        if ids.len() <= keep {
            return Ok(Vec::new());
        }

        let mut protected = HashSet::new();
        for pointer in [self.layout.current_pointer(), self.layout.previous_pointer()] {
            if let Some(name) = pointer.target_name().await? {
                protected.insert(name);
            }
        }

        let cutoff = ids.len() - keep;
        let mut removed = Vec::new();
        for id in &ids[..cutoff] {
            let name = id.to_string();
            if protected.contains(&name) {
                info!("Keeping release {} (referenced by a pointer)", name);
                continue;
            }
            info!("Cleaning up: {}", name);
            match self.release_dir(*id).delete().await {
                Ok(()) => removed.push(*id),
                Err(e) => warn!("Could not remove release {}: {}", name, e),
            }
        }
        Ok(removed)
    }
}

/// Next release id: the current timestamp, bumped past any existing id
fn allocate_id(existing: &[ReleaseId], now: i64) -> ReleaseId {
    match existing.iter().max() {
        Some(last) if last.0 >= now => ReleaseId(last.0 + 1),
        _ => ReleaseId(now),
    }
}
