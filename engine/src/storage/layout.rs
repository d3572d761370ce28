//! On-disk layout of a deployment root.
//!
//! ```text
//! <root>/
//!   config.yml            host config
//!   .env.<environment>    secrets copied into each deployed tree as .env
//!   releases/<id>/        simple + rolling snapshots
//!   current, previous     pointer links
//!   blue/code, green/code blue-green slot trees
//!   logs/deploy.log
//! ```
//!
//! Host bootstrap tooling reads the same paths, so names here are fixed.

use std::path::{Path, PathBuf};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::filesys::pointer::Pointer;
use crate::models::slot::Slot;

/// Default parent directory holding one deployment root per app
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "/opt/deployments";

/// Paths inside one app's deployment root
#[derive(Debug, Clone)]
pub struct DeploymentLayout {
    /// Deployment root for the app
    pub base_dir: PathBuf,
}

impl DeploymentLayout {
    /// Create a new layout rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.base_dir
    }

    /// Host config file
    pub fn host_config_file(&self) -> File {
        File::new(self.base_dir.join("config.yml"))
    }

    /// Secrets file for an environment name
    pub fn env_file(&self, environment: &str) -> File {
        File::new(self.base_dir.join(format!(".env.{}", environment)))
    }

    /// Release snapshots directory
    pub fn releases_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("releases"))
    }

    /// Active pointer
    pub fn current_pointer(&self) -> Pointer {
        Pointer::new(self.base_dir.join("current"))
    }

    /// Rollback pointer
    pub fn previous_pointer(&self) -> Pointer {
        Pointer::new(self.base_dir.join("previous"))
    }

    /// Blue-green slot directory
    pub fn slot_dir(&self, slot: Slot) -> Dir {
        Dir::new(self.base_dir.join(slot.name()))
    }

    /// Code tree of a blue-green slot
    pub fn slot_code_dir(&self, slot: Slot) -> Dir {
        self.slot_dir(slot).subdir("code")
    }

    /// Log directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Resolve a path relative to the deployment root
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }
}
