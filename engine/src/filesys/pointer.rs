//! Atomically rewritable symlink pointers.
//!
//! A pointer is a symlink such as `current` or `previous` inside a
//! deployment root. Rewriting one never exposes a missing or half-written
//! link: the new link is created under a unique temporary name in the same
//! directory and then renamed over the old one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::DeployError;

/// A named symlink inside a deployment root
#[derive(Debug, Clone)]
pub struct Pointer {
    path: PathBuf,
}

impl Pointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the link itself exists (dangling links count)
    pub async fn is_set(&self) -> bool {
        fs::symlink_metadata(&self.path).await.is_ok()
    }

    /// Raw link target, `None` if the pointer is unset
    pub async fn target(&self) -> Result<Option<PathBuf>, DeployError> {
        match fs::read_link(&self.path).await {
            Ok(target) => Ok(Some(target)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// File name of the link target (release id or slot name)
    pub async fn target_name(&self) -> Result<Option<String>, DeployError> {
        Ok(self
            .target()
            .await?
            .and_then(|t| t.file_name().map(|n| n.to_string_lossy().into_owned())))
    }

    /// Atomically repoint this link at `target`
    pub async fn point_to(&self, target: &Path) -> Result<(), DeployError> {
        let temp = self.temp_path();
        create_symlink(target, &temp).await?;
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        debug!(pointer = %self.path.display(), target = %target.display(), "pointer updated");
        Ok(())
    }

    /// Atomically move this link over `dest`, leaving this pointer unset.
    ///
    /// Returns `false` without touching `dest` when this pointer is unset.
    pub async fn move_over(&self, dest: &Pointer) -> Result<bool, DeployError> {
        if !self.is_set().await {
            return Ok(false);
        }
        fs::rename(&self.path, &dest.path).await?;
        debug!(from = %self.path.display(), to = %dest.path.display(), "pointer moved");
        Ok(true)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pointer".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }
}

#[cfg(unix)]
async fn create_symlink(target: &Path, link: &Path) -> Result<(), DeployError> {
    fs::symlink(target, link).await?;
    Ok(())
}

#[cfg(windows)]
async fn create_symlink(target: &Path, link: &Path) -> Result<(), DeployError> {
    fs::symlink_dir(target, link).await?;
    Ok(())
}
