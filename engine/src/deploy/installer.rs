//! Dependency installation, dispatched on the app type

use std::path::Path;
use std::sync::Arc;

use crate::config::app::{AppConfig, AppType};
use crate::deploy::docker::ImageBuilder;
use crate::deploy::python::VirtualenvInstaller;
use crate::errors::DeployError;
use crate::exec::CommandRunner;

/// Leaves `dir` runnable, or fails without touching any pointer.
///
/// `build_tag` names the image for docker apps (the release id).
pub async fn install_dependencies(
    runner: Arc<dyn CommandRunner>,
    app: &AppConfig,
    dir: &Path,
    build_tag: &str,
) -> Result<(), DeployError> {
    match app.app_type {
        AppType::Python => VirtualenvInstaller::new(runner).install(dir).await,
        AppType::Docker => ImageBuilder::new(runner).build(&app.name, build_tag, dir).await,
    }
}
