//! Shipwright - Entry Point
//!
//! Invoked by the bare repository's post-receive hook after every push.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use tracing::{error, info};

use shipwright::cli::{app_name_from_git_dir, Cli, Command};
use shipwright::config::app::STARTER_APP_CONFIG;
use shipwright::config::timings::Timings;
use shipwright::filesys::file::File;
use shipwright::logs::{init_logging, LogOptions};
use shipwright::storage::layout::DeploymentLayout;
use shipwright::strategy::{RollbackOutcome, Toolkit};
use shipwright::utils::version_info;
use shipwright::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command.clone() {
        Command::Execute { git_dir, revision, root } => {
            let layout = deployment_layout(&git_dir, &root).await?;
            let _guard = start_logging(&cli, Some(&layout))?;

            let orchestrator = Orchestrator::new(Toolkit::system()?, Timings::default());
            let outcome = orchestrator.execute(&git_dir, &revision, layout.root()).await;

            if outcome.is_success() {
                println!("{} {}", "✓".green(), "Deployment successful".green().bold());
            } else {
                println!(
                    "{} {}: {}",
                    "✗".red(),
                    "Deployment failed".red().bold(),
                    outcome.cause.as_deref().unwrap_or("unknown cause")
                );
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            Ok(if outcome.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Rollback { git_dir, revision, root } => {
            let layout = deployment_layout(&git_dir, &root).await?;
            let _guard = start_logging(&cli, Some(&layout))?;

            let orchestrator = Orchestrator::new(Toolkit::system()?, Timings::default());
            let outcome = orchestrator.rollback(&git_dir, &revision, layout.root()).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            match outcome {
                RollbackOutcome::RolledBack { target, .. } => {
                    println!("{} Rolled back to {}", "✓".green(), target.bold());
                    Ok(ExitCode::SUCCESS)
                }
                other => {
                    error!("Rollback incomplete: {:?}", other);
                    println!("{} {}", "✗".red(), "Rollback incomplete".red().bold());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Init { path } => {
            let _guard = start_logging(&cli, None)?;
            let file = File::new(&path);
            if file.exists().await {
                bail!("{} already exists", path.display());
            }
            file.write_string(STARTER_APP_CONFIG).await?;
            info!("Wrote {}", path.display());
            println!("{} Created {}", "✓".green(), path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            println!("{}", serde_json::to_string_pretty(&version_info())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Deployment root for the app pushed to `git_dir`; it must already exist
async fn deployment_layout(git_dir: &Path, root: &Path) -> anyhow::Result<DeploymentLayout> {
    let app = app_name_from_git_dir(git_dir)
        .with_context(|| format!("Cannot derive app name from {}", git_dir.display()))?;
    let base_dir: PathBuf = root.join(&app);
    if !tokio::fs::metadata(&base_dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        bail!(
            "Deployment directory not found: {} (run host setup first)",
            base_dir.display()
        );
    }
    Ok(DeploymentLayout::new(base_dir))
}

fn start_logging(
    cli: &Cli,
    layout: Option<&DeploymentLayout>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let log_dir = match layout {
        Some(layout) if !cli.no_log_file => Some(layout.logs_dir().path().to_path_buf()),
        _ => None,
    };
    let guard = init_logging(LogOptions {
        log_level: cli.log_level,
        stdout: true,
        log_dir,
        json_format: cli.log_json,
    })?;
    Ok(guard)
}
