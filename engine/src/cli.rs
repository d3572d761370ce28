//! Command-line interface

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::logs::LogLevel;
use crate::storage::layout::DEFAULT_DEPLOYMENTS_DIR;

/// Command-line arguments for `shipwright`
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shipwright",
    version,
    about = "Push-to-deploy engine: releases, blue-green slots and rolling reloads.",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Logging level (error, warn, info, debug, trace); `RUST_LOG` wins
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Do not write `<root>/<app>/logs/deploy.log`
    #[arg(long, global = true)]
    pub no_log_file: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy a revision pushed to a bare repository
    Execute {
        /// Bare repository the revision was pushed to, e.g. `/srv/git/shop.git`
        git_dir: PathBuf,

        /// Revision to deploy
        revision: String,

        /// Directory holding one deployment root per app
        #[arg(long, value_name = "DIR", default_value = DEFAULT_DEPLOYMENTS_DIR)]
        root: PathBuf,
    },

    /// Switch back to the previous release or slot
    Rollback {
        git_dir: PathBuf,

        /// Revision whose deploy.yml selects the strategy
        #[arg(long, default_value = "HEAD")]
        revision: String,

        #[arg(long, value_name = "DIR", default_value = DEFAULT_DEPLOYMENTS_DIR)]
        root: PathBuf,
    },

    /// Write a starter deploy.yml
    Init {
        #[arg(long, value_name = "PATH", default_value = "deploy.yml")]
        path: PathBuf,
    },

    /// Print version information as JSON
    Version,
}

/// App name derived from the repository directory (`shop.git` -> `shop`)
pub fn app_name_from_git_dir(git_dir: &Path) -> Option<String> {
    let name = git_dir.file_name()?.to_str()?;
    let name = name.strip_suffix(".git").unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
