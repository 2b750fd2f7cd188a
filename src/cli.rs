//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::parse_override;

/// Top-level CLI parser for `appcheck`.
#[derive(Debug, Parser)]
#[command(name = "appcheck", version, about = "Install, run, deploy and verify sample web apps")]
pub struct Cli {
    /// Target manifest (defaults to `$APPCHECK_MANIFEST`, then `appcheck.yaml`).
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// JSON settings file (defaults to `config.json` if present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override a setting; may be repeated.
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, String)>,

    /// Do not echo child stderr (implied by `TRAVIS` or `CI`).
    #[arg(long, global = true)]
    pub ci: bool,

    /// Directory for deployment logs.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install a target's dependencies.
    Install(Selection),
    /// Run a target locally and verify its response.
    Local(Selection),
    /// Deploy a target and verify the deployed version.
    Deploy(Selection),
    /// Resolve and validate settings, then print them.
    Config,
    /// List the targets in the manifest.
    Targets,
}

/// One named target or all of them.
#[derive(Debug, Args)]
pub struct Selection {
    /// Target name from the manifest.
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub target: Option<String>,

    /// Apply to every target in the manifest.
    #[arg(long)]
    pub all: bool,
}
