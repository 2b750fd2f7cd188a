//! Command dispatch and handlers.

pub mod config;
pub mod deploy;
pub mod install;
pub mod local;
pub mod targets;

use std::env;
use std::path::PathBuf;

use tracing::error;

use crate::cli::{Cli, Command, Selection};
use crate::config::{ci_detected, HarnessConfig, Settings, SettingsSources};
use crate::context::ServiceContext;
use crate::error::HarnessError;
use crate::manifest::{Manifest, Target, DEFAULT_MANIFEST};
use crate::process::Outcome;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    dispatch_with_context(cli, &ServiceContext::live())
}

/// Dispatch a command with the given service context.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch_with_context(cli: &Cli, ctx: &ServiceContext) -> Result<(), String> {
    match &cli.command {
        Command::Config => config::run(&sources(cli)),
        Command::Targets => targets::run(&manifest_path(cli)),
        Command::Install(selection) => install::run(ctx, &Session::load(cli)?, selection),
        Command::Local(selection) => local::run(ctx, &Session::load(cli)?, selection),
        Command::Deploy(selection) => deploy::run(ctx, &Session::load(cli)?, selection),
    }
}

/// Resolved configuration and manifest shared by the workflow commands.
#[derive(Debug, Clone)]
pub struct Session {
    /// Immutable harness configuration.
    pub config: HarnessConfig,
    /// Known targets.
    pub manifest: Manifest,
}

impl Session {
    /// Resolves settings and loads the manifest named by `cli`.
    ///
    /// # Errors
    ///
    /// Returns an error if settings are incomplete or the manifest is unusable.
    pub fn load(cli: &Cli) -> Result<Self, String> {
        let settings = Settings::load(&sources(cli)).map_err(|e| e.to_string())?;
        settings.validate().map_err(|e| e.to_string())?;
        let ci_mode = cli.ci || ci_detected(|key| env::var(key).ok());
        let config = HarnessConfig::from_settings(&settings, ci_mode)
            .map_err(|e| e.to_string())?
            .with_log_dir(&cli.log_dir);
        let manifest = Manifest::load(&manifest_path(cli)).map_err(|e| e.to_string())?;
        Ok(Self { config, manifest })
    }

    /// Targets named by `selection`, in manifest order for `--all`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown target name or an empty manifest.
    pub fn select(&self, selection: &Selection) -> Result<Vec<Target>, String> {
        if selection.all {
            if self.manifest.targets.is_empty() {
                return Err("The manifest lists no targets.".to_string());
            }
            return Ok(self.manifest.targets.clone());
        }
        let name = selection.target.as_deref().ok_or("Give a target name or --all.")?;
        let target = self.manifest.target(name).map_err(|e| e.to_string())?;
        Ok(vec![target.clone()])
    }
}

fn sources(cli: &Cli) -> SettingsSources {
    SettingsSources::new(cli.overrides.clone(), cli.config.clone())
}

fn manifest_path(cli: &Cli) -> PathBuf {
    cli.manifest
        .clone()
        .or_else(|| env::var_os("APPCHECK_MANIFEST").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST))
}

/// Single-threaded runtime the workflows run on.
fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| HarnessError::Runtime(e).to_string())
}

/// Turns per-target outcomes into the command result.
///
/// A single failure is returned as is; several are summarized after each
/// one has been logged.
fn summarize(verb: &str, outcomes: Vec<(String, Outcome)>) -> Result<(), String> {
    let total = outcomes.len();
    let failures: Vec<(String, HarnessError)> = outcomes
        .into_iter()
        .filter_map(|(name, outcome)| outcome.err().map(|err| (name, err)))
        .collect();
    match failures.as_slice() {
        [] => Ok(()),
        [(_, err)] if total == 1 => Err(err.to_string()),
        _ => {
            for (name, err) in &failures {
                error!(app = %name, "{err}");
            }
            let names: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
            Err(format!(
                "{} of {total} target(s) failed to {verb}: {}",
                failures.len(),
                names.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn summarize_passes_single_errors_through() {
        let result = summarize(
            "deploy",
            vec![(
                "myapp".into(),
                Err(HarnessError::Exit {
                    message: "myapp: failed to deploy!".into(),
                    code: Some(1),
                    signal: None,
                }),
            )],
        );
        assert_eq!(result.unwrap_err(), "myapp: failed to deploy!");
    }

    #[test]
    fn summarize_lists_failed_targets() {
        let result = summarize(
            "install",
            vec![
                ("a".into(), Ok(())),
                ("b".into(), Err(HarnessError::Installation { target: "b".into(), code: Some(1) })),
                ("c".into(), Err(HarnessError::Installation { target: "c".into(), code: Some(2) })),
            ],
        );
        assert_eq!(result.unwrap_err(), "2 of 3 target(s) failed to install: b, c");
        assert!(summarize("install", vec![("a".into(), Ok(()))]).is_ok());
    }

    #[test]
    fn manifest_flag_wins_over_default() {
        let cli = Cli::parse_from(["appcheck", "--manifest", "apps.yaml", "targets"]);
        assert_eq!(manifest_path(&cli), PathBuf::from("apps.yaml"));
    }

    #[test]
    fn select_finds_named_and_all_targets() {
        let session = Session {
            config: crate::workflow::testing::Fixture::new(
                crate::adapters::scripted::ScriptedProcessLauncher::new(),
                vec![],
            )
            .config,
            manifest: Manifest::parse("targets:\n  - {name: a, msg: x}\n  - {name: b, msg: y}\n")
                .unwrap(),
        };
        let all = Selection { target: None, all: true };
        let one = Selection { target: Some("b".into()), all: false };
        let missing = Selection { target: Some("z".into()), all: false };

        assert_eq!(session.select(&all).unwrap().len(), 2);
        assert_eq!(session.select(&one).unwrap()[0].name, "b");
        assert!(session.select(&missing).unwrap_err().contains("unknown target"));
    }
}
