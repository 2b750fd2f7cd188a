//! Deploys a target, keeps the deployment log, and checks the deployed app.
//!
//! Three activities can end a deployment: the deploy process, the log
//! writer, and the verification pass. Errors from any of them finish the run
//! at once. The deployed app is only probed after the process exited cleanly
//! and the log was saved.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{HarnessConfig, Timings};
use crate::context::ServiceContext;
use crate::error::HarnessError;
use crate::manifest::Target;
use crate::ports::{Clock, CommandSpec};
use crate::probe::verification_pass;
use crate::process::{CompletionGuard, ExitDisposition, Outcome, ProcessRunner};

use super::log::{DeploymentLog, LogWatch};

/// Arguments of the deploy command for `target`.
#[must_use]
pub fn deploy_command(config: &HarnessConfig, target: &Target) -> CommandSpec {
    let promote = if target.promote { "--promote" } else { "--no-promote" };
    CommandSpec::new(
        &config.deploy_program,
        [
            "app",
            "deploy",
            "app.yaml",
            "-q",
            "--project",
            config.project_id.as_str(),
            "--version",
            target.name.as_str(),
            promote,
            "--verbosity",
            "debug",
        ],
        target.dir(),
    )
}

/// A finished deployment run and the log it was writing.
#[derive(Debug)]
pub struct Deployment {
    /// Result reported for the target.
    pub outcome: Outcome,
    log: Option<LogWatch>,
}

impl Deployment {
    /// Gives the log writer up to `timings.log_settle` to save the deploy
    /// output, and returns whether it did.
    ///
    /// A failed run is reported before its log completes; this keeps the
    /// file from being cut short when the caller's runtime goes away.
    pub async fn settle_log(&mut self, clock: &dyn Clock, timings: &Timings) -> bool {
        let Some(log) = self.log.as_mut() else {
            return false;
        };
        let settled =
            tokio::time::timeout(timings.log_settle, log.saved(clock, timings.log_poll_interval))
                .await;
        if settled.is_err() {
            warn!(log_file = %log.path().display(), "deployment log not saved in time");
        }
        matches!(settled, Ok(Ok(())))
    }
}

/// Deploys `target` and verifies the deployed version.
///
/// # Errors
///
/// Returns the start error, `"<target>: failed to deploy!"` for a bad exit,
/// a log file error, or the verification result.
pub async fn test_deploy(ctx: &ServiceContext, config: &HarnessConfig, target: &Target) -> Outcome {
    deploy_target(ctx, config, target).await.outcome
}

/// Runs the deployment of `target` and hands back the log with the outcome.
///
/// Errors finish the run at once. After a clean exit the log must be saved
/// before the warm-up and the probe start.
pub async fn deploy_target(
    ctx: &ServiceContext,
    config: &HarnessConfig,
    target: &Target,
) -> Deployment {
    let spec = match target.verification_spec() {
        Ok(spec) => spec,
        Err(err) => return Deployment { outcome: Err(err), log: None },
    };
    let (guard, mut completion) = CompletionGuard::new(&target.name);
    let runner = ProcessRunner::new(ctx.processes.as_ref(), config.ci_mode);
    let log_path = DeploymentLog::path_for(&config.log_dir, &target.name, ctx.clock.now());

    let mut process = match runner.start(&target.name, &deploy_command(config, target)) {
        Ok(process) => process,
        Err(err) => {
            guard.finish(Err(err));
            return Deployment { outcome: flatten(completion.await), log: None };
        }
    };
    info!(app = %target.name, "Deploying app...");

    let log = match DeploymentLog::create(log_path).await {
        Ok(log) => log,
        Err(err) => {
            process.kill_switch().kill();
            guard.finish(Err(err));
            return Deployment { outcome: flatten(completion.await), log: None };
        }
    };
    let stdout = process.take_stdout();
    let stderr = process.take_stderr();
    let log = log.capture(&target.name, stdout, stderr, Arc::clone(&guard));
    let mut flushed = log.clone();

    let deployment = async {
        let exit = process.exit().await;
        match ExitDisposition::of(&exit) {
            ExitDisposition::Failed => {
                info!(
                    app = %target.name,
                    code = exit.code,
                    signal = exit.signal.as_deref(),
                    "ERROR"
                );
                guard.finish(Err(HarnessError::Exit {
                    message: format!("{}: failed to deploy!", target.name),
                    code: exit.code,
                    signal: exit.signal,
                }));
                return;
            }
            ExitDisposition::Killed => info!(app = %target.name, "SIGKILL received!"),
            ExitDisposition::Success => {}
        }
        info!(app = %target.name, "App deployed...");

        if let Err(err) = flushed.saved(ctx.clock.as_ref(), config.timings.log_poll_interval).await {
            guard.finish(Err(err));
            return;
        }

        ctx.clock.sleep(config.timings.warm_up).await;
        let url = config.deployed_url(&target.name);
        info!(app = %target.name, "Testing {url}");
        let result = verification_pass(
            ctx.http.as_ref(),
            ctx.clock.as_ref(),
            &url,
            &spec,
            config.max_attempts,
        )
        .await;
        if result.is_ok() {
            info!(app = %target.name, "Success!");
        }
        guard.finish(result);
    };

    let decided = tokio::select! {
        biased;
        outcome = &mut completion => Some(flatten(outcome)),
        () = deployment => None,
    };
    let outcome = match decided {
        Some(outcome) => outcome,
        None => flatten(completion.await),
    };
    Deployment { outcome, log: Some(log) }
}

fn flatten(completed: Result<Outcome, HarnessError>) -> Outcome {
    completed.and_then(|outcome| outcome)
}
