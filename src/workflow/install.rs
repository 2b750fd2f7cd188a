//! Dependency installation for one target.

use std::sync::Arc;

use tracing::info;

use crate::config::HarnessConfig;
use crate::context::ServiceContext;
use crate::error::HarnessError;
use crate::manifest::Target;
use crate::ports::CommandSpec;
use crate::process::{CompletionGuard, Outcome, ProcessRunner};

/// Command that installs a target's dependencies.
#[must_use]
pub fn install_command(config: &HarnessConfig, target: &Target) -> CommandSpec {
    CommandSpec::new(&config.install_program, ["install"], target.dir())
}

/// Installs `target`'s dependencies. Succeeds only on exit code 0.
///
/// # Errors
///
/// Returns [`HarnessError::Start`] if the installer cannot be launched and
/// [`HarnessError::Installation`] for any other exit.
pub async fn install_dependencies(
    ctx: &ServiceContext,
    config: &HarnessConfig,
    target: &Target,
) -> Outcome {
    let (guard, completion) = CompletionGuard::new(&target.name);
    let runner = ProcessRunner::new(ctx.processes.as_ref(), config.ci_mode);

    info!(app = %target.name, "Installing dependencies...");
    match runner.start(&target.name, &install_command(config, target)) {
        Ok(mut process) => {
            process.forward_diagnostics();
            let name = target.name.clone();
            process.report_exit(Arc::clone(&guard), move |exit| {
                Some(if exit.success() {
                    Ok(())
                } else {
                    Err(HarnessError::Installation { target: name, code: exit.code })
                })
            });
        }
        Err(err) => {
            guard.finish(Err(err));
        }
    }
    drop(guard);

    completion.await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{ScriptedProcess, ScriptedProcessLauncher};
    use crate::ports::ProcessExit;
    use crate::workflow::testing::Fixture;

    #[tokio::test]
    async fn runs_npm_install_in_the_target_dir() {
        let fx = Fixture::new(
            ScriptedProcessLauncher::new().then(ScriptedProcess::exiting(ProcessExit::code(0))),
            vec![],
        );
        let target = Target::new("1-hello-world", "Hello");

        install_dependencies(&fx.ctx(), &fx.config, &target).await.unwrap();

        assert_eq!(
            fx.launcher.launched(),
            vec![CommandSpec::new("npm", ["install"], "1-hello-world")]
        );
    }

    #[tokio::test]
    async fn nonzero_exit_fails_with_the_target_name() {
        let fx = Fixture::new(
            ScriptedProcessLauncher::new().then(ScriptedProcess::exiting(ProcessExit::code(1))),
            vec![],
        );
        let target = Target::new("2-structured-data", "Books");

        let err = install_dependencies(&fx.ctx(), &fx.config, &target).await.unwrap_err();

        assert_eq!(err.to_string(), "2-structured-data: failed to install dependencies!");
    }

    #[tokio::test]
    async fn killed_installer_is_still_a_failure() {
        let fx = Fixture::new(
            ScriptedProcessLauncher::new().then(ScriptedProcess::exiting(ProcessExit::killed())),
            vec![],
        );

        let err = install_dependencies(&fx.ctx(), &fx.config, &Target::new("app", "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Installation { code: None, .. }));
    }

    #[tokio::test]
    async fn missing_installer_is_a_start_error() {
        let fx = Fixture::new(ScriptedProcessLauncher::new().then_fail("npm: not found"), vec![]);

        let err = install_dependencies(&fx.ctx(), &fx.config, &Target::new("app", "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Start { .. }));
    }
}
