//! Runs a target locally and checks that it serves the expected response.

use std::sync::Arc;

use tracing::info;

use crate::config::HarnessConfig;
use crate::context::ServiceContext;
use crate::error::HarnessError;
use crate::manifest::Target;
use crate::probe::verification_pass;
use crate::process::{CompletionGuard, ExitDisposition, Outcome, ProcessRunner};

/// Starts the app, probes it once it had time to boot, then kills it.
///
/// A clean exit before verification finishes the run successfully. An
/// unexpected exit ends the run with `"<target>: failed to run!"` and no
/// probe is sent.
///
/// # Errors
///
/// Returns the start error, the exit error, or the verification result.
pub async fn test_local_app(
    ctx: &ServiceContext,
    config: &HarnessConfig,
    target: &Target,
) -> Outcome {
    let spec = target.verification_spec()?;
    let (guard, mut completion) = CompletionGuard::new(&target.name);
    let runner = ProcessRunner::new(ctx.processes.as_ref(), config.ci_mode);

    let mut process = match runner.start(&target.name, &target.local_command()) {
        Ok(process) => process,
        Err(err) => {
            guard.finish(Err(err));
            return completion.await?;
        }
    };
    process.forward_diagnostics();
    let kill = process.kill_switch();

    let name = target.name.clone();
    process.report_exit(Arc::clone(&guard), move |exit| match ExitDisposition::of(exit) {
        ExitDisposition::Success => Some(Ok(())),
        ExitDisposition::Killed => {
            info!(app = %name, "SIGKILL received");
            None
        }
        ExitDisposition::Failed => Some(Err(HarnessError::Exit {
            message: format!("{name}: failed to run!"),
            code: exit.code,
            signal: exit.signal.clone(),
        })),
    });

    let verification = async {
        ctx.clock.sleep(config.timings.startup_grace).await;
        let url = config.local_url();
        info!(app = %target.name, "Testing {url}");
        let result = verification_pass(
            ctx.http.as_ref(),
            ctx.clock.as_ref(),
            &url,
            &spec,
            config.max_attempts,
        )
        .await;
        kill.kill();
        ctx.clock.sleep(config.timings.shutdown_drain).await;
        guard.finish(result);
    };

    tokio::select! {
        biased;
        outcome = &mut completion => return outcome?,
        () = verification => {}
    }
    completion.await?
}
