//! `appcheck deploy` command.

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cli::Selection;
use crate::context::ServiceContext;
use crate::error::HarnessError;
use crate::workflow::deploy_target;

use super::{runtime, summarize, Session};

/// Execute the `deploy` command.
///
/// With `--all` every target deploys concurrently; each writes its own log.
/// A target's log is given time to be saved even when its deployment failed.
///
/// # Errors
///
/// Returns an error string naming the target(s) that failed.
pub fn run(ctx: &ServiceContext, session: &Session, selection: &Selection) -> Result<(), String> {
    let targets = session.select(selection)?;
    let rt = runtime()?;

    let outcomes = rt.block_on(async {
        let mut set = JoinSet::new();
        for target in targets {
            let ctx = ctx.clone();
            let config = session.config.clone();
            set.spawn(async move {
                let mut deployment = deploy_target(&ctx, &config, &target).await;
                deployment.settle_log(ctx.clock.as_ref(), &config.timings).await;
                (target.name, deployment.outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    match &outcome {
                        Ok(()) => info!(app = %name, "deployment verified"),
                        Err(err) if err.is_probe_failure() => {
                            warn!(app = %name, "deployed version did not pass verification");
                        }
                        Err(_) => {}
                    }
                    outcomes.push((name, outcome));
                }
                Err(err) => {
                    warn!(%err, "deployment task did not finish");
                    outcomes.push((
                        "<unknown>".to_string(),
                        Err(HarnessError::Abandoned { target: "<unknown>".to_string() }),
                    ));
                }
            }
        }
        outcomes
    });

    summarize("deploy", outcomes)
}
