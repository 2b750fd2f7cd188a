//! `appcheck install` command.

use crate::cli::Selection;
use crate::context::ServiceContext;
use crate::workflow::install_dependencies;

use super::{runtime, summarize, Session};

/// Execute the `install` command.
///
/// Targets are installed one after another; with `--all` every target is
/// attempted even after a failure.
///
/// # Errors
///
/// Returns an error string naming the target(s) whose installation failed.
pub fn run(ctx: &ServiceContext, session: &Session, selection: &Selection) -> Result<(), String> {
    let targets = session.select(selection)?;
    let rt = runtime()?;
    let outcomes = targets
        .iter()
        .map(|target| {
            let outcome = rt.block_on(install_dependencies(ctx, &session.config, target));
            (target.name.clone(), outcome)
        })
        .collect();
    summarize("install", outcomes)
}
