//! `appcheck local` command.

use crate::cli::Selection;
use crate::context::ServiceContext;
use crate::workflow::test_local_app;

use super::{runtime, summarize, Session};

/// Execute the `local` command.
///
/// Local apps share one port, so targets run strictly one at a time.
///
/// # Errors
///
/// Returns an error string naming the target(s) that failed.
pub fn run(ctx: &ServiceContext, session: &Session, selection: &Selection) -> Result<(), String> {
    let targets = session.select(selection)?;
    let rt = runtime()?;
    let outcomes = targets
        .iter()
        .map(|target| {
            let outcome = rt.block_on(test_local_app(ctx, &session.config, target));
            (target.name.clone(), outcome)
        })
        .collect();
    summarize("run", outcomes)
}
