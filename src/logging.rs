//! Progress logging for workflow runs.
//!
//! Milestones ("Deploying app...", "Saved logfile", "Success!") are logged at
//! info; retries and process bookkeeping at debug. Output goes to stderr so
//! stdout stays free for command results.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber.
///
/// Reads `RUST_LOG`; defaults to `info`. Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .try_init();
}
