//! Service context bundling all port trait objects.

use std::sync::Arc;

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::http::LiveHttpClient;
use crate::adapters::live::process::LiveProcessLauncher;
use crate::ports::{Clock, HttpClient, ProcessLauncher};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Ports are shared so
/// that concurrent deployments can use one context.
#[derive(Clone)]
pub struct ServiceContext {
    /// Clock for the current time and fixed delays.
    pub clock: Arc<dyn Clock>,
    /// HTTP client for probing apps.
    pub http: Arc<dyn HttpClient>,
    /// Launcher for installer, app and deployment processes.
    pub processes: Arc<dyn ProcessLauncher>,
}

impl ServiceContext {
    /// Creates a context from explicit adapters.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        http: Arc<dyn HttpClient>,
        processes: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self { clock, http, processes }
    }

    /// Creates a live context backed by the system clock, reqwest and tokio processes.
    #[must_use]
    pub fn live() -> Self {
        Self::new(
            Arc::new(LiveClock),
            Arc::new(LiveHttpClient::new()),
            Arc::new(LiveProcessLauncher),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{ScriptedClock, ScriptedHttpClient, ScriptedProcessLauncher};

    #[test]
    fn live_context_reports_current_time() {
        let ctx = ServiceContext::live();
        let before = chrono::Utc::now();
        assert!(ctx.clock.now() >= before);
    }

    #[tokio::test]
    async fn clones_share_adapters() {
        let http = Arc::new(ScriptedHttpClient::responding(200, "ok"));
        let ctx = ServiceContext::new(
            Arc::new(ScriptedClock::default()),
            Arc::clone(&http) as Arc<dyn HttpClient>,
            Arc::new(ScriptedProcessLauncher::new()),
        );

        let copy = ctx.clone();
        copy.http.get("http://example.test").await.unwrap();

        assert_eq!(http.requests(), vec!["http://example.test".to_string()]);
    }
}
