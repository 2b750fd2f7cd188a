//! HTTP probing: the backoff requester and the response verifier.

pub mod backoff;
pub mod verify;

pub use backoff::{probe, retry_delay, RequestOutcome, BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use verify::{verify, VerificationSpec, OK_STATUS};

use crate::error::HarnessError;
use crate::ports::{Clock, HttpClient};

/// One verification pass: probe `url`, then check the outcome against `spec`.
///
/// # Errors
///
/// Returns a transport error if no response arrived within `max_attempts`,
/// or a verification failure if the response did not match.
pub async fn verification_pass(
    http: &dyn HttpClient,
    clock: &dyn Clock,
    url: &str,
    spec: &VerificationSpec,
    max_attempts: u32,
) -> Result<(), HarnessError> {
    verify(probe(http, clock, url, max_attempts).await, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{ScriptedClock, ScriptedHttpClient};
    use crate::ports::HttpResponse;

    #[tokio::test]
    async fn refused_three_times_then_healthy_passes() {
        let http = ScriptedHttpClient::new(vec![
            Err("connection refused".into()),
            Err("connection refused".into()),
            Err("connection refused".into()),
            Ok(HttpResponse::new(200, "OK: healthy")),
        ]);
        let clock = ScriptedClock::default();
        let spec = VerificationSpec::new("health", "healthy");

        let result =
            verification_pass(&http, &clock, "http://example.test/health", &spec, 8).await;

        assert!(result.is_ok());
        assert_eq!(http.requests(), vec!["http://example.test/health".to_string(); 4]);
    }
}
