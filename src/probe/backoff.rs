//! GET with quadratic backoff on transport errors.

use std::time::Duration;

use tracing::debug;

use crate::error::HarnessError;
use crate::ports::{Clock, HttpClient, HttpResponse};

/// Attempt budget used by every verification pass.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Unit of the retry schedule; attempt `n` is followed by `BASE_DELAY * n²`.
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Result of probing a URL: a response of any status, or the last transport error.
pub type RequestOutcome = Result<HttpResponse, HarnessError>;

/// Delay to wait after failed attempt `attempt` (1-based).
#[must_use]
pub fn retry_delay(attempt: u32) -> Duration {
    BASE_DELAY.saturating_mul(attempt.saturating_mul(attempt))
}

/// Requests `url`, retrying transport failures up to `max_attempts` times.
///
/// Any response that arrives ends the probe, whatever its status. A
/// `max_attempts` of zero is treated as one.
///
/// # Errors
///
/// Returns [`HarnessError::Transport`] carrying the last transport error once
/// the attempt budget is spent.
pub async fn probe(
    http: &dyn HttpClient,
    clock: &dyn Clock,
    url: &str,
    max_attempts: u32,
) -> RequestOutcome {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match http.get(url).await {
            Ok(response) => {
                debug!(url, attempt, status = response.status, "received response");
                return Ok(response);
            }
            Err(source) if attempt >= max_attempts => {
                return Err(HarnessError::Transport { url: url.to_string(), attempts: attempt, source });
            }
            Err(error) => {
                let delay = retry_delay(attempt);
                debug!(
                    url,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    %error,
                    "request failed; retrying"
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
