//! Checks a probe outcome against what the target is expected to serve.

use regex::Regex;

use super::backoff::RequestOutcome;
use crate::error::HarnessError;
use crate::ports::HttpResponse;

/// Status accepted for every target.
pub const OK_STATUS: u16 = 200;

/// Expected response of one target.
#[derive(Debug, Clone)]
pub struct VerificationSpec {
    /// Label used in failure messages.
    pub target_label: String,
    /// Text the body must contain.
    pub expected_substring: String,
    /// Status accepted in addition to 200 (e.g. a redirect).
    pub alternate_status: Option<u16>,
    /// Pattern the body must also match.
    pub body_pattern: Option<Regex>,
}

impl VerificationSpec {
    /// Expects a 200 whose body contains `expected_substring`.
    pub fn new(target_label: impl Into<String>, expected_substring: impl Into<String>) -> Self {
        Self {
            target_label: target_label.into(),
            expected_substring: expected_substring.into(),
            alternate_status: None,
            body_pattern: None,
        }
    }

    /// Also accepts `status`.
    #[must_use]
    pub fn with_alternate_status(mut self, status: u16) -> Self {
        self.alternate_status = Some(status);
        self
    }

    /// Also requires the body to match `pattern`.
    #[must_use]
    pub fn with_body_pattern(mut self, pattern: Regex) -> Self {
        self.body_pattern = Some(pattern);
        self
    }

    /// Returns `true` when `response` meets every configured condition.
    ///
    /// An empty body never passes, even against an empty expectation.
    #[must_use]
    pub fn accepts(&self, response: &HttpResponse) -> bool {
        let body_ok =
            !response.body.is_empty() && response.body.contains(&self.expected_substring);
        let status_ok =
            response.status == OK_STATUS || Some(response.status) == self.alternate_status;
        let pattern_ok = self.body_pattern.as_ref().is_none_or(|re| re.is_match(&response.body));
        body_ok && status_ok && pattern_ok
    }
}

/// Decides whether a probe outcome passes `spec`.
///
/// # Errors
///
/// Passes a transport error through unchanged; otherwise returns
/// [`HarnessError::Verification`] with the expected text and the actual body.
pub fn verify(outcome: RequestOutcome, spec: &VerificationSpec) -> Result<(), HarnessError> {
    let response = outcome?;
    if spec.accepts(&response) {
        return Ok(());
    }
    Err(HarnessError::Verification {
        label: spec.target_label.clone(),
        expected: spec.expected_substring.clone(),
        status: response.status,
        actual: response.body,
    })
}
