//! Clock port for obtaining the current time and waiting.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Boxed future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Provides the current time and timed suspension.
///
/// Abstracting time allows the fixed start-up, warm-up and retry delays to
/// be observed and skipped in tests.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspends the calling task for `duration`.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}
