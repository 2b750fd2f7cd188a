//! Scripted adapter for the Clock port.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::ports::clock::{Clock, SleepFuture};

/// Virtual clock: sleeps return at once and advance virtual time.
///
/// Every requested duration is recorded so tests can assert on the exact
/// delays a workflow asked for.
pub struct ScriptedClock {
    start: DateTime<Utc>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ScriptedClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    fn starting_at(start: DateTime<Utc>) -> Self {
        Self { start, sleeps: Mutex::new(Vec::new()) }
    }

    /// Durations requested so far, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("clock lock poisoned").clone()
    }

    /// Total virtual time slept.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for ScriptedClock {
    fn default() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).single().unwrap_or_default())
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or_default();
        self.start + elapsed
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        self.sleeps.lock().expect("clock lock poisoned").push(duration);
        // Yield so tasks sharing the current-thread runtime make progress.
        Box::pin(tokio::task::yield_now())
    }
}
