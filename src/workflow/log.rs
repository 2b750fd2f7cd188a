//! Persisted output of one deployment attempt.
//!
//! stdout and stderr are copied into one append-mode file. Each stream's
//! drain is tracked on its own; once both have drained the file is flushed
//! and synced, and only then is the log complete.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::error::HarnessError;
use crate::ports::{Clock, OutputStream};
use crate::process::{CompletionGuard, Outcome};

/// Progress of a deployment log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogState {
    /// stdout reached end-of-data.
    pub stdout_drained: bool,
    /// stderr reached end-of-data.
    pub stderr_drained: bool,
    /// Both drained and the file was flushed and synced.
    pub saved: bool,
}

/// An open deployment log file.
#[derive(Debug)]
pub struct DeploymentLog {
    path: PathBuf,
    file: File,
}

impl DeploymentLog {
    /// `<log_dir>/<target>-<epoch_ms>.txt`
    #[must_use]
    pub fn path_for(log_dir: &Path, target: &str, now: DateTime<Utc>) -> PathBuf {
        log_dir.join(format!("{target}-{}.txt", now.timestamp_millis()))
    }

    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::LogFile`] if the file cannot be opened.
    pub async fn create(path: PathBuf) -> Result<Self, HarnessError> {
        match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(file) => Ok(Self { path, file }),
            Err(source) => Err(HarnessError::LogFile { path, source }),
        }
    }

    /// Copies both streams into the file in the background.
    ///
    /// A write failure finishes `guard` with [`HarnessError::LogFile`]. A
    /// missing stream counts as already drained.
    pub fn capture(
        self,
        target: &str,
        stdout: Option<OutputStream>,
        stderr: Option<OutputStream>,
        guard: Arc<CompletionGuard<Outcome>>,
    ) -> LogWatch {
        let (state_tx, state_rx) = watch::channel(LogState::default());
        let path = self.path.clone();
        let target = target.to_string();

        tokio::spawn(async move {
            let file = Mutex::new(self.file);
            let state = &state_tx;
            let (out, err) = tokio::join!(
                async {
                    copy_into(stdout, &file).await?;
                    state.send_modify(|s| s.stdout_drained = true);
                    Ok::<_, io::Error>(())
                },
                async {
                    copy_into(stderr, &file).await?;
                    state.send_modify(|s| s.stderr_drained = true);
                    Ok::<_, io::Error>(())
                },
            );
            let result = match out.and(err) {
                Ok(()) => {
                    let mut file = file.into_inner();
                    match file.flush().await {
                        Ok(()) => file.sync_all().await,
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    info!(app = %target, log_file = %self.path.display(), "Saved logfile");
                    state_tx.send_modify(|s| s.saved = true);
                }
                Err(source) => {
                    guard.finish(Err(HarnessError::LogFile { path: self.path, source }));
                }
            }
        });

        LogWatch { path, state: state_rx }
    }
}

async fn copy_into(stream: Option<OutputStream>, file: &Mutex<File>) -> io::Result<()> {
    let Some(mut stream) = stream else {
        return Ok(());
    };
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(error) => {
                // A broken pipe from the child ends its stream; the file is still fine.
                debug!(%error, "child output stream failed; treating as drained");
                return Ok(());
            }
        };
        file.lock().await.write_all(&buf[..n]).await?;
    }
}

/// Observes a log being captured.
#[derive(Debug, Clone)]
pub struct LogWatch {
    path: PathBuf,
    state: watch::Receiver<LogState>,
}

impl LogWatch {
    /// Log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current progress.
    #[must_use]
    pub fn state(&self) -> LogState {
        *self.state.borrow()
    }

    /// Waits until the log is saved, waking at least every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::LogFile`] if the writer stopped without saving.
    pub async fn saved(&mut self, clock: &dyn Clock, interval: Duration) -> Result<(), HarnessError> {
        loop {
            if self.state.borrow_and_update().saved {
                return Ok(());
            }
            tokio::select! {
                changed = self.state.changed() => {
                    if changed.is_err() && !self.state.borrow().saved {
                        return Err(HarnessError::LogFile {
                            path: self.path.clone(),
                            source: io::Error::other("log writer stopped before saving"),
                        });
                    }
                }
                () = clock.sleep(interval) => {
                    debug!(log_file = %self.path.display(), "waiting for deployment log");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{stream, ScriptedClock, ScriptedStream};
    use chrono::TimeZone;

    fn temp_log(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("appcheck-log-{name}-{}.txt", std::process::id()))
    }

    fn boxed(s: ScriptedStream) -> Option<OutputStream> {
        Some(Box::pin(s))
    }

    #[test]
    fn path_uses_target_and_epoch_millis() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap();
        let path = DeploymentLog::path_for(Path::new("/var/log"), "myapp", now);
        assert_eq!(path, PathBuf::from(format!("/var/log/myapp-{}.txt", now.timestamp_millis())));
    }

    #[tokio::test]
    async fn saves_both_streams_once_drained() {
        let path = temp_log("both");
        std::fs::remove_file(&path).ok();
        let (guard, _completion) = CompletionGuard::new("myapp");
        let log = DeploymentLog::create(path.clone()).await.unwrap();
        let (out_feed, out) = stream();
        let mut watch = log.capture(
            "myapp",
            boxed(out),
            boxed(ScriptedStream::closed_with("deploy: uploading\n")),
            Arc::clone(&guard),
        );

        out_feed.send("Updating service\n");
        while !watch.state().stderr_drained {
            watch.state.changed().await.unwrap();
        }
        let state = watch.state();
        assert!(state.stderr_drained);
        assert!(!state.stdout_drained);
        assert!(!state.saved);

        out_feed.close();
        watch.saved(&ScriptedClock::default(), Duration::from_millis(1000)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Updating service"));
        assert!(text.contains("deploy: uploading"));
        assert!(!guard.is_finished());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn appends_to_an_existing_file() {
        let path = temp_log("append");
        std::fs::write(&path, "earlier\n").unwrap();
        let (guard, _completion) = CompletionGuard::new("myapp");

        let log = DeploymentLog::create(path.clone()).await.unwrap();
        let mut watch =
            log.capture("myapp", boxed(ScriptedStream::closed_with("later\n")), None, guard);
        watch.saved(&ScriptedClock::default(), Duration::from_millis(1000)).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn waiting_wakes_on_the_poll_interval() {
        let path = temp_log("poll");
        let (guard, _completion) = CompletionGuard::new("myapp");
        let log = DeploymentLog::create(path.clone()).await.unwrap();
        let (feed, out) = stream();
        let mut watch = log.capture("myapp", boxed(out), None, guard);
        let clock = ScriptedClock::default();

        let wait = watch.saved(&clock, Duration::from_millis(1000));
        tokio::pin!(wait);
        for _ in 0..3 {
            assert!(poll_once(wait.as_mut()).await.is_none());
        }
        drop(feed);
        wait.await.unwrap();

        assert!(clock.sleeps().iter().all(|d| *d == Duration::from_millis(1000)));
        assert!(!clock.sleeps().is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn unopenable_path_is_a_log_error() {
        let path = std::env::temp_dir().join("appcheck-missing-dir").join("nested").join("x.txt");
        let err = DeploymentLog::create(path).await.unwrap_err();
        assert!(matches!(err, HarnessError::LogFile { .. }));
    }

    async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            out = fut => Some(out),
            () = tokio::task::yield_now() => None,
        }
    }
}
