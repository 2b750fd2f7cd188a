//! Spawns child processes and reports how they end.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, trace, warn};

use super::completion::CompletionGuard;
use crate::error::HarnessError;
use crate::ports::{ChildProcess, CommandSpec, OutputStream, ProcessExit, ProcessLauncher};

/// How an exit is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    /// Exit code 0.
    Success,
    /// Terminated by our own kill signal; expected shutdown.
    Killed,
    /// Anything else.
    Failed,
}

impl ExitDisposition {
    /// Judges `exit`.
    #[must_use]
    pub fn of(exit: &ProcessExit) -> Self {
        if exit.success() {
            Self::Success
        } else if exit.was_killed() {
            Self::Killed
        } else {
            Self::Failed
        }
    }
}

/// Starts processes through a [`ProcessLauncher`].
pub struct ProcessRunner<'a> {
    launcher: &'a dyn ProcessLauncher,
    ci_mode: bool,
}

impl<'a> ProcessRunner<'a> {
    /// Creates a runner. In CI mode child stderr is not echoed to the log.
    #[must_use]
    pub fn new(launcher: &'a dyn ProcessLauncher, ci_mode: bool) -> Self {
        Self { launcher, ci_mode }
    }

    /// Spawns `command` on behalf of `target` and starts supervising it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Start`] if the process cannot be spawned.
    pub fn start(&self, target: &str, command: &CommandSpec) -> Result<RunningProcess, HarnessError> {
        let mut child = self.launcher.spawn(command).map_err(|source| HarnessError::Start {
            target: target.to_string(),
            program: command.program.clone(),
            source,
        })?;
        debug!(
            app = %target,
            program = %command.program,
            pid = child.id(),
            dir = %command.working_dir.display(),
            "spawned process"
        );

        let stdout = child.take_stdout();
        let stderr = child.take_stderr();
        let kill = Arc::new(Notify::new());
        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(supervise(child, Arc::clone(&kill), exit_tx, target.to_string()));

        Ok(RunningProcess {
            target: target.to_string(),
            ci_mode: self.ci_mode,
            stdout,
            stderr,
            kill: KillSwitch(kill),
            exit_rx,
        })
    }
}

/// Waits for the child to exit, killing it first if asked to.
async fn supervise(
    mut child: Box<dyn ChildProcess>,
    kill: Arc<Notify>,
    exit_tx: oneshot::Sender<ProcessExit>,
    target: String,
) {
    let result = tokio::select! {
        result = child.wait() => result,
        () = kill.notified() => {
            debug!(app = %target, "sending kill signal");
            child.kill().await
        }
    };
    let exit = result.unwrap_or_else(|error| {
        warn!(app = %target, %error, "lost track of child process");
        ProcessExit { code: None, signal: None }
    });
    let _ = exit_tx.send(exit);
}

/// Requests forceful termination of a supervised process.
#[derive(Debug, Clone)]
pub struct KillSwitch(Arc<Notify>);

impl KillSwitch {
    /// Asks the supervisor to kill the process. Repeated calls are harmless.
    pub fn kill(&self) {
        self.0.notify_one();
    }
}

/// A child process owned by one workflow invocation.
pub struct RunningProcess {
    target: String,
    ci_mode: bool,
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    kill: KillSwitch,
    exit_rx: oneshot::Receiver<ProcessExit>,
}

impl RunningProcess {
    /// Takes the stdout stream for the caller to consume.
    pub fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    /// Takes the stderr stream for the caller to consume.
    pub fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    /// Drains whatever streams have not been taken.
    ///
    /// stderr lines go to the log at info level unless CI mode is on; stdout
    /// is only visible at trace level.
    pub fn forward_diagnostics(&mut self) {
        if let Some(stderr) = self.stderr.take() {
            tokio::spawn(drain_lines(stderr, self.target.clone(), StreamKind::Stderr, !self.ci_mode));
        }
        if let Some(stdout) = self.stdout.take() {
            tokio::spawn(drain_lines(stdout, self.target.clone(), StreamKind::Stdout, false));
        }
    }

    /// Handle that can kill the process after `self` has been consumed.
    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    /// Waits for the process to exit.
    ///
    /// An exit that could not be observed is reported with neither code nor
    /// signal, which counts as a failure.
    pub async fn exit(self) -> ProcessExit {
        self.exit_rx.await.unwrap_or(ProcessExit { code: None, signal: None })
    }

    /// Reports the exit to `guard` in the background.
    ///
    /// `decide` maps the exit to an outcome; returning `None` leaves the
    /// workflow to finish some other way.
    pub fn report_exit<T, F>(self, guard: Arc<CompletionGuard<T>>, decide: F)
    where
        T: Send + 'static,
        F: FnOnce(&ProcessExit) -> Option<T> + Send + 'static,
    {
        let target = self.target.clone();
        tokio::spawn(async move {
            let exit = self.exit().await;
            debug!(app = %target, code = exit.code, signal = exit.signal.as_deref(), "process exited");
            if let Some(outcome) = decide(&exit) {
                guard.finish(outcome);
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

async fn drain_lines<R>(stream: R, target: String, kind: StreamKind, echo: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match kind {
                StreamKind::Stderr if echo => info!(app = %target, "stderr: {line}"),
                StreamKind::Stderr => debug!(app = %target, "stderr: {line}"),
                StreamKind::Stdout => trace!(app = %target, "stdout: {line}"),
            },
            Ok(None) => break,
            Err(error) => {
                debug!(app = %target, ?kind, %error, "stopped reading child output");
                break;
            }
        }
    }
}
