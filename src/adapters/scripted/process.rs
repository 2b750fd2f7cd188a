//! Scripted adapter for the `ProcessLauncher` port.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{mpsc, oneshot};

use crate::error::PortError;
use crate::ports::process::{
    ChildProcess, CommandSpec, ExitFuture, OutputStream, ProcessExit, ProcessLauncher,
};

/// Creates an open output stream and the feed that writes into it.
///
/// The stream reaches end-of-data once the feed is dropped.
#[must_use]
pub fn stream() -> (StreamFeed, ScriptedStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StreamFeed { tx }, ScriptedStream { rx, pending: Vec::new(), pos: 0 })
}

/// Write half of a [`ScriptedStream`].
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl StreamFeed {
    /// Queues `bytes` for the reader. Ignored once the reader is gone.
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.tx.send(bytes.into());
    }

    /// Ends the stream.
    pub fn close(self) {}
}

/// Read half fed by a [`StreamFeed`].
pub struct ScriptedStream {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl ScriptedStream {
    /// A stream that yields `bytes` and then ends.
    pub fn closed_with(bytes: impl Into<Vec<u8>>) -> Self {
        let (feed, stream) = stream();
        feed.send(bytes);
        stream
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            if self.pos < self.pending.len() {
                let n = buf.remaining().min(self.pending.len() - self.pos);
                let start = self.pos;
                buf.put_slice(&self.pending[start..start + n]);
                self.pos += n;
                return Poll::Ready(Ok(()));
            }
            match ready!(self.rx.poll_recv(cx)) {
                Some(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}

/// Controls when a gated [`ScriptedProcess`] exits.
pub struct ExitGate {
    tx: oneshot::Sender<ProcessExit>,
}

impl ExitGate {
    /// Lets the process exit with `exit`.
    pub fn exit(self, exit: ProcessExit) {
        let _ = self.tx.send(exit);
    }
}

enum ExitPlan {
    Immediate(ProcessExit),
    Gated(oneshot::Receiver<ProcessExit>),
    UntilKilled,
}

/// A programmed child process.
pub struct ScriptedProcess {
    stdout: ScriptedStream,
    stderr: ScriptedStream,
    plan: ExitPlan,
    kill_exit: ProcessExit,
}

impl ScriptedProcess {
    /// A process that exits with `exit` as soon as it is waited on.
    #[must_use]
    pub fn exiting(exit: ProcessExit) -> Self {
        Self::with_plan(ExitPlan::Immediate(exit))
    }

    /// A process that only exits when killed.
    #[must_use]
    pub fn running_until_killed() -> Self {
        Self::with_plan(ExitPlan::UntilKilled)
    }

    /// A process that exits when the returned gate is opened.
    #[must_use]
    pub fn gated() -> (Self, ExitGate) {
        let (tx, rx) = oneshot::channel();
        (Self::with_plan(ExitPlan::Gated(rx)), ExitGate { tx })
    }

    fn with_plan(plan: ExitPlan) -> Self {
        Self {
            stdout: ScriptedStream::closed_with(Vec::new()),
            stderr: ScriptedStream::closed_with(Vec::new()),
            plan,
            kill_exit: ProcessExit::killed(),
        }
    }

    /// Replaces stdout.
    #[must_use]
    pub fn with_stdout(mut self, stdout: ScriptedStream) -> Self {
        self.stdout = stdout;
        self
    }

    /// Replaces stderr.
    #[must_use]
    pub fn with_stderr(mut self, stderr: ScriptedStream) -> Self {
        self.stderr = stderr;
        self
    }

    /// Sets the exit reported after a kill (defaults to a bare `SIGKILL`).
    #[must_use]
    pub fn with_kill_exit(mut self, exit: ProcessExit) -> Self {
        self.kill_exit = exit;
        self
    }
}

/// Either a programmed process or a programmed spawn failure.
enum Spawn {
    Process(ScriptedProcess),
    Fail(String),
}

/// Serves programmed processes in spawn order and records launches.
#[derive(Default)]
pub struct ScriptedProcessLauncher {
    queue: Mutex<VecDeque<Spawn>>,
    launched: Mutex<Vec<CommandSpec>>,
    kills: Arc<AtomicUsize>,
}

impl ScriptedProcessLauncher {
    /// Creates a launcher with nothing programmed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs the next spawn to produce `process`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn then(self, process: ScriptedProcess) -> Self {
        self.queue.lock().expect("launcher lock poisoned").push_back(Spawn::Process(process));
        self
    }

    /// Programs the next spawn to fail with `message`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.queue.lock().expect("launcher lock poisoned").push_back(Spawn::Fail(message.into()));
        self
    }

    /// Commands spawned so far, including failed spawns.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn launched(&self) -> Vec<CommandSpec> {
        self.launched.lock().expect("launcher lock poisoned").clone()
    }

    /// Number of kills delivered to spawned processes.
    #[must_use]
    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

impl ProcessLauncher for ScriptedProcessLauncher {
    fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, PortError> {
        self.launched.lock().expect("launcher lock poisoned").push(command.clone());
        let next = self.queue.lock().expect("launcher lock poisoned").pop_front();
        match next {
            Some(Spawn::Process(process)) => Ok(Box::new(ScriptedChild {
                stdout: Some(process.stdout),
                stderr: Some(process.stderr),
                plan: process.plan,
                kill_exit: process.kill_exit,
                exited: None,
                kills: Arc::clone(&self.kills),
            })),
            Some(Spawn::Fail(message)) => {
                Err(io::Error::new(io::ErrorKind::NotFound, message).into())
            }
            None => panic!(
                "Script exhausted: no process programmed for `{}` {:?}",
                command.program, command.args
            ),
        }
    }
}

struct ScriptedChild {
    stdout: Option<ScriptedStream>,
    stderr: Option<ScriptedStream>,
    plan: ExitPlan,
    kill_exit: ProcessExit,
    exited: Option<ProcessExit>,
    kills: Arc<AtomicUsize>,
}

impl ChildProcess for ScriptedChild {
    fn id(&self) -> Option<u32> {
        self.exited.is_none().then_some(4242)
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take().map(|s| Box::pin(s) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take().map(|s| Box::pin(s) as OutputStream)
    }

    fn wait(&mut self) -> ExitFuture<'_> {
        Box::pin(async move {
            if let Some(exit) = &self.exited {
                return Ok(exit.clone());
            }
            let exit = match &mut self.plan {
                ExitPlan::Immediate(exit) => exit.clone(),
                ExitPlan::Gated(rx) => match rx.await {
                    Ok(exit) => exit,
                    // Gate dropped without opening: behave like a process that never exits.
                    Err(_) => std::future::pending().await,
                },
                ExitPlan::UntilKilled => std::future::pending().await,
            };
            self.exited = Some(exit.clone());
            Ok(exit)
        })
    }

    fn kill(&mut self) -> ExitFuture<'_> {
        Box::pin(async move {
            self.kills.fetch_add(1, Ordering::SeqCst);
            let exit = match &self.exited {
                Some(exit) => exit.clone(),
                None => self.kill_exit.clone(),
            };
            self.exited = Some(exit.clone());
            Ok(exit)
        })
    }
}
