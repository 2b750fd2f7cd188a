//! Live process launcher using `tokio::process::Command`.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

use crate::error::PortError;
use crate::ports::process::{
    ChildProcess, CommandSpec, ExitFuture, OutputStream, ProcessExit, ProcessLauncher,
};

/// Live launcher that spawns real OS processes with piped output.
pub struct LiveProcessLauncher;

impl ProcessLauncher for LiveProcessLauncher {
    fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, PortError> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Box::new(LiveChild { child }))
    }
}

/// A child spawned by [`LiveProcessLauncher`].
struct LiveChild {
    child: Child,
}

impl ChildProcess for LiveChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.child.stdout.take().map(|out| Box::pin(out) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.child.stderr.take().map(|err| Box::pin(err) as OutputStream)
    }

    fn wait(&mut self) -> ExitFuture<'_> {
        Box::pin(async move { self.child.wait().await.map(exit_from_status) })
    }

    fn kill(&mut self) -> ExitFuture<'_> {
        Box::pin(async move {
            if let Err(error) = self.child.start_kill() {
                // Already reaped: report the exit it had.
                return match self.child.try_wait()? {
                    Some(status) => Ok(exit_from_status(status)),
                    None => Err(error),
                };
            }
            self.child.wait().await.map(exit_from_status)
        })
    }
}

fn exit_from_status(status: ExitStatus) -> ProcessExit {
    ProcessExit { code: status.code(), signal: signal_name(status) }
}

#[cfg(unix)]
fn signal_name(status: ExitStatus) -> Option<String> {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|number| {
        Signal::try_from(number)
            .map_or_else(|_| format!("signal {number}"), |signal| signal.as_str().to_string())
    })
}

#[cfg(not(unix))]
fn signal_name(_status: ExitStatus) -> Option<String> {
    None
}
