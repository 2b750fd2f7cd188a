//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the orchestration core and an
//! external system (time, HTTP, child processes). Implementations live in
//! `src/adapters/`.

pub mod clock;
pub mod http;
pub mod process;

pub use clock::{Clock, SleepFuture};
pub use http::{HttpClient, HttpFuture, HttpResponse};
pub use process::{
    ChildProcess, CommandSpec, ExitFuture, OutputStream, ProcessExit, ProcessLauncher, KILL_SIGNAL,
};
