//! Child-process lifecycle: spawning, supervision and single-fire completion.

pub mod completion;
pub mod runner;

pub use completion::{Completion, CompletionGuard, Outcome};
pub use runner::{ExitDisposition, KillSwitch, ProcessRunner, RunningProcess};
