//! Scripted adapters that serve pre-programmed interactions.
//!
//! Used by tests to drive workflows deterministically: every call is served
//! from a queue in order and recorded for later assertions.

pub mod clock;
pub mod http;
pub mod process;

pub use clock::ScriptedClock;
pub use http::ScriptedHttpClient;
pub use process::{
    stream, ExitGate, ScriptedProcess, ScriptedProcessLauncher, ScriptedStream, StreamFeed,
};
