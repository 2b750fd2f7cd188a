//! Port implementations.
//!
//! `live` talks to the real system; `scripted` serves programmed results for
//! deterministic tests.

pub mod live;
pub mod scripted;
