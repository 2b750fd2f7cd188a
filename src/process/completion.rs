//! Single-fire completion shared by every terminal event of a workflow.
//!
//! A workflow hands clones of its [`CompletionGuard`] to each activity that
//! can end it (process error, process exit, log failure, verification). The
//! first call to [`CompletionGuard::finish`] wins; later calls are logged and
//! dropped. The workflow awaits the paired [`Completion`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::HarnessError;

/// Outcome reported by a workflow.
pub type Outcome = Result<(), HarnessError>;

/// The "already finished" flag of one workflow invocation.
#[derive(Debug)]
pub struct CompletionGuard<T> {
    target: String,
    finished: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> CompletionGuard<T> {
    /// Creates a guard for `target` and the completion it resolves.
    pub fn new(target: impl Into<String>) -> (Arc<Self>, Completion<T>) {
        let target = target.into();
        let (tx, rx) = oneshot::channel();
        let guard = Arc::new(Self {
            target: target.clone(),
            finished: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        });
        (guard, Completion { rx, target })
    }

    /// Reports `outcome` if nothing has been reported yet.
    ///
    /// Returns `true` when this call decided the outcome.
    pub fn finish(&self, outcome: T) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            debug!(app = %self.target, "workflow already finished; ignoring terminal event");
            return false;
        }
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tx) = sender {
            // The waiter may have gone away; the decision stands either way.
            let _ = tx.send(outcome);
        }
        true
    }

    /// Returns `true` once an outcome has been reported.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Resolves with the first outcome reported to the paired guard.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
    target: String,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, HarnessError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.map_err(|_| HarnessError::Abandoned { target: self.target.clone() }))
    }
}
