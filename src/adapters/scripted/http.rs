//! Scripted adapter for the `HttpClient` port.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::PortError;
use crate::ports::http::{HttpClient, HttpFuture, HttpResponse};

/// Serves pre-programmed responses in order and records requested URLs.
pub struct ScriptedHttpClient {
    replies: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedHttpClient {
    /// Creates a client that answers with `replies`, one per request.
    ///
    /// `Err` entries become transport errors.
    #[must_use]
    pub fn new(replies: Vec<Result<HttpResponse, String>>) -> Self {
        Self { replies: Mutex::new(replies.into()), requests: Mutex::new(Vec::new()) }
    }

    /// A client whose only reply is `status` with `body`.
    pub fn responding(status: u16, body: impl Into<String>) -> Self {
        Self::new(vec![Ok(HttpResponse::new(status, body))])
    }

    /// URLs requested so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("http lock poisoned").clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn get(&self, url: &str) -> HttpFuture<'_> {
        self.requests.lock().expect("http lock poisoned").push(url.to_string());
        let reply = self.replies.lock().expect("http lock poisoned").pop_front();
        let Some(reply) = reply else {
            panic!("Script exhausted: no HTTP reply programmed for request to {url:?}");
        };
        Box::pin(async move { reply.map_err(PortError::from) })
    }
}
