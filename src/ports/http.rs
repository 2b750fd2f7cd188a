//! HTTP client port used to probe applications.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::PortError;

/// Boxed future type alias used by [`HttpClient`] to keep the trait dyn-compatible.
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, PortError>> + Send + 'a>>;

/// A response that made it back over the wire, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

/// Sends GET requests.
pub trait HttpClient: Send + Sync {
    /// Fetches `url`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures (refused connection, DNS,
    /// timeout). Non-2xx responses are returned as `Ok`.
    fn get(&self, url: &str) -> HttpFuture<'_>;
}
