//! Live adapter for the `HttpClient` port using `reqwest`.

use std::time::Duration;

use reqwest::Client;

use crate::error::PortError;
use crate::ports::http::{HttpClient, HttpFuture, HttpResponse};

/// Per-request timeout; a timed-out request counts as a transport error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Live HTTP client backed by a shared `reqwest::Client`.
pub struct LiveHttpClient {
    client: Client,
}

impl LiveHttpClient {
    /// Creates a new live HTTP client.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for LiveHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for LiveHttpClient {
    fn get(&self, url: &str) -> HttpFuture<'_> {
        let url = url.to_string();

        Box::pin(async move {
            let response = self.client.get(&url).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, PortError>(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let client = LiveHttpClient::new();
        let result = client.get("http://127.0.0.1:9/").await;
        assert!(result.is_err());
    }
}
