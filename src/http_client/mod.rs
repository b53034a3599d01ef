//! HTTP client for fetching archive artifacts.

mod pacer;
mod response;

pub use pacer::RequestPacer;
pub use response::HttpResponse;

use std::time::{Duration, Instant};

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// Why a fetch produced no usable body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
}

/// HTTP client with request pacing.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    pacer: RequestPacer,
}

impl HttpClient {
    /// Create a new HTTP client with its own pacer.
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        request_delay: Duration,
    ) -> Result<Self, FetchError> {
        Self::with_pacer(user_agent, timeout, RequestPacer::new(request_delay))
    }

    /// Create a new HTTP client sharing an existing pacer.
    pub fn with_pacer(
        user_agent: &str,
        timeout: Duration,
        pacer: RequestPacer,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, pacer })
    }

    /// Make a paced GET request.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.pacer.acquire().await;

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        debug!(
            "GET {} -> {} in {:?}",
            url,
            response.status().as_u16(),
            start.elapsed()
        );

        Ok(HttpResponse {
            status: response.status(),
            response,
        })
    }

    /// Fetch a full body, treating non-2xx statuses as errors.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(FetchError::Status(response.status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}
