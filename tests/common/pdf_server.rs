//! Mock origin for integration tests.
//!
//! Serves fixed bodies by path and counts requests per path. Unknown paths
//! get 404.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct PdfServer {
    server: MockServer,
}

impl PdfServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Serve `body` with status 200 at `route`.
    pub async fn serve(&self, route: &str, body: Vec<u8>) {
        self.mount(route, pdf_response(200, body)).await;
    }

    pub async fn respond(&self, route: &str, status: u16, body: Vec<u8>) {
        self.mount(route, pdf_response(status, body)).await;
    }

    /// Serve `body` at `route` after holding the response for `delay`.
    pub async fn serve_slowly(&self, route: &str, body: Vec<u8>, delay: Duration) {
        self.mount(route, pdf_response(200, body).set_delay(delay))
            .await;
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.server.uri(), route)
    }

    pub async fn hits(&self, route: &str) -> usize {
        self.requests()
            .await
            .iter()
            .filter(|r| r.url.path() == route)
            .count()
    }

    pub async fn total_hits(&self) -> usize {
        self.requests().await.len()
    }

    async fn mount(&self, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    async fn requests(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

fn pdf_response(status: u16, body: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(body)
}
