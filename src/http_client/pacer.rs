//! Minimum spacing between requests to the archive origin.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Shared pacer enforcing a minimum delay between request starts.
///
/// Concurrent callers queue on the inner lock, so with a pool of N workers
/// the origin still sees at most one request start per `min_delay`.
#[derive(Debug, Clone)]
pub struct RequestPacer {
    min_delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RequestPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait until the next request may start, then mark it as started.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_delay;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                debug!("Pacing request: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}
