//! Reachability checks against the supervised server.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{trace, warn};

/// A bounded-timeout reachability check.
///
/// Retry policy belongs to callers; `probe` itself tries exactly once.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Whether the server answered. Errors, refusals and timeouts are `false`.
    async fn probe(&self) -> bool;

    /// Poll `probe` every `interval` until it succeeds or `timeout` elapses.
    ///
    /// Neither a sleep nor a probe runs past the deadline; a probe still in
    /// flight when it passes counts as unreachable.
    async fn wait_until_reachable(&self, timeout: Duration, interval: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if tokio::time::timeout_at(deadline, self.probe())
                .await
                .unwrap_or(false)
            {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}

/// Probes the server with a plain HTTP GET.
///
/// Any HTTP response counts as reachable, whatever the status code.
///
/// The per-probe timeout is enforced around the request as well, so it holds
/// even if the client had to be built without one.
pub struct HttpHealthProber {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpHealthProber {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });

        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProber {
    async fn probe(&self) -> bool {
        let request = self.client.get(&self.url).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(resp)) => {
                trace!("Health probe {} -> HTTP {}", self.url, resp.status());
                true
            }
            Ok(Err(e)) => {
                trace!("Health probe {} failed: {e}", self.url);
                false
            }
            Err(_) => {
                trace!("Health probe {} timed out after {:?}", self.url, self.timeout);
                false
            }
        }
    }
}
