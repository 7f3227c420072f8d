//! Backend health probing
//!
//! A backend is healthy iff GET /health answers 200 within the probe
//! timeout; anything else, including an unreachable host, is unhealthy.

use std::time::Duration;

/// Interval between probe rounds.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Decides whether a backend is fit to receive traffic.
#[async_trait::async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self, addr: &str, use_https: bool) -> bool;
}

/// Default checker backed by a dedicated HTTP client.
pub struct HttpHealthChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpHealthChecker {
    /// The probe timeout mirrors the balancer's forwarding timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, addr: &str, use_https: bool) -> bool {
        let url = format!("{}://{}/health", scheme(use_https), addr);
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }
}

fn scheme(use_https: bool) -> &'static str {
    if use_https {
        "https"
    } else {
        "http"
    }
}
