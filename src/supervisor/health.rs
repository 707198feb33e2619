//! Health probing of the coordination store
//!
//! `GET <client-url>/health` answers `{"health":"true"}` once the store has
//! joined its cluster and can serve requests.

use crate::common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The store reported itself healthy.
    Healthy,
    /// The store answered, but not with a healthy flag.
    Unhealthy,
    /// The probe could not be executed (connection error, timeout).
    Failed,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(alias = "Health")]
    health: String,
}

/// Probes the health endpoint of one store
#[derive(Debug, Clone)]
pub struct HealthProbe {
    http: reqwest::Client,
    url: String,
}

impl HealthProbe {
    /// Probe for the store reachable at `client_url`
    pub fn new(client_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: format!("{}/health", client_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One request, bounded by `timeout`
    pub async fn check(&self, timeout: Duration) -> ProbeResult {
        let resp = match self.http.get(&self.url).timeout(timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url = %self.url, error = %e, "Health probe failed");
                return ProbeResult::Failed;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            debug!(url = %self.url, status = %status, "Health endpoint returned an error status");
            return ProbeResult::Unhealthy;
        }

        match resp.json::<HealthBody>().await {
            Ok(body) if body.health == "true" => ProbeResult::Healthy,
            Ok(body) => {
                debug!(url = %self.url, health = %body.health, "Store not healthy yet");
                ProbeResult::Unhealthy
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Malformed health response");
                ProbeResult::Unhealthy
            }
        }
    }

    /// Poll until the store is healthy or `timeout` has elapsed.
    ///
    /// Every failure before the deadline is retried after `interval`; the
    /// deadline is checked on each iteration and also bounds each request.
    pub async fn wait_healthy(&self, timeout: Duration, interval: Duration) -> Result<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut attempts = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            let result = self.check(remaining).await;
            if result == ProbeResult::Healthy {
                info!(
                    url = %self.url,
                    attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Coordination store is healthy"
                );
                return Ok(());
            }
            debug!(url = %self.url, attempts, ?result, "Waiting for coordination store");

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(interval.min(remaining)).await;
        }

        Err(Error::HealthCheckTimeout {
            url: self.url.clone(),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url() {
        let probe = HealthProbe::new("http://127.0.0.1:2379/").unwrap();
        assert_eq!(probe.url(), "http://127.0.0.1:2379/health");
    }

    #[test]
    fn test_health_body_field_names() {
        let lower: HealthBody = serde_json::from_str(r#"{"health":"true","reason":""}"#).unwrap();
        let upper: HealthBody = serde_json::from_str(r#"{"Health":"false"}"#).unwrap();
        assert_eq!(lower.health, "true");
        assert_eq!(upper.health, "false");
    }

    #[tokio::test]
    async fn test_unreachable_store_times_out() {
        // bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let probe = HealthProbe::new(&format!("http://127.0.0.1:{}", port)).unwrap();

        assert_eq!(probe.check(Duration::from_millis(200)).await, ProbeResult::Failed);

        let started = std::time::Instant::now();
        let err = probe
            .wait_healthy(Duration::from_millis(300), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HealthCheckTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
