// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health probing: one-shot checks and healthy-or-timeout waits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;

use pd_core::{validate, ApiError, Clock, Config, ErrorKind};
use pd_storage::{services, Store};
use pd_wire::{ServiceHealth, WaitAllResponse};

/// Result of one probe attempt.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// The outbound HTTP seam, faked in tests.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}

/// Real probe client over reqwest.
pub struct HttpProbeClient {
    client: reqwest::Client,
}

impl HttpProbeClient {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeClient for HttpProbeClient {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                ProbeOutcome {
                    healthy: response.status().is_success(),
                    status: Some(status),
                    error: None,
                }
            }
            Err(e) => ProbeOutcome { healthy: false, status: None, error: Some(e.to_string()) },
        }
    }
}

pub struct HealthProber<C: Clock> {
    store: Arc<Store>,
    config: Arc<Config>,
    client: Arc<dyn ProbeClient>,
    clock: C,
}

impl<C: Clock> HealthProber<C> {
    pub fn new(
        store: Arc<Store>,
        config: Arc<Config>,
        client: Arc<dyn ProbeClient>,
        clock: C,
    ) -> Self {
        Self { store, config, client, clock }
    }

    fn health_url(&self, port: u16) -> String {
        format!("http://127.0.0.1:{}{}", port, self.config.health.path)
    }

    /// One probe of the service's health endpoint.
    pub async fn check(&self, id: &str) -> Result<ServiceHealth, ApiError> {
        let Some(row) = self.store.with_conn(|conn| services::get(conn, id))? else {
            return Err(ApiError::new(
                ErrorKind::ServiceNotFound,
                format!("no service {:?}", id),
            ));
        };
        Ok(self.probe_row(id, row.port).await)
    }

    async fn probe_row(&self, id: &str, port: u16) -> ServiceHealth {
        let timeout = Duration::from_millis(self.config.health.probe_timeout_ms);
        let started = self.clock.now();
        let outcome = self.client.probe(&self.health_url(port), timeout).await;
        let latency = started.elapsed().as_millis() as u64;
        ServiceHealth {
            id: id.to_string(),
            healthy: outcome.healthy,
            status: outcome.status,
            latency_ms: Some(latency),
            error: outcome.error,
        }
    }

    /// Poll until healthy, the service vanishes, or the timeout fires.
    ///
    /// A zero timeout degenerates to a single probe whose outcome is
    /// returned as-is: the call succeeds as long as the lease exists.
    pub async fn wait_for(&self, id: &str, timeout_ms: u64) -> Result<ServiceHealth, ApiError> {
        let timeout =
            validate::clamp_timeout_ms(timeout_ms, self.config.health.wait_max_ms);
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout);
        let tick = Duration::from_millis(self.config.health.poll_interval_ms);

        loop {
            let health = self.check(id).await?;
            if health.healthy || timeout == 0 {
                return Ok(health);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ApiError::new(
                    ErrorKind::Timeout,
                    format!("service {:?} not healthy after {} ms", id, timeout),
                ));
            }
            tokio::time::sleep(remaining.min(tick)).await;
        }
    }

    /// Run individual waits concurrently; partial results are returned,
    /// never an error.
    pub async fn wait_for_all(
        self: &Arc<Self>,
        ids: &[String],
        timeout_ms: u64,
    ) -> Result<WaitAllResponse, ApiError> {
        if ids.is_empty() {
            return Err(ApiError::validation("no service ids given"));
        }
        if ids.len() > validate::WAIT_IDS_MAX {
            return Err(ApiError::validation(format!(
                "at most {} services per wait",
                validate::WAIT_IDS_MAX
            )));
        }

        let mut set = JoinSet::new();
        for id in ids {
            let prober = Arc::clone(self);
            let id = id.clone();
            set.spawn(async move {
                let outcome = prober.wait_for(&id, timeout_ms).await;
                match outcome {
                    Ok(health) => health,
                    Err(e) => ServiceHealth {
                        id,
                        healthy: false,
                        status: None,
                        latency_ms: None,
                        error: Some(e.to_string()),
                    },
                }
            });
        }

        let mut results = Vec::with_capacity(ids.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(health) => results.push(health),
                Err(e) => {
                    return Err(ApiError::internal(format!("wait task failed: {}", e)));
                }
            }
        }
        results.sort_by(|a, b| a.id.cmp(&b.id));
        let resolved = results.iter().filter(|r| r.healthy).count();
        Ok(WaitAllResponse {
            resolved,
            requested: ids.len(),
            timed_out: resolved < ids.len(),
            services: results,
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{ProbeClient, ProbeOutcome};

    /// Probe client scripted per URL: unhealthy until `healthy_after`
    /// probes have been made.
    #[derive(Default)]
    pub struct FakeProbeClient {
        healthy_after: Mutex<HashMap<String, u32>>,
        pub calls: AtomicU32,
    }

    impl FakeProbeClient {
        pub fn healthy() -> Self {
            Self::default()
        }

        pub fn healthy_after(url_calls: &[(&str, u32)]) -> Self {
            let fake = Self::default();
            let mut map = fake.healthy_after.lock();
            for (url, calls) in url_calls {
                map.insert(url.to_string(), *calls);
            }
            drop(map);
            fake
        }
    }

    #[async_trait]
    impl ProbeClient for FakeProbeClient {
        async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mut map = self.healthy_after.lock();
            let remaining = map.entry(url.to_string()).or_insert(0);
            if *remaining == 0 {
                ProbeOutcome { healthy: true, status: Some(200), error: None }
            } else {
                *remaining -= 1;
                ProbeOutcome {
                    healthy: false,
                    status: None,
                    error: Some("connection refused".to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
