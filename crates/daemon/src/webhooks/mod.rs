// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook dispatcher: subscription registry, event fan-out, signed
//! deliveries with exponential-backoff retry.
//!
//! Delivery failures never surface to the request that triggered them;
//! they only update counters and the delivery record. Retry timers are
//! daemon-internal and die with the shutdown token.

mod sign;
pub mod ssrf;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pd_core::{validate, ApiError, Clock, Config, ErrorKind, Identity, Pattern, WebhookEvent};
use pd_storage::webhooks::{self, DeliveryRow, WebhookRow};
use pd_storage::{StorageError, Store};
use pd_wire::{WebhookDeliveryInfo, WebhookInfo};

use crate::metrics::Metrics;

/// Event signature header.
const SIGNATURE_HEADER: &str = "X-PortDaddy-Signature";
/// Event name header.
const EVENT_HEADER: &str = "X-PortDaddy-Event";

pub struct WebhookDispatcher<C: Clock> {
    store: Arc<Store>,
    config: Arc<Config>,
    client: reqwest::Client,
    clock: C,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
}

impl<C: Clock> WebhookDispatcher<C> {
    pub fn new(
        store: Arc<Store>,
        config: Arc<Config>,
        clock: C,
        shutdown: CancellationToken,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            config,
            client: reqwest::Client::new(),
            clock,
            shutdown,
            metrics,
        }
    }

    /// Register a subscription. The URL must pass the SSRF filter and
    /// every event must come from the closed vocabulary.
    pub fn register(
        &self,
        url: &str,
        events: &[String],
        secret: Option<&str>,
        filter_pattern: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<String, ApiError> {
        ssrf::check_url(url)?;
        if events.is_empty() {
            return Err(ApiError::validation("events must not be empty"));
        }
        for event in events {
            event.parse::<WebhookEvent>().map_err(|e| ApiError::validation(e.to_string()))?;
        }
        if let Some(pattern) = filter_pattern {
            Pattern::parse(pattern)
                .map_err(|e| ApiError::new(ErrorKind::IdentityInvalid, e.to_string()))?;
        }
        let metadata = validate::metadata_json(metadata)?;
        let id = pd_core::ids::webhook_id();
        let now = self.clock.epoch_ms();
        self.store.with_tx::<_, ApiError>(|tx| {
            Ok(webhooks::insert(
                tx,
                &id,
                url,
                secret,
                events,
                filter_pattern,
                metadata.as_deref(),
                now,
            )
            .map_err(StorageError::from)?)
        })?;
        Ok(id)
    }

    pub fn list(&self) -> Result<Vec<WebhookInfo>, ApiError> {
        let rows = self.store.with_conn(|conn| webhooks::list(conn, false))?;
        Ok(rows.into_iter().map(to_info).collect())
    }

    pub fn remove(&self, id: &str) -> Result<bool, ApiError> {
        Ok(self
            .store
            .with_tx::<_, ApiError>(|tx| Ok(webhooks::delete(tx, id).map_err(StorageError::from)?))?)
    }

    pub fn deliveries(&self, id: &str, limit: u32) -> Result<Vec<WebhookDeliveryInfo>, ApiError> {
        if self.store.with_conn(|conn| webhooks::get(conn, id))?.is_none() {
            return Err(ApiError::new(
                ErrorKind::ServiceNotFound,
                format!("no webhook {:?}", id),
            ));
        }
        let rows = self.store.with_conn(|conn| webhooks::list_deliveries(conn, id, limit))?;
        Ok(rows.into_iter().map(to_delivery_info).collect())
    }

    /// Enqueue a delivery to every matching subscription and drive them
    /// asynchronously. Errors here are logged, never propagated.
    pub fn trigger(
        self: &Arc<Self>,
        event: WebhookEvent,
        payload: serde_json::Value,
        target_id: Option<&str>,
    ) {
        let subs = match self.matching(event, target_id) {
            Ok(subs) => subs,
            Err(e) => {
                warn!(event = event.as_str(), "webhook match failed: {}", e);
                return;
            }
        };
        if subs.is_empty() {
            return;
        }

        let now = self.clock.epoch_ms();
        let body: Arc<str> = serde_json::json!({
            "event": event.as_str(),
            "timestamp": now,
            "targetId": target_id,
            "payload": payload,
        })
        .to_string()
        .into();

        for sub in subs {
            let delivery = self.store.with_conn(|conn| {
                webhooks::insert_delivery(conn, &sub.id, event.as_str(), &body, now)
            });
            match delivery {
                Ok(delivery_id) => {
                    let dispatcher = Arc::clone(self);
                    let body = Arc::clone(&body);
                    tokio::spawn(async move {
                        dispatcher.deliver(&sub, delivery_id, event.as_str(), &body, 0).await;
                    });
                }
                Err(e) => warn!(webhook = %sub.id, "delivery enqueue failed: {}", e),
            }
        }
    }

    fn matching(
        &self,
        event: WebhookEvent,
        target_id: Option<&str>,
    ) -> Result<Vec<WebhookRow>, ApiError> {
        let rows = self.store.with_conn(|conn| webhooks::list(conn, true))?;
        Ok(rows
            .into_iter()
            .filter(|row| row.events.iter().any(|e| e == event.as_str()))
            .filter(|row| filter_matches(row.filter_pattern.as_deref(), target_id))
            .collect())
    }

    /// Drive one delivery to its terminal state.
    async fn deliver(
        &self,
        sub: &WebhookRow,
        delivery_id: i64,
        event: &str,
        body: &str,
        attempts_done: u32,
    ) {
        let max_attempts = self.config.webhooks.max_attempts.max(1);
        let base = self.config.webhooks.backoff_base_ms;

        for attempt in (attempts_done + 1)..=max_attempts {
            let outcome = self.attempt(sub, event, body).await;
            let now = self.clock.epoch_ms();
            match outcome {
                Ok((code, response_body)) if (200..300).contains(&code) => {
                    self.record(delivery_id, "success", attempt, Some(code), &response_body, now);
                    self.outcome_counter(&sub.id, true);
                    Metrics::bump(&self.metrics.webhook_deliveries_total);
                    return;
                }
                Ok((code, response_body)) => {
                    debug!(webhook = %sub.id, code, "webhook attempt {} failed", attempt);
                    if attempt == max_attempts {
                        self.record(
                            delivery_id,
                            "failed",
                            attempt,
                            Some(code),
                            &response_body,
                            now,
                        );
                        self.outcome_counter(&sub.id, false);
                        Metrics::bump(&self.metrics.webhook_failures_total);
                        return;
                    }
                    self.record(delivery_id, "pending", attempt, Some(code), &response_body, now);
                }
                Err(error) => {
                    debug!(webhook = %sub.id, "webhook attempt {} errored: {}", attempt, error);
                    if attempt == max_attempts {
                        self.record(delivery_id, "failed", attempt, None, &error, now);
                        self.outcome_counter(&sub.id, false);
                        Metrics::bump(&self.metrics.webhook_failures_total);
                        return;
                    }
                    self.record(delivery_id, "pending", attempt, None, &error, now);
                }
            }

            let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
            let backoff = Duration::from_millis(base.saturating_mul(factor));
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn attempt(
        &self,
        sub: &WebhookRow,
        event: &str,
        body: &str,
    ) -> Result<(u16, String), String> {
        let mut request = self
            .client
            .post(&sub.url)
            .header("content-type", "application/json")
            .header(EVENT_HEADER, event)
            .timeout(Duration::from_secs(10))
            .body(body.to_string());
        if let Some(secret) = &sub.secret {
            request = request.header(SIGNATURE_HEADER, sign::signature(secret, body.as_bytes()));
        }
        match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                let mut truncated = text;
                truncated.truncate(1024);
                Ok((code, truncated))
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn record(
        &self,
        delivery_id: i64,
        status: &str,
        attempts: u32,
        code: Option<u16>,
        response_body: &str,
        now: u64,
    ) {
        let result = self.store.with_conn(|conn| {
            webhooks::update_delivery(
                conn,
                delivery_id,
                status,
                attempts,
                code,
                Some(response_body),
                now,
            )
        });
        if let Err(e) = result {
            warn!(delivery_id, "delivery record update failed: {}", e);
        }
    }

    fn outcome_counter(&self, webhook_id: &str, success: bool) {
        let result =
            self.store.with_conn(|conn| webhooks::record_outcome(conn, webhook_id, success));
        if let Err(e) = result {
            warn!(webhook = webhook_id, "counter update failed: {}", e);
        }
    }

    /// Re-drive deliveries a previous daemon run left `pending`.
    pub fn redrive_pending(self: &Arc<Self>) -> Result<usize, ApiError> {
        let pending = self.store.with_conn(webhooks::pending_deliveries)?;
        let count = pending.len();
        for delivery in pending {
            let Some(sub) =
                self.store.with_conn(|conn| webhooks::get(conn, &delivery.webhook_id))?
            else {
                continue;
            };
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                dispatcher
                    .deliver(
                        &sub,
                        delivery.id,
                        &delivery.event,
                        &delivery.payload,
                        delivery.attempts,
                    )
                    .await;
            });
        }
        Ok(count)
    }

    /// One synchronous test POST; returns the response status.
    pub async fn test_fire(&self, id: &str) -> Result<Option<u16>, ApiError> {
        let Some(sub) = self.store.with_conn(|conn| webhooks::get(conn, id))? else {
            return Err(ApiError::new(
                ErrorKind::ServiceNotFound,
                format!("no webhook {:?}", id),
            ));
        };
        let body = serde_json::json!({
            "event": "webhook.test",
            "timestamp": self.clock.epoch_ms(),
        })
        .to_string();
        match self.attempt(&sub, "webhook.test", &body).await {
            Ok((code, _)) => Ok(Some(code)),
            Err(_) => Ok(None),
        }
    }
}

fn filter_matches(pattern: Option<&str>, target_id: Option<&str>) -> bool {
    let Some(pattern) = pattern else { return true };
    let Some(target) = target_id else { return false };
    let Ok(pattern) = Pattern::parse(pattern) else { return false };
    let Ok(identity) = Identity::parse(target) else { return false };
    pattern.matches(&identity)
}

fn to_info(row: WebhookRow) -> WebhookInfo {
    WebhookInfo {
        id: row.id,
        url: row.url,
        events: row.events,
        filter_pattern: row.filter_pattern,
        active: row.active,
        success_count: row.success_count,
        failure_count: row.failure_count,
        created_at: row.created_at,
    }
}

fn to_delivery_info(row: DeliveryRow) -> WebhookDeliveryInfo {
    WebhookDeliveryInfo {
        id: row.id,
        webhook_id: row.webhook_id,
        event: row.event,
        status: row.status,
        attempts: row.attempts,
        response_code: row.response_code,
        response_body: row.response_body,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
