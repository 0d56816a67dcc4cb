// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messaging hub: durable ordered channels with SSE fan-out and long-poll.

mod budgets;
mod fanout;

pub use budgets::{BudgetSlot, Budgets};
pub use fanout::Fanout;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use pd_core::{validate, ApiError, Clock, Config, ErrorKind};
use pd_storage::messages::{self, MessageRow};
use pd_storage::Store;
use pd_wire::MessageInfo;

/// An attached SSE subscriber. Dropping it detaches from the channel.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub channel: String,
    pub rx: mpsc::Receiver<Arc<str>>,
    fanout: Arc<Fanout>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.fanout.unsubscribe(&self.channel, self.id);
    }
}

/// Result of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub id: i64,
    pub delivered: usize,
}

pub struct Messaging<C: Clock> {
    store: Arc<Store>,
    config: Arc<Config>,
    fanout: Arc<Fanout>,
    clock: C,
}

impl<C: Clock> Messaging<C> {
    pub fn new(store: Arc<Store>, config: Arc<Config>, clock: C) -> Self {
        Self { store, config, fanout: Arc::new(Fanout::new()), clock }
    }

    pub fn fanout(&self) -> Arc<Fanout> {
        Arc::clone(&self.fanout)
    }

    /// Persist a message and fan it out to attached subscribers.
    pub fn publish(
        &self,
        channel: &str,
        payload: &serde_json::Value,
        sender: Option<&str>,
        expires_ms: Option<u64>,
    ) -> Result<PublishOutcome, ApiError> {
        validate::channel_name(channel)?;
        let payload_json = validate::payload_json(payload)?;
        let now = self.clock.epoch_ms();
        let expires_at = expires_ms.map(|ttl| now + ttl);

        let id = self.store.with_conn(|conn| {
            messages::insert(conn, channel, &payload_json, sender, now, expires_at)
        })?;

        let info = MessageInfo {
            id,
            channel: channel.to_string(),
            payload: payload.clone(),
            sender: sender.map(|s| s.to_string()),
            created_at: now,
            expires_at,
        };
        let frame: Arc<str> = serde_json::to_string(&info)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .into();
        let delivered = self.fanout.publish(channel, frame);
        Ok(PublishOutcome { id, delivered })
    }

    /// Read messages, either everything after `after` or the newest page.
    pub fn get(
        &self,
        channel: &str,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<MessageInfo>, ApiError> {
        validate::channel_name(channel)?;
        let limit = limit.unwrap_or(100).min(validate::PAGE_MAX);
        let rows = self.store.with_conn(|conn| match after {
            Some(after) => messages::list_after(conn, channel, after, limit),
            None => messages::list_recent(conn, channel, limit),
        })?;
        Ok(rows.into_iter().map(to_info).collect())
    }

    /// Long-poll: the first message with `id > after`, or `None` on
    /// timeout. The wait parks on the channel's notify and re-reads the
    /// store at most once per poll interval.
    pub async fn poll(
        &self,
        channel: &str,
        after: i64,
        timeout_ms: u64,
    ) -> Result<Option<MessageInfo>, ApiError> {
        validate::channel_name(channel)?;
        let timeout = validate::clamp_timeout_ms(timeout_ms, validate::LONGPOLL_MAX_MS);
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout);
        let tick = Duration::from_millis(self.config.messaging.poll_interval_ms.max(1));

        loop {
            let rows = self
                .store
                .with_conn(|conn| messages::list_after(conn, channel, after, 1))?;
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(to_info(row)));
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let notify = self.fanout.notify_for(channel);
            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(remaining.min(tick)) => {}
            }
        }
    }

    /// Attach an SSE subscriber, enforcing the per-channel cap.
    pub fn subscribe(&self, channel: &str) -> Result<Subscription, ApiError> {
        validate::channel_name(channel)?;
        let cap = self.config.messaging.subscribers_per_channel_max;
        if self.fanout.subscriber_count(channel) >= cap {
            return Err(ApiError::new(
                ErrorKind::ConnectionLimit,
                format!("channel {:?} is at its subscriber cap ({})", channel, cap),
            ));
        }
        let (id, rx) = self.fanout.subscribe(channel);
        Ok(Subscription { id, channel: channel.to_string(), rx, fanout: self.fanout() })
    }

    /// Forcibly detach a subscriber (SSE absolute timeout).
    pub fn kick(&self, channel: &str, id: u64) {
        self.fanout.unsubscribe(channel, id);
    }

    pub fn message_count(&self) -> Result<u64, ApiError> {
        Ok(self.store.with_conn(messages::count)?)
    }
}

fn to_info(row: MessageRow) -> MessageInfo {
    let payload = serde_json::from_str(&row.payload)
        .unwrap_or(serde_json::Value::String(row.payload));
    MessageInfo {
        id: row.id,
        channel: row.channel,
        payload,
        sender: row.sender,
        created_at: row.created_at,
        expires_at: row.expires_at,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
