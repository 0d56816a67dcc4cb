// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE subscriber stream.
//!
//! The stream owns the hub subscription, the peer's budget slot, and the
//! active-connection gauge; client disconnect drops all three.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::sse::Event;
use tokio_stream::Stream;

use crate::hub::{BudgetSlot, Subscription};
use crate::metrics::Metrics;

pub struct SubscriberStream {
    sub: Subscription,
    _slot: BudgetSlot,
    metrics: Arc<Metrics>,
}

impl SubscriberStream {
    pub fn new(sub: Subscription, slot: BudgetSlot, metrics: Arc<Metrics>) -> Self {
        Metrics::bump(&metrics.sse_active);
        Self { sub, _slot: slot, metrics }
    }
}

impl Drop for SubscriberStream {
    fn drop(&mut self) {
        Metrics::decr(&self.metrics.sse_active);
    }
}

impl Stream for SubscriberStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.sub
            .rx
            .poll_recv(cx)
            .map(|frame| frame.map(|json| Ok(Event::default().data(json.as_ref()))))
    }
}
