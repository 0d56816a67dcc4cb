// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-channel subscriber sets and long-poll wakeups.
//!
//! Fan-out is non-blocking: a subscriber whose buffer is full is
//! disconnected rather than allowed to stall the publisher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Notify;

/// Buffered frames per subscriber before it counts as backlogged.
const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug)]
struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Arc<str>>,
}

#[derive(Default, Debug)]
struct ChannelState {
    subscribers: Vec<Subscriber>,
    notify: Arc<Notify>,
}

/// In-memory half of the messaging hub.
#[derive(Debug)]
pub struct Fanout {
    channels: Mutex<HashMap<String, ChannelState>>,
    next_id: AtomicU64,
}

impl Fanout {
    pub fn new() -> Self {
        Self { channels: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Attach a subscriber; returns its id and the frame receiver.
    pub fn subscribe(&self, channel: &str) -> (u64, mpsc::Receiver<Arc<str>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut channels = self.channels.lock();
        channels.entry(channel.to_string()).or_default().subscribers.push(Subscriber { id, tx });
        (id, rx)
    }

    /// Detach a subscriber; drops its sender, ending the stream.
    pub fn unsubscribe(&self, channel: &str, id: u64) {
        let mut channels = self.channels.lock();
        if let Some(state) = channels.get_mut(channel) {
            state.subscribers.retain(|s| s.id != id);
            if state.subscribers.is_empty() {
                channels.remove(channel);
            }
        }
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.lock().get(channel).map(|s| s.subscribers.len()).unwrap_or(0)
    }

    /// Deliver a frame to every subscriber and wake long-poll waiters.
    /// Backlogged or closed subscribers are dropped. Returns the number
    /// of subscribers that received the frame.
    pub fn publish(&self, channel: &str, frame: Arc<str>) -> usize {
        let mut channels = self.channels.lock();
        let Some(state) = channels.get_mut(channel) else {
            // No subscribers; waiters may still be parked on the notify of
            // a previous incarnation and will catch up on their next tick.
            return 0;
        };
        state.subscribers.retain(|s| s.tx.try_send(Arc::clone(&frame)).is_ok());
        state.notify.notify_waiters();
        state.subscribers.len()
    }

    /// The wakeup handle long-poll waiters park on.
    pub fn notify_for(&self, channel: &str) -> Arc<Notify> {
        let mut channels = self.channels.lock();
        Arc::clone(&channels.entry(channel.to_string()).or_default().notify)
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
