// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event vocabularies: webhook events and activity-log entry kinds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of events webhook subscriptions can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WebhookEvent {
    ServiceClaim,
    ServiceRelease,
    AgentRegister,
    AgentUnregister,
    AgentStale,
    LockAcquire,
    LockRelease,
    MessagePublish,
    DaemonStart,
    DaemonStop,
}

/// Error for an event name outside the closed vocabulary.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown event: {0:?}")]
pub struct UnknownEvent(pub String);

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 10] = [
        Self::ServiceClaim,
        Self::ServiceRelease,
        Self::AgentRegister,
        Self::AgentUnregister,
        Self::AgentStale,
        Self::LockAcquire,
        Self::LockRelease,
        Self::MessagePublish,
        Self::DaemonStart,
        Self::DaemonStop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceClaim => "service.claim",
            Self::ServiceRelease => "service.release",
            Self::AgentRegister => "agent.register",
            Self::AgentUnregister => "agent.unregister",
            Self::AgentStale => "agent.stale",
            Self::LockAcquire => "lock.acquire",
            Self::LockRelease => "lock.release",
            Self::MessagePublish => "message.publish",
            Self::DaemonStart => "daemon.start",
            Self::DaemonStop => "daemon.stop",
        }
    }
}

impl std::str::FromStr for WebhookEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for WebhookEvent {
    type Error = UnknownEvent;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WebhookEvent> for String {
    fn from(e: WebhookEvent) -> String {
        e.as_str().to_string()
    }
}

/// Closed vocabulary of activity-log entry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ServiceClaim,
    ServiceRelease,
    LockAcquire,
    LockRelease,
    AgentRegister,
    AgentUnregister,
    AgentStale,
    SessionStart,
    SessionEnd,
    SessionNote,
    FileClaim,
    FileRelease,
    MessagePublish,
    ResurrectionClaim,
    ResurrectionComplete,
    DaemonStart,
    DaemonStop,
    Sweep,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceClaim => "service_claim",
            Self::ServiceRelease => "service_release",
            Self::LockAcquire => "lock_acquire",
            Self::LockRelease => "lock_release",
            Self::AgentRegister => "agent_register",
            Self::AgentUnregister => "agent_unregister",
            Self::AgentStale => "agent_stale",
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::SessionNote => "session_note",
            Self::FileClaim => "file_claim",
            Self::FileRelease => "file_release",
            Self::MessagePublish => "message_publish",
            Self::ResurrectionClaim => "resurrection_claim",
            Self::ResurrectionComplete => "resurrection_complete",
            Self::DaemonStart => "daemon_start",
            Self::DaemonStop => "daemon_stop",
            Self::Sweep => "sweep",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
