// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the Port Daddy HTTP protocol.
//!
//! Request and response bodies are JSON (UTF-8); these DTOs are shared by
//! the daemon's transport layer and by SDK/CLI clients. Field names follow
//! the wire convention (camelCase) unless a field is documented otherwise.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod requests;
mod responses;

pub use requests::{
    AgentRegisterRequest, ClaimRequest, EndpointRequest, LockAcquireRequest, LockExtendRequest,
    LockReleaseRequest, NoteRequest, PortRange, ProjectUpsertRequest, PublishRequest,
    QuickNoteRequest, ReleaseRequest, ResurrectionCompleteRequest, SessionFilesClaimRequest,
    SessionFilesReleaseRequest, SessionStartRequest, SessionUpdateRequest, WaitAllRequest,
    WebhookRegisterRequest,
};
pub use responses::{
    ActivityEntry, AgentInfo, ClaimResponse, ErrorBody, FileConflict, HealthResponse, LockInfo,
    MessageInfo, PortStatus, ReleaseResponse, ResurrectionEntry, ServiceHealth, ServiceInfo,
    SessionInfo, SessionNoteInfo, VersionResponse, WaitAllResponse, WebhookDeliveryInfo,
    WebhookInfo,
};

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
