// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed error taxonomy shared by every component.
//!
//! Each kind carries the `code` string reported verbatim on the wire and
//! the HTTP status it maps to.

use serde::{Deserialize, Serialize};

/// The closed error-kind vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    IdentityInvalid,
    PidInvalid,
    ValidationError,
    MetadataTooLarge,
    PortOutOfRange,
    PortReserved,
    PortExhausted,
    ServiceNotFound,
    LockHeld,
    LockForbidden,
    QuotaExceeded,
    FileConflict,
    SessionNotFound,
    ChannelInvalid,
    PayloadTooLarge,
    RateLimited,
    ConnectionLimit,
    SsrfBlocked,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// The wire `code` string.
    pub fn code(self) -> &'static str {
        match self {
            Self::IdentityInvalid => "IDENTITY_INVALID",
            Self::PidInvalid => "PID_INVALID",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::MetadataTooLarge => "METADATA_TOO_LARGE",
            Self::PortOutOfRange => "PORT_OUT_OF_RANGE",
            Self::PortReserved => "PORT_RESERVED",
            Self::PortExhausted => "PORT_EXHAUSTED",
            Self::ServiceNotFound => "SERVICE_NOT_FOUND",
            Self::LockHeld => "LOCK_HELD",
            Self::LockForbidden => "LOCK_FORBIDDEN",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::FileConflict => "FILE_CONFLICT",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::ChannelInvalid => "CHANNEL_INVALID",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::RateLimited => "RATE_LIMITED",
            Self::ConnectionLimit => "CONNECTION_LIMIT",
            Self::SsrfBlocked => "SSRF_BLOCKED",
            Self::Timeout => "TIMEOUT",
            Self::Internal => "INTERNAL",
        }
    }

    /// HTTP status the kind maps to.
    pub fn http_status(self) -> u16 {
        match self {
            Self::IdentityInvalid
            | Self::PidInvalid
            | Self::ValidationError
            | Self::MetadataTooLarge
            | Self::PortOutOfRange
            | Self::PortReserved
            | Self::ChannelInvalid
            | Self::SsrfBlocked => 400,
            Self::LockForbidden => 403,
            Self::ServiceNotFound | Self::SessionNotFound => 404,
            Self::Timeout => 408,
            Self::LockHeld | Self::FileConflict => 409,
            Self::PayloadTooLarge => 413,
            Self::PortExhausted | Self::QuotaExceeded | Self::RateLimited => 429,
            Self::ConnectionLimit => 503,
            Self::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A domain failure: kind, human message, optional structured detail
/// (lock holder, conflicting claims, quota counters).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), detail: None }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
