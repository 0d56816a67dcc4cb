// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request parsing helpers shared by the handlers.

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use serde::de::DeserializeOwned;

use pd_core::ApiError;

/// Parse a JSON request body.
///
/// An empty body parses as `{}` so endpoints with all-optional fields
/// accept bare requests. A non-JSON `Content-Type` is rejected up front.
pub fn json_body<T: DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> Result<T, ApiError> {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        let value = content_type.to_str().unwrap_or("");
        if !value.is_empty() && !value.starts_with("application/json") {
            return Err(ApiError::validation(format!(
                "expected application/json, got {:?}",
                value
            )));
        }
    }
    let slice: &[u8] = if body.is_empty() { b"{}" } else { body };
    serde_json::from_slice(slice)
        .map_err(|e| ApiError::validation(format!("invalid JSON body: {}", e)))
}

/// Parse the `X-PID` header when present.
pub fn header_pid(headers: &HeaderMap) -> Result<Option<u32>, ApiError> {
    let Some(raw) = headers.get("x-pid") else { return Ok(None) };
    let text = raw
        .to_str()
        .map_err(|_| ApiError::new(pd_core::ErrorKind::PidInvalid, "unreadable X-PID header"))?;
    let value: i64 = text.trim().parse().map_err(|_| {
        ApiError::new(pd_core::ErrorKind::PidInvalid, format!("invalid X-PID: {:?}", text))
    })?;
    pd_core::validate::pid(value).map(Some)
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
