// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared request validators and size caps.

use crate::error::{ApiError, ErrorKind};

/// Metadata blobs are capped at 4 KiB of serialized JSON.
pub const METADATA_MAX_BYTES: usize = 4 * 1024;
/// Message payloads are capped at 1 MiB.
pub const PAYLOAD_MAX_BYTES: usize = 1024 * 1024;
/// Session note content is capped at 64 KiB.
pub const NOTE_MAX_BYTES: usize = 64 * 1024;
/// Session purpose is capped at 1 KiB.
pub const PURPOSE_MAX_BYTES: usize = 1024;
/// Page size cap on message reads.
pub const PAGE_MAX: u32 = 1000;
/// `waitForAll` accepts at most this many ids.
pub const WAIT_IDS_MAX: usize = 20;
/// Long-poll timeouts are clamped to 60 s.
pub const LONGPOLL_MAX_MS: u64 = 60_000;

/// Channel and lock names: 1-128 chars. Channels allow `[A-Za-z0-9._:-]`,
/// same alphabet as lock names.
pub const NAME_MAX_LEN: usize = 128;

fn valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-')
}

/// Validate a pub/sub channel name.
pub fn channel_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.len() > NAME_MAX_LEN || !name.chars().all(valid_name_char) {
        return Err(ApiError::new(
            ErrorKind::ChannelInvalid,
            format!("invalid channel name: {:?}", name),
        ));
    }
    Ok(())
}

/// Validate a lock name.
pub fn lock_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.len() > NAME_MAX_LEN || !name.chars().all(valid_name_char) {
        return Err(ApiError::validation(format!("invalid lock name: {:?}", name)));
    }
    Ok(())
}

/// Validate an agent id (same alphabet and bounds as lock names).
pub fn agent_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() || id.len() > NAME_MAX_LEN || !id.chars().all(valid_name_char) {
        return Err(ApiError::validation(format!("invalid agent id: {:?}", id)));
    }
    Ok(())
}

/// Validate a process id. Zero and negative values are never valid targets.
pub fn pid(value: i64) -> Result<u32, ApiError> {
    if value <= 0 || value > i64::from(i32::MAX) {
        return Err(ApiError::new(ErrorKind::PidInvalid, format!("invalid pid: {}", value)));
    }
    Ok(value as u32)
}

/// Validate an endpoint environment name (`dev`, `staging`, ...).
pub fn env_name(env: &str) -> Result<(), ApiError> {
    if env.is_empty()
        || env.len() > 32
        || !env.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ApiError::validation(format!("invalid environment name: {:?}", env)));
    }
    Ok(())
}

/// Serialize metadata and enforce the 4 KiB cap. `None` stores NULL.
pub fn metadata_json(metadata: Option<&serde_json::Value>) -> Result<Option<String>, ApiError> {
    let Some(value) = metadata else { return Ok(None) };
    let serialized = serde_json::to_string(value)
        .map_err(|e| ApiError::validation(format!("unserializable metadata: {}", e)))?;
    if serialized.len() > METADATA_MAX_BYTES {
        return Err(ApiError::new(
            ErrorKind::MetadataTooLarge,
            format!("metadata is {} bytes, cap is {}", serialized.len(), METADATA_MAX_BYTES),
        ));
    }
    Ok(Some(serialized))
}

/// Serialize a message payload and enforce the 1 MiB cap.
pub fn payload_json(payload: &serde_json::Value) -> Result<String, ApiError> {
    let serialized = serde_json::to_string(payload)
        .map_err(|e| ApiError::validation(format!("unserializable payload: {}", e)))?;
    if serialized.len() > PAYLOAD_MAX_BYTES {
        return Err(ApiError::new(
            ErrorKind::PayloadTooLarge,
            format!("payload is {} bytes, cap is {}", serialized.len(), PAYLOAD_MAX_BYTES),
        ));
    }
    Ok(serialized)
}

/// Validate session note content.
pub fn note_content(content: &str) -> Result<(), ApiError> {
    if content.is_empty() {
        return Err(ApiError::validation("note content must not be empty"));
    }
    if content.len() > NOTE_MAX_BYTES {
        return Err(ApiError::validation(format!(
            "note content is {} bytes, cap is {}",
            content.len(),
            NOTE_MAX_BYTES
        )));
    }
    Ok(())
}

/// Validate a session purpose.
pub fn purpose(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::validation("purpose must not be empty"));
    }
    if text.len() > PURPOSE_MAX_BYTES {
        return Err(ApiError::validation(format!(
            "purpose is {} bytes, cap is {}",
            text.len(),
            PURPOSE_MAX_BYTES
        )));
    }
    Ok(())
}

/// Clamp a requested timeout to a documented maximum.
pub fn clamp_timeout_ms(requested: u64, max: u64) -> u64 {
    requested.min(max)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
