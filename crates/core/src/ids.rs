// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generated identifiers for daemon-owned records.

const HEX: [char; 16] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f'];

/// New session id: `session-<12 hex chars>`.
pub fn session_id() -> String {
    format!("session-{}", nanoid::nanoid!(12, &HEX))
}

/// New webhook subscription id: `wh-<10 hex chars>`.
pub fn webhook_id() -> String {
    format!("wh-{}", nanoid::nanoid!(10, &HEX))
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
