// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook subscription and delivery rows.

use rusqlite::{params, Connection, OptionalExtension};

/// One subscription. `events` is stored as a comma-joined list of the
/// closed event names.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRow {
    pub id: String,
    pub url: String,
    pub secret: Option<String>,
    pub events: Vec<String>,
    pub filter_pattern: Option<String>,
    pub active: bool,
    pub success_count: u64,
    pub failure_count: u64,
    pub created_at: u64,
    pub metadata: Option<String>,
}

/// One delivery attempt record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRow {
    pub id: i64,
    pub webhook_id: String,
    pub event: String,
    pub payload: String,
    pub status: String,
    pub attempts: u32,
    pub response_code: Option<u16>,
    pub response_body: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

const COLUMNS: &str = "id, url, secret, events, filter_pattern, active, \
                       success_count, failure_count, created_at, metadata";

fn row_to_webhook(row: &rusqlite::Row<'_>) -> rusqlite::Result<WebhookRow> {
    let events: String = row.get(3)?;
    Ok(WebhookRow {
        id: row.get(0)?,
        url: row.get(1)?,
        secret: row.get(2)?,
        events: events.split(',').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect(),
        filter_pattern: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        success_count: row.get::<_, i64>(6)? as u64,
        failure_count: row.get::<_, i64>(7)? as u64,
        created_at: row.get::<_, i64>(8)? as u64,
        metadata: row.get(9)?,
    })
}

fn row_to_delivery(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeliveryRow> {
    Ok(DeliveryRow {
        id: row.get(0)?,
        webhook_id: row.get(1)?,
        event: row.get(2)?,
        payload: row.get(3)?,
        status: row.get(4)?,
        attempts: row.get::<_, i64>(5)? as u32,
        response_code: row.get::<_, Option<i64>>(6)?.map(|v| v as u16),
        response_body: row.get(7)?,
        created_at: row.get::<_, i64>(8)? as u64,
        updated_at: row.get::<_, i64>(9)? as u64,
    })
}

const DELIVERY_COLUMNS: &str = "id, webhook_id, event, payload, status, attempts, \
                                response_code, response_body, created_at, updated_at";

#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    id: &str,
    url: &str,
    secret: Option<&str>,
    events: &[String],
    filter_pattern: Option<&str>,
    metadata: Option<&str>,
    now: u64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO webhooks (id, url, secret, events, filter_pattern, active, \
         success_count, failure_count, created_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, 0, ?6, ?7)",
        params![id, url, secret, events.join(","), filter_pattern, now as i64, metadata],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<WebhookRow>> {
    conn.query_row(&format!("SELECT {COLUMNS} FROM webhooks WHERE id = ?1"), [id], row_to_webhook)
        .optional()
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM webhooks WHERE id = ?1", [id])? > 0)
}

pub fn list(conn: &Connection, active_only: bool) -> rusqlite::Result<Vec<WebhookRow>> {
    let sql = if active_only {
        format!("SELECT {COLUMNS} FROM webhooks WHERE active = 1 ORDER BY created_at")
    } else {
        format!("SELECT {COLUMNS} FROM webhooks ORDER BY created_at")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_webhook)?;
    rows.collect()
}

/// Bump the subscription's success/failure counter.
pub fn record_outcome(conn: &Connection, id: &str, success: bool) -> rusqlite::Result<()> {
    let sql = if success {
        "UPDATE webhooks SET success_count = success_count + 1 WHERE id = ?1"
    } else {
        "UPDATE webhooks SET failure_count = failure_count + 1 WHERE id = ?1"
    };
    conn.execute(sql, [id])?;
    Ok(())
}

pub fn insert_delivery(
    conn: &Connection,
    webhook_id: &str,
    event: &str,
    payload: &str,
    now: u64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO webhook_deliveries (webhook_id, event, payload, status, attempts, \
         created_at, updated_at) VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?4)",
        params![webhook_id, event, payload, now as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update a delivery after an attempt.
pub fn update_delivery(
    conn: &Connection,
    id: i64,
    status: &str,
    attempts: u32,
    response_code: Option<u16>,
    response_body: Option<&str>,
    now: u64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE webhook_deliveries SET status = ?2, attempts = ?3, response_code = ?4, \
         response_body = ?5, updated_at = ?6 WHERE id = ?1",
        params![
            id,
            status,
            i64::from(attempts),
            response_code.map(i64::from),
            response_body,
            now as i64
        ],
    )?;
    Ok(())
}

pub fn list_deliveries(
    conn: &Connection,
    webhook_id: &str,
    limit: u32,
) -> rusqlite::Result<Vec<DeliveryRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE webhook_id = ?1 \
         ORDER BY id DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![webhook_id, limit], row_to_delivery)?;
    rows.collect()
}

/// Deliveries left `pending` by a previous daemon run.
pub fn pending_deliveries(conn: &Connection) -> rusqlite::Result<Vec<DeliveryRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE status = 'pending' ORDER BY id"
    ))?;
    let rows = stmt.query_map([], row_to_delivery)?;
    rows.collect()
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;
