// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared spec fixtures: an in-process daemon app and request helpers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use pd_core::{Config, FakeClock};
use pd_daemon::health::HttpProbeClient;
use pd_daemon::registry::ports::OccupancyProbe;
use pd_daemon::{build_router, AppDeps, AppState};
use pd_storage::Store;

/// Probe that reports every port free; specs exercise policy, not the OS.
struct FreeProbe;

impl OccupancyProbe for FreeProbe {
    fn is_occupied(&self, _port: u16) -> bool {
        false
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState<FakeClock>,
    pub clock: FakeClock,
    _dir: tempfile::TempDir,
}

pub fn app() -> TestApp {
    app_with(Config::default())
}

pub fn app_with(config: Config) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(&dir.path().join("port-registry.db")).unwrap());
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000_000);
    let state = AppState::new(AppDeps {
        store,
        config: Arc::new(config),
        clock: clock.clone(),
        probe_client: Arc::new(HttpProbeClient::new()),
        occupancy: Arc::new(FreeProbe),
        shutdown: tokio_util_token(),
    });
    TestApp { router: build_router(state.clone()), state, clock, _dir: dir }
}

fn tokio_util_token() -> tokio_util::sync::CancellationToken {
    tokio_util::sync::CancellationToken::new()
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        self.request_with_headers(method, path, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(path);
        let mut has_content_type = false;
        for (name, value) in headers {
            has_content_type |= name.eq_ignore_ascii_case("content-type");
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => {
                if !has_content_type {
                    builder = builder.header("content-type", "application/json");
                }
                builder.body(Body::from(body.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        self.request("GET", path, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request("POST", path, Some(body)).await
    }
}

/// Assert an error envelope carries the expected `code`.
pub fn assert_code(body: &serde_json::Value, code: &str) {
    assert_eq!(body["code"], code, "unexpected error body: {}", body);
}
