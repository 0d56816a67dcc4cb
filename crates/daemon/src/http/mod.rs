// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: router, shared state, and the dual Unix/TCP accept
//! loops. Both listeners serve the same router; each request is stamped
//! with a peer key used by rate limiting and connection budgets.

mod error;
mod extract;
pub mod handlers;
mod rate_limit;
mod sse;

pub use error::{HttpError, HttpResult};
pub use rate_limit::RateLimiter;

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;
use tracing::{debug, error, info};

use pd_core::{ApiError, Clock, Config, ErrorKind};
use pd_storage::Store;

use crate::health::{HealthProber, ProbeClient};
use crate::hub::{Budgets, Messaging};
use crate::metrics::Metrics;
use crate::registry::activity::ActivityLog;
use crate::registry::agents::AgentRegistry;
use crate::registry::locks::LockRegistry;
use crate::registry::ports::{OccupancyProbe, PortAllocator};
use crate::registry::projects::ProjectRegistry;
use crate::registry::resurrection::ResurrectionQueue;
use crate::registry::services::ServiceRegistry;
use crate::registry::sessions::SessionRegistry;
use crate::webhooks::WebhookDispatcher;

/// Per-connection peer identity: the client IP, or `unix`.
#[derive(Debug, Clone)]
pub struct PeerKey(pub Arc<str>);

impl PeerKey {
    pub fn unix() -> Self {
        Self(Arc::from("unix"))
    }

    pub fn tcp(addr: &SocketAddr) -> Self {
        Self(Arc::from(addr.ip().to_string().as_str()))
    }
}

/// Everything the handlers share.
pub struct AppInner<C: Clock> {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub clock: C,
    pub services: ServiceRegistry<C>,
    pub locks: LockRegistry<C>,
    pub agents: AgentRegistry<C>,
    pub sessions: SessionRegistry<C>,
    pub messaging: Arc<Messaging<C>>,
    pub activity: Arc<ActivityLog<C>>,
    pub resurrection: Arc<ResurrectionQueue<C>>,
    pub projects: ProjectRegistry<C>,
    pub prober: Arc<HealthProber<C>>,
    pub webhooks: Arc<WebhookDispatcher<C>>,
    pub budgets: Budgets,
    pub rate_limiter: RateLimiter,
    pub metrics: Arc<Metrics>,
    pub started_at_ms: u64,
    pub started: Instant,
    pub shutdown: CancellationToken,
}

pub struct AppState<C: Clock>(Arc<AppInner<C>>);

impl<C: Clock> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<C: Clock> Deref for AppState<C> {
    type Target = AppInner<C>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// External collaborators injected at construction.
pub struct AppDeps<C: Clock> {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
    pub clock: C,
    pub probe_client: Arc<dyn ProbeClient>,
    pub occupancy: Arc<dyn OccupancyProbe>,
    pub shutdown: CancellationToken,
}

impl<C: Clock> AppState<C> {
    pub fn new(deps: AppDeps<C>) -> Self {
        let AppDeps { store, config, clock, probe_client, occupancy, shutdown } = deps;
        let metrics = Arc::new(Metrics::default());
        let allocator = Arc::new(PortAllocator::new(Arc::clone(&config), occupancy));
        let messaging = Arc::new(Messaging::new(
            Arc::clone(&store),
            Arc::clone(&config),
            clock.clone(),
        ));
        let resurrection = Arc::new(ResurrectionQueue::new(
            Arc::clone(&store),
            Arc::clone(&config),
            Arc::clone(&messaging),
            clock.clone(),
        ));
        let webhooks = Arc::new(WebhookDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&config),
            clock.clone(),
            shutdown.clone(),
            Arc::clone(&metrics),
        ));
        Self(Arc::new(AppInner {
            services: ServiceRegistry::new(Arc::clone(&store), allocator, clock.clone()),
            locks: LockRegistry::new(Arc::clone(&store), Arc::clone(&config), clock.clone()),
            agents: AgentRegistry::new(Arc::clone(&store), Arc::clone(&config), clock.clone()),
            sessions: SessionRegistry::new(Arc::clone(&store), clock.clone()),
            activity: Arc::new(ActivityLog::new(Arc::clone(&store), clock.clone())),
            projects: ProjectRegistry::new(Arc::clone(&store), clock.clone()),
            prober: Arc::new(HealthProber::new(
                Arc::clone(&store),
                Arc::clone(&config),
                probe_client,
                clock.clone(),
            )),
            budgets: Budgets::new(Arc::clone(&config)),
            rate_limiter: RateLimiter::new(config.rate_limit.per_ip_per_minute),
            started_at_ms: clock.epoch_ms(),
            started: Instant::now(),
            messaging,
            resurrection,
            webhooks,
            metrics,
            store,
            config,
            clock,
            shutdown,
        }))
    }
}

/// The external protocol: every path of §6.2 plus the registry
/// completions, one router for both transports.
pub fn build_router<C: Clock>(state: AppState<C>) -> Router {
    let body_cap = state.config.payload.max_bytes;
    Router::new()
        // Services & ports
        .route("/claim", post(handlers::services::claim::<C>))
        .route("/release", delete(handlers::services::release::<C>))
        .route("/services", get(handlers::services::list::<C>))
        .route(
            "/services/:id",
            get(handlers::services::get_one::<C>).delete(handlers::services::release_one::<C>),
        )
        .route("/services/:id/endpoints/:env", put(handlers::services::set_endpoint::<C>))
        .route("/ports/active", get(handlers::services::active_ports::<C>))
        .route("/ports/cleanup", post(handlers::services::cleanup::<C>))
        // Locks
        .route("/locks", get(handlers::locks::list::<C>))
        .route(
            "/locks/:name",
            post(handlers::locks::acquire::<C>)
                .get(handlers::locks::get_one::<C>)
                .put(handlers::locks::extend::<C>)
                .delete(handlers::locks::release::<C>),
        )
        // Messaging
        .route(
            "/msg/:channel",
            post(handlers::messages::publish::<C>).get(handlers::messages::get_messages::<C>),
        )
        .route("/msg/:channel/poll", get(handlers::messages::poll::<C>))
        .route("/msg/:channel/subscribe", get(handlers::messages::subscribe::<C>))
        // Agents
        .route(
            "/agents",
            post(handlers::agents::register::<C>).get(handlers::agents::list::<C>),
        )
        .route(
            "/agents/:id",
            get(handlers::agents::get_one::<C>).delete(handlers::agents::unregister::<C>),
        )
        .route("/agents/:id/heartbeat", post(handlers::agents::heartbeat::<C>))
        // Sessions & notes
        .route(
            "/sessions",
            post(handlers::sessions::start::<C>).get(handlers::sessions::list::<C>),
        )
        .route("/sessions/conflicts", get(handlers::sessions::conflicts::<C>))
        .route(
            "/sessions/:id",
            put(handlers::sessions::update::<C>)
                .get(handlers::sessions::get_one::<C>)
                .delete(handlers::sessions::remove::<C>),
        )
        .route(
            "/sessions/:id/notes",
            post(handlers::sessions::add_note::<C>).get(handlers::sessions::notes::<C>),
        )
        .route(
            "/sessions/:id/files",
            post(handlers::sessions::claim_files::<C>)
                .delete(handlers::sessions::release_files::<C>),
        )
        .route("/notes", post(handlers::sessions::quick_note::<C>))
        // Health waits
        .route("/wait/:id", get(handlers::wait::wait_one::<C>))
        .route("/wait", post(handlers::wait::wait_all::<C>))
        // Webhooks
        .route(
            "/webhooks",
            post(handlers::webhooks::register::<C>).get(handlers::webhooks::list::<C>),
        )
        .route("/webhooks/:id", delete(handlers::webhooks::remove::<C>))
        .route("/webhooks/:id/test", post(handlers::webhooks::test_fire::<C>))
        .route("/webhooks/:id/deliveries", get(handlers::webhooks::deliveries::<C>))
        // Resurrection
        .route("/resurrection", get(handlers::resurrection::list::<C>))
        .route("/resurrection/pending", get(handlers::resurrection::pending::<C>))
        .route("/resurrection/claim/:id", post(handlers::resurrection::claim::<C>))
        .route("/resurrection/complete/:id", post(handlers::resurrection::complete::<C>))
        .route("/resurrection/abandon/:id", post(handlers::resurrection::abandon::<C>))
        .route("/resurrection/:id", delete(handlers::resurrection::dismiss::<C>))
        // Activity
        .route("/activity", get(handlers::activity::recent::<C>))
        .route("/activity/summary", get(handlers::activity::summary::<C>))
        // Projects
        .route(
            "/projects",
            post(handlers::projects::upsert::<C>).get(handlers::projects::list::<C>),
        )
        .route(
            "/projects/:id",
            get(handlers::projects::get_one::<C>).delete(handlers::projects::remove::<C>),
        )
        // System
        .route("/health", get(handlers::system::health::<C>))
        .route("/version", get(handlers::system::version::<C>))
        .route("/metrics", get(handlers::system::metrics::<C>))
        .layer(middleware::from_fn_with_state(state.clone(), guard::<C>))
        .layer(DefaultBodyLimit::max(body_cap))
        .with_state(state)
}

/// Front middleware: peer stamping, request counting, rate limiting.
async fn guard<C: Clock>(
    State(state): State<AppState<C>>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.extensions().get::<PeerKey>().is_none() {
        req.extensions_mut().insert(PeerKey::unix());
    }
    let peer = req
        .extensions()
        .get::<PeerKey>()
        .cloned()
        .unwrap_or_else(PeerKey::unix);

    Metrics::bump(&state.metrics.requests_total);
    if !state.rate_limiter.allow(&peer.0, state.clock.epoch_ms()) {
        Metrics::bump(&state.metrics.rate_limited_total);
        return HttpError(ApiError::new(
            ErrorKind::RateLimited,
            format!("rate limit exceeded for {}", peer.0),
        ))
        .into_response();
    }
    next.run(req).await
}

/// Accept loop over the Unix socket.
pub async fn serve_unix(listener: UnixListener, router: Router, shutdown: CancellationToken) {
    info!("listening on unix socket");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    spawn_connection(TokioIo::new(stream), router.clone(), PeerKey::unix());
                }
                Err(e) => error!("unix accept error: {}", e),
            }
        }
    }
}

/// Accept loop over loopback TCP.
pub async fn serve_tcp(listener: TcpListener, router: Router, shutdown: CancellationToken) {
    info!("listening on tcp");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("tcp connection from {}", addr);
                    spawn_connection(TokioIo::new(stream), router.clone(), PeerKey::tcp(&addr));
                }
                Err(e) => error!("tcp accept error: {}", e),
            }
        }
    }
}

fn spawn_connection<I>(io: TokioIo<I>, router: Router, peer: PeerKey)
where
    I: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let service = hyper::service::service_fn(move |mut req: Request<Incoming>| {
            let router = router.clone();
            let peer = peer.clone();
            async move {
                req.extensions_mut().insert(peer);
                router.oneshot(req.map(axum::body::Body::new)).await
            }
        });
        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            debug!("connection error: {}", e);
        }
    });
}
