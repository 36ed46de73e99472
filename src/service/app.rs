//! Main application state and HTTP surface
//!
//! `AppState` wires the registry, hub, gateway, and metrics together and
//! backs the axum router serving the WebSocket endpoint alongside the
//! operational endpoints.

use crate::config::AppConfig;
use crate::gateway::hub::{Broadcaster, SessionHub};
use crate::gateway::ws::websocket_handler;
use crate::gateway::Gateway;
use crate::lobby::registry::LobbyRegistry;
use crate::metrics::MetricsCollector;
use crate::service::health::HealthCheck;
use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Shared state behind every route
pub struct AppState {
    config: AppConfig,
    registry: Arc<LobbyRegistry>,
    hub: Arc<SessionHub>,
    gateway: Gateway,
    metrics: Arc<MetricsCollector>,
    started_at: Instant,
}

impl AppState {
    /// Wire up all service components from a validated configuration
    pub fn new(config: AppConfig) -> Result<Arc<Self>> {
        let metrics = Arc::new(MetricsCollector::new()?);
        let hub = Arc::new(SessionHub::new());
        let registry = Arc::new(LobbyRegistry::new(
            config.lobby.clone(),
            Arc::clone(&hub) as Arc<dyn Broadcaster>,
            Arc::clone(&metrics),
        ));
        let gateway = Gateway::new(Arc::clone(&registry), Arc::clone(&hub));

        Ok(Arc::new(Self {
            config,
            registry,
            hub,
            gateway,
            metrics,
            started_at: Instant::now(),
        }))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<LobbyRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Disband every live lobby; called once on graceful shutdown
    pub fn shutdown(&self) {
        info!("Shutting down lobby registry");
        self.registry.shutdown();
    }
}

/// Build the service router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/ws", any(websocket_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves, then disband
/// whatever is still live.
pub async fn serve(
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.config().service.host,
        state.config().service.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    let app = router(Arc::clone(&state));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    state.shutdown();
    Ok(())
}

async fn root_handler() -> &'static str {
    concat!("green-room ", env!("CARGO_PKG_VERSION"))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check = HealthCheck::check(&state);
    (check.status_code(), Json(check))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state
        .metrics()
        .set_uptime_seconds(state.uptime().as_secs() as i64);
    match state.metrics().render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding failure").into_response()
        }
    }
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.registry().stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Failed to read registry stats: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "stats unavailable").into_response()
        }
    }
}
