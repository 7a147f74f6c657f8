// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use nudge_config::model::GatewayConfig;
use nudge_core::{InboundEvent, NudgeError, PluginAdapter};
use nudge_router::ModeSwitch;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Renders the Prometheus text exposition.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Adapters polled by `GET /health`.
    pub adapters: Vec<Arc<dyn PluginAdapter>>,
    /// Present when the Prometheus exporter is installed.
    pub prometheus_render: Option<MetricsRender>,
}

impl HealthState {
    pub fn new(adapters: Vec<Arc<dyn PluginAdapter>>) -> Self {
        Self {
            start_time: Instant::now(),
            adapters,
            prometheus_render: None,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Queue feeding the agent loop.
    pub inbound_tx: mpsc::Sender<InboundEvent>,
    /// Process-wide operating mode.
    pub mode: ModeSwitch,
    /// Token expected in the webhook subscription handshake.
    pub verify_token: Option<String>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Assemble all gateway routes.
///
/// - `POST /webhook`, `GET /webhook` (public)
/// - `GET /health`, `GET /metrics` (public)
/// - `GET /admin/mode`, `PUT /admin/mode` (bearer token)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route(
            "/webhook",
            post(handlers::post_webhook).get(handlers::verify_webhook),
        )
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/admin/mode",
            get(handlers::get_mode).put(handlers::put_mode),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), NudgeError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NudgeError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| NudgeError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
