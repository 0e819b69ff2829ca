//! HTTP API for the document review service.
//!
//! This module exposes the review actions as REST endpoints:
//! - Session creation (submit a storage location)
//! - Asset selection and page navigation
//! - Raster and overlay retrieval
//! - Field highlighting
//! - Health and metrics monitoring

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::review::ReviewService;

pub mod sessions;
use sessions::{
    clear_highlight_handler, create_session_handler, get_raster_handler, get_session_handler,
    get_view_handler, list_assets_handler, navigate_page_handler, select_asset_handler,
    set_highlight_handler,
};

/// Application state
pub struct AppState {
    pub service: Arc<ReviewService>,
    pub start_time: Instant,
    pub metrics: PrometheusHandle,
}

/// Build the API router
pub fn router(service: Arc<ReviewService>, metrics: PrometheusHandle) -> Router {
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/assets", get(list_assets_handler))
        .route("/sessions/{id}/asset", post(select_asset_handler))
        .route("/sessions/{id}/page", post(navigate_page_handler))
        .route("/sessions/{id}/raster", get(get_raster_handler))
        .route("/sessions/{id}/view", get(get_view_handler))
        .route("/sessions/{id}/highlight", put(set_highlight_handler))
        .route("/sessions/{id}/highlight", delete(clear_highlight_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        active_sessions: state.service.session_count(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    active_sessions: usize,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
