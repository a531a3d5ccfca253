// =============================================================================
// REST API Endpoints - Axum 0.7
// =============================================================================
//
// Read-only view of the dashboard under `/api/v1/`. There is no
// authentication. CORS is permissive so a static page served from anywhere
// can poll it.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::dashboard::DashboardState;

// =============================================================================
// Router construction
// =============================================================================

/// Build the dashboard router with CORS middleware and shared state.
pub fn router(state: Arc<DashboardState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/symbols/:symbol", get(symbol_view))
        .route("/api/v1/chart.svg", get(chart_svg))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Snapshot & per-symbol view
// =============================================================================

async fn full_state(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn symbol_view(
    State(state): State<Arc<DashboardState>>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    match state.symbol_view(&symbol.to_ascii_uppercase()) {
        Some(view) => Json(view).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("symbol {symbol} is not tracked") })),
        )
            .into_response(),
    }
}

// =============================================================================
// Chart
// =============================================================================

async fn chart_svg(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    match state.chart_svg() {
        Some(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
