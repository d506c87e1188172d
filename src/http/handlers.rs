use super::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize)]
pub struct ActiveCallsResponse {
    pub active_calls: usize,
    pub connections: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "Voice call API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "healthy".to_string(),
    })
}

/// GET /health
/// Health of the voice pipeline
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline_ok = state.pipeline.health_check().await;

    let mut services = BTreeMap::new();
    services.insert(state.pipeline.name().to_string(), pipeline_ok);

    let (code, status) = if pipeline_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            services,
        }),
    )
}

/// GET /api/active-calls
/// Connected callers
pub async fn active_calls(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.connections.read().await;

    let mut ids: Vec<String> = connections.keys().cloned().collect();
    ids.sort();

    Json(ActiveCallsResponse {
        active_calls: ids.len(),
        connections: ids,
    })
}
