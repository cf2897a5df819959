use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::state::AppState;

/// Health check endpoint
/// Returns 200 OK if the service is running
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "service": "offerte-engine",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// Readiness check endpoint
/// Returns 200 OK once a catalog is loaded; quotes cannot be priced before
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.current_catalog() {
        Ok(catalog) => (StatusCode::OK, Json(json!({
            "status": "ready",
            "service": "offerte-engine",
            "categories": catalog.categories.len(),
            "open_sessions": state.sessions.len(),
        }))),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({
            "status": "not_ready",
            "service": "offerte-engine",
            "reason": e.to_string(),
        }))),
    }
}
