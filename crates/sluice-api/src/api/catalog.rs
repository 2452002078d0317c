//! Read-only service information: health, providers, tools.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
};

use crate::state::AppState;

/// Handler for the health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Configured model providers, API keys redacted
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.providers.redacted())
}

/// Tools agents can be given
pub async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tools.descriptors())
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/providers", get(list_providers))
        .route("/api/v1/tools", get(list_tools))
}
