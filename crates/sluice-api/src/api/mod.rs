pub mod agents;
pub mod catalog;
pub mod messages;

use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
///
/// Management routes are bounded by `request_timeout`; streaming routes are
/// not.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let bounded = Router::new()
        .merge(agents::agent_routes())
        .merge(catalog::catalog_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors(&state.cors_origin));

    Router::new()
        .merge(bounded)
        .merge(messages::message_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(origin: &HeaderValue) -> CorsLayer {
    let allow_origin = if origin == "*" {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::exact(origin.clone())
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
