//! Live answer streams.
//!
//! `POST /api/v1/agents/message` answers with `text/event-stream` right away
//! and keeps the connection open while the agent works. The session runs on
//! its own task; the handler only wires the response body to it.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Json, Response},
    routing::post,
};
use serde::Deserialize;
use sluice_common::constants::SINK_BUFFER_FRAMES;
use sluice_stream::{AgentQuery, Cancellation};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::ApiError;
use crate::sink;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessageRequest {
    pub agent_id: Uuid,
    pub message: String,
    /// Client conversation id; a fresh one is generated when absent
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Stream an agent's answer to one message
pub async fn agent_message(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<AgentMessageRequest>,
) -> Result<Response, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let query = AgentQuery {
        session_id: request.session_id.unwrap_or_else(Uuid::new_v4),
        user_id,
        agent_id: request.agent_id,
        message: request.message,
    };
    let span = info_span!("session", session_id = %query.session_id);

    let (sink, body) = sink::channel(SINK_BUFFER_FRAMES);
    let cancel = Cancellation::with_parent(&state.shutdown);
    let sessions = state.sessions.clone();
    tokio::spawn(
        async move {
            sessions.serve(query, sink, cancel).await;
        }
        .instrument(span),
    );

    Ok(event_stream_response(body, state.cors_origin.clone()))
}

fn event_stream_response(body: Body, cors_origin: HeaderValue) -> Response {
    let headers: [(HeaderName, HeaderValue); 4] = [
        (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, cors_origin),
    ];
    (headers, body).into_response()
}

/// Streaming routes. Mounted outside the request timeout layer: a stream
/// lives as long as the agent works and the client listens.
pub fn message_routes() -> Router<AppState> {
    Router::new().route("/api/v1/agents/message", post(agent_message))
}
