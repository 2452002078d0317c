//! JSON error responses for the non-streaming endpoints.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sluice_common::SluiceError;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: u32,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from(SluiceError::InvalidRequest(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, 1401, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SluiceError> for ApiError {
    fn from(err: SluiceError) -> Self {
        let status = match &err {
            SluiceError::AgentNotFound | SluiceError::ProviderConfigNotFound(_) => StatusCode::NOT_FOUND,
            SluiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SluiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "code": self.code, "message": self.message })),
        )
            .into_response()
    }
}
