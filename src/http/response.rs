//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map every [`EdgeError`] to a status code and JSON body
//! - Record rejections per pipeline stage
//!
//! # Design Decisions
//! - Admission failures are 4xx; the whitelist source failing is 500 so that
//!   admission never silently passes; upstream failures are 502/504
//! - Client rejections carry a reason; server-side failures only carry a generic
//!   message and their detail goes to the log

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::EdgeError;
use crate::http::proxy::ForwardError;
use crate::observability::metrics;
use crate::security::AuthError;

impl EdgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EdgeError::NotWhitelisted { .. } => StatusCode::FORBIDDEN,
            EdgeError::Whitelist(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EdgeError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            EdgeError::Auth(AuthError::InvalidCredentials) => StatusCode::FORBIDDEN,
            EdgeError::Auth(AuthError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            EdgeError::Auth(_) => StatusCode::UNAUTHORIZED,
            EdgeError::Forward(ForwardError::Unreachable { .. }) => StatusCode::BAD_GATEWAY,
            EdgeError::Forward(ForwardError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            EdgeError::Forward(ForwardError::NoTargets) => StatusCode::SERVICE_UNAVAILABLE,
            EdgeError::Forward(ForwardError::BuildRequest(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            EdgeError::DataService(_) => StatusCode::BAD_GATEWAY,
            EdgeError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            EdgeError::NotWhitelisted { client } => {
                json!({ "message": "not in whitelist", "ip": client.to_string() })
            }
            EdgeError::Whitelist(_) => json!({ "message": "error getting whitelists" }),
            EdgeError::RateLimited => json!({ "message": "too many requests" }),
            EdgeError::Auth(AuthError::InvalidCredentials) => {
                json!({ "message": "invalid credentials" })
            }
            EdgeError::Auth(AuthError::Signing(_)) => json!({ "message": "error forging token" }),
            EdgeError::Auth(e) => {
                json!({ "message": "error validating token", "error": e.to_string() })
            }
            EdgeError::Forward(ForwardError::Timeout { .. }) => {
                json!({ "message": "upstream timed out" })
            }
            EdgeError::Forward(_) => json!({ "message": "upstream unavailable" }),
            EdgeError::DataService(_) => json!({ "message": "error calling data" }),
            EdgeError::BadRequest(e) => json!({ "message": e }),
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.stage() {
            Some(stage) => {
                metrics::record_rejection(stage.as_str());
                if status.is_server_error() {
                    tracing::error!(stage = stage.as_str(), status = %status, error = %self, "Request failed");
                } else {
                    tracing::warn!(stage = stage.as_str(), status = %status, error = %self, "Request rejected");
                }
            }
            None if status.is_server_error() => {
                tracing::error!(status = %status, error = %self, "Request failed")
            }
            None => tracing::debug!(status = %status, error = %self, "Request failed"),
        }
        (status, Json(self.body())).into_response()
    }
}
