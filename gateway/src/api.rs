use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_core::RunOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;

// GET /start?platform=..&username=..
#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub platform: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub thread_id: String,
    pub message: String,
}

// POST /chat. Fields are optional so we can answer with our own 400s.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub thread_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub run_id: String,
}

// POST /check
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub thread_id: Option<String>,
    pub run_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResponse {
    pub response: String,
    pub status: String,
}

impl CheckResponse {
    /// HTTP status and body for each outcome shape.
    pub fn from_outcome(outcome: RunOutcome) -> (StatusCode, Self) {
        let (code, response, status) = match outcome {
            RunOutcome::Completed(text) => (StatusCode::OK, text, "completed"),
            RunOutcome::Failed => (StatusCode::BAD_GATEWAY, "error".to_string(), "failed"),
            RunOutcome::TimedOut => (StatusCode::GATEWAY_TIMEOUT, "timeout".to_string(), "timeout"),
        };
        (code, Self { response, status: status.to_string() })
    }
}

/// `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self { status: StatusCode::FORBIDDEN, message: message.into() }
    }

    pub fn internal() -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: "Internal server error".to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
