//! Uniform response body:
//!
//! ```json
//! { "success": true, "message": "Dog found", "data": { ... } }
//! { "success": true, "message": "All Dog's fetched successfully", "count": 2, "page": 1, "data": [ ... ] }
//! { "success": false, "message": "Internal server error", "error": "Dog validation failed: ..." }
//! ```
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok(message: &'static str, data: Value) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message,
            count: None,
            page: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn created(message: &'static str, data: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }

    pub fn list(message: &'static str, page: u64, items: Vec<Value>) -> Self {
        Self {
            count: Some(items.len()),
            page: Some(page),
            ..Self::ok(message, Value::Array(items))
        }
    }

    pub fn message(message: &'static str) -> Self {
        Self {
            data: None,
            ..Self::ok(message, Value::Null)
        }
    }

    pub fn failure(status: StatusCode, message: &'static str, error: Option<String>) -> Self {
        Self {
            status,
            success: false,
            message,
            count: None,
            page: None,
            data: None,
            error,
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
