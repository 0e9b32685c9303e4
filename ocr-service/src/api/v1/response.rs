//! # V1 API Response Envelope
//!
//! Every v1 endpoint returns an [`ApiResponse<T>`]:
//!
//! ```json
//! {
//!   "success": true,
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "data": { ... },               // present on success
//!   "error": "Corrupt image: ...", // present on failure
//!   "error_type": "corrupt_image"  // present on failure
//! }
//! ```
//!
//! The HTTP status comes from [`OcrError::status`] on failure and is 200 on
//! success.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::OcrError;

/// Error body documented in the OpenAPI schema.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ApiError {
    pub success: bool,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
    /// Human-readable description.
    pub error: String,
    /// Stable machine-readable tag, e.g. `fetch_error`.
    pub error_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// HTTP status to use in the response. Not serialized on the wire.
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            timestamp: Utc::now(),
            data: Some(data),
            error: None,
            error_type: None,
            status: StatusCode::OK,
        }
    }

    pub fn error(err: &OcrError) -> Self {
        Self {
            success: false,
            timestamp: Utc::now(),
            data: None,
            error: Some(err.to_string()),
            error_type: Some(err.error_type().to_string()),
            status: err.status(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        match serde_json::to_value(&self) {
            Ok(body) => (status, Json(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                let body = serde_json::json!({
                    "success": false,
                    "timestamp": Utc::now(),
                    "error": "Failed to serialize response",
                    "error_type": "internal_error"
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl<T: Serialize> From<OcrError> for ApiResponse<T> {
    fn from(err: OcrError) -> Self {
        if !err.is_client_error() {
            tracing::error!(error = %err, error_type = err.error_type(), "Request failed");
        }
        ApiResponse::error(&err)
    }
}

impl<T: Serialize> From<crate::error::Result<T>> for ApiResponse<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => ApiResponse::success(data),
            Err(err) => err.into(),
        }
    }
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}
