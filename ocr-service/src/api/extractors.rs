use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::OcrError;

/// `axum::Json` with rejections reported through the API envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(OcrError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for OcrError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> OcrError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                OcrError::InvalidRequest(format!("Missing required field: {field}"))
            } else {
                OcrError::InvalidRequest(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            OcrError::InvalidRequest(format!("JSON syntax error: {err}"))
        }
        JsonRejection::MissingJsonContentType(_) => OcrError::InvalidRequest(
            "Missing `Content-Type: application/json` header".to_string(),
        ),
        JsonRejection::BytesRejection(err) => {
            OcrError::InvalidRequest(format!("Failed to read request body: {err}"))
        }
        _ => OcrError::InvalidRequest(rejection.to_string()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}
