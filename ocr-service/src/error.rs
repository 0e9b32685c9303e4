use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt image: {0}")]
    CorruptImage(String),

    #[error("Failed to fetch image: {0}")]
    Fetch(String),

    #[error("Failed to load OCR engine: {0}")]
    EngineLoad(String),

    #[error("OCR inference failed: {0}")]
    EngineInference(String),

    #[error("Batch size exceeds limit: {size} > {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Stable machine-readable tag reported as `error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            OcrError::InvalidRequest(_) => "invalid_request",
            OcrError::FileNotFound(_) => "file_not_found",
            OcrError::UnsupportedFormat(_) => "unsupported_format",
            OcrError::CorruptImage(_) => "corrupt_image",
            OcrError::Fetch(_) => "fetch_error",
            OcrError::EngineLoad(_) => "engine_load_error",
            OcrError::EngineInference(_) => "engine_inference_error",
            OcrError::BatchTooLarge { .. } => "batch_too_large",
            OcrError::Internal(_) => "internal_error",
        }
    }

    /// Client-caused errors map to 4xx, engine and transport errors to 5xx.
    pub fn status(&self) -> StatusCode {
        match self {
            OcrError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OcrError::FileNotFound(_) => StatusCode::NOT_FOUND,
            OcrError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            OcrError::CorruptImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OcrError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            OcrError::Fetch(_) => StatusCode::BAD_GATEWAY,
            OcrError::EngineLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            OcrError::EngineInference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OcrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl From<std::io::Error> for OcrError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => OcrError::FileNotFound(err.to_string()),
            _ => OcrError::Internal(format!("IO error: {err}")),
        }
    }
}

impl From<reqwest::Error> for OcrError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OcrError::Fetch(format!("Request timed out: {err}"))
        } else {
            OcrError::Fetch(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
