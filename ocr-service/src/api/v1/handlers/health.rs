use axum::extract::State;

use crate::api::state::AppState;
use crate::api::v1::dto::{EndpointInfo, HealthData, InfoData};
use crate::api::v1::response::ApiResponse;

/// `GET /api/v1/health`
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    ApiResponse::success(HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.models.backend_name().to_string(),
        gpu_available: state.models.gpu_available(),
        uptime: state.models.stats().uptime_secs(),
    })
}

/// `GET /api/v1/info`
#[utoipa::path(
    get,
    path = "/api/v1/info",
    tag = "health",
    responses(
        (status = 200, description = "Service capabilities", body = InfoData),
    )
)]
pub async fn service_info(State(state): State<AppState>) -> ApiResponse<InfoData> {
    let config = &state.config;

    ApiResponse::success(InfoData {
        name: "ocr-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: env!("CARGO_PKG_DESCRIPTION").to_string(),
        status: "running".to_string(),
        backend: state.models.backend_name().to_string(),
        default_lang: config.ocr.default_lang.clone(),
        supported_languages: config.ocr.supported_languages.clone(),
        supported_formats: config.ocr.supported_formats.clone(),
        max_image_size: config.ocr.max_image_size,
        max_batch_size: config.performance.max_batch_size,
        api_endpoints: vec![
            EndpointInfo::new("GET", "/api/v1/health", "Health check"),
            EndpointInfo::new("GET", "/api/v1/info", "Service information"),
            EndpointInfo::new("POST", "/api/v1/ocr/file", "Recognize an uploaded image"),
            EndpointInfo::new("POST", "/api/v1/ocr/url", "Recognize an image fetched from a URL"),
            EndpointInfo::new("POST", "/api/v1/ocr/base64", "Recognize a base64 encoded image"),
            EndpointInfo::new("POST", "/api/v1/ocr/batch", "Recognize several images"),
            EndpointInfo::new("GET", "/api/v1/models", "Loaded models"),
            EndpointInfo::new("GET", "/api/v1/stats", "Request statistics"),
            EndpointInfo::new("GET", "/api/v1/openapi.json", "OpenAPI document"),
            EndpointInfo::new("GET", "/api/v1/docs", "API documentation"),
        ],
    })
}
