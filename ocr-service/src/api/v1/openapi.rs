use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;
use crate::ocr;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OCR Service API",
        version = "1.0.0",
        description = "Text recognition over HTTP: file upload, URL, base64 and batch input.",
    ),
    paths(
        handlers::health::health_check,
        handlers::health::service_info,
        handlers::ocr::ocr_file,
        handlers::ocr::ocr_url,
        handlers::ocr::ocr_base64,
        handlers::ocr::ocr_batch,
        handlers::models::list_models,
        handlers::models::get_stats,
    ),
    components(schemas(
        response::ApiError,
        dto::UrlOcrRequest,
        dto::Base64OcrRequest,
        dto::BatchOcrRequest,
        dto::HealthData,
        dto::InfoData,
        dto::EndpointInfo,
        ocr::RecognitionResult,
        ocr::TextDetection,
        ocr::Device,
        ocr::ModelInfo,
        ocr::LoadedModel,
        ocr::StatsSnapshot,
        services::BatchResult,
        services::BatchItemResult,
        services::BatchItemError,
    )),
    tags(
        (name = "health", description = "Health check and service information"),
        (name = "ocr", description = "Text recognition"),
        (name = "models", description = "Model cache and request statistics"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
