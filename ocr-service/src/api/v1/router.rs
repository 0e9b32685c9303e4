use axum::{
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;

pub fn v1_router() -> Router<AppState> {
    let ocr = Router::new()
        .route("/file", post(handlers::ocr::ocr_file))
        .route("/url", post(handlers::ocr::ocr_url))
        .route("/base64", post(handlers::ocr::ocr_base64))
        .route("/batch", post(handlers::ocr::ocr_batch));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/info", get(handlers::service_info))
        .route("/models", get(handlers::models::list_models))
        .route("/stats", get(handlers::models::get_stats))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .nest("/ocr", ocr)
        .merge(super::openapi::redoc_router())
}
