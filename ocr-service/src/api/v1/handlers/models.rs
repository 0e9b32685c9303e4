use axum::extract::State;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;
use crate::ocr::{ModelInfo, StatsSnapshot};

/// `GET /api/v1/models`
#[utoipa::path(
    get,
    path = "/api/v1/models",
    tag = "models",
    responses(
        (status = 200, description = "Loaded models and counters", body = ModelInfo),
    )
)]
pub async fn list_models(State(state): State<AppState>) -> ApiResponse<ModelInfo> {
    ApiResponse::success(state.models.info())
}

/// `GET /api/v1/stats`
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "models",
    responses(
        (status = 200, description = "Request statistics", body = StatsSnapshot),
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> ApiResponse<StatsSnapshot> {
    ApiResponse::success(state.models.stats().snapshot())
}
