use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::AppJson;
use crate::api::state::AppState;
use crate::api::v1::dto::{Base64OcrRequest, BatchOcrRequest, UrlOcrRequest};
use crate::api::v1::response::{ApiError, ApiResponse};
use crate::error::{OcrError, Result};
use crate::ocr::{RecognitionResult, SourceFormat};
use crate::services::{BatchImage, BatchResult};

fn parse_form_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Log the outcome of a request and wrap it in the envelope.
fn respond<T: serde::Serialize>(request_id: Uuid, result: Result<T>) -> ApiResponse<T> {
    match &result {
        Ok(_) => info!(request_id = %request_id, "OCR request succeeded"),
        Err(e) => info!(
            request_id = %request_id,
            error_type = e.error_type(),
            "OCR request failed"
        ),
    }
    result.into()
}

/// Uploaded file plus the form fields that accompany it.
#[derive(Default)]
struct UploadForm {
    files: Vec<(Vec<u8>, SourceFormat)>,
    lang: Option<String>,
    use_gpu: Option<bool>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" | "files" => {
                let named = field.file_name().is_some_and(|n| !n.trim().is_empty());
                let source = field
                    .file_name()
                    .map(SourceFormat::from_filename)
                    .unwrap_or_default()
                    .with_content_type(field.content_type());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| OcrError::InvalidRequest(format!("Failed to read file: {e}")))?;
                // Browsers submit an unnamed, empty part for an untouched file input
                if !named && bytes.is_empty() {
                    return Err(OcrError::InvalidRequest("No file selected".to_string()));
                }
                form.files.push((bytes.to_vec(), source));
            }
            "lang" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| OcrError::InvalidRequest(format!("Invalid lang: {e}")))?;
                form.lang = Some(text);
            }
            "use_gpu" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| OcrError::InvalidRequest(format!("Invalid use_gpu: {e}")))?;
                form.use_gpu = Some(parse_form_bool(&raw).ok_or_else(|| {
                    OcrError::InvalidRequest(format!(
                        "Invalid use_gpu value '{raw}', expected true or false"
                    ))
                })?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// `POST /api/v1/ocr/file`
///
/// Multipart form with a `file` field and optional `lang` and `use_gpu`.
#[utoipa::path(
    post,
    path = "/api/v1/ocr/file",
    tag = "ocr",
    request_body(content_type = "multipart/form-data", content = String, description = "Image file with optional lang and use_gpu fields"),
    responses(
        (status = 200, description = "Recognition result", body = RecognitionResult),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 415, description = "Unsupported image format", body = ApiError),
        (status = 422, description = "Image could not be decoded", body = ApiError),
        (status = 503, description = "OCR model could not be loaded", body = ApiError),
    )
)]
pub async fn ocr_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResponse<RecognitionResult> {
    let request_id = Uuid::new_v4();

    let result = async {
        let form = read_upload_form(multipart).await?;
        if form.files.len() > 1 {
            return Err(OcrError::InvalidRequest(format!(
                "Expected one file, got {}; use /api/v1/ocr/batch for multiple images",
                form.files.len()
            )));
        }
        let (bytes, source) = form
            .files
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::InvalidRequest("No file provided".to_string()))?;

        let service = &state.recognition;
        let lang = service.language_or_default(form.lang.as_deref());
        let device = service.device_or_default(form.use_gpu);
        info!(request_id = %request_id, lang = %lang, device = %device, size = bytes.len(), "OCR file request");

        service.recognize_bytes(bytes, source, &lang, device).await
    }
    .await;

    respond(request_id, result)
}

/// `POST /api/v1/ocr/url`
#[utoipa::path(
    post,
    path = "/api/v1/ocr/url",
    tag = "ocr",
    request_body = UrlOcrRequest,
    responses(
        (status = 200, description = "Recognition result", body = RecognitionResult),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 502, description = "Image could not be fetched", body = ApiError),
    )
)]
pub async fn ocr_url(
    State(state): State<AppState>,
    AppJson(req): AppJson<UrlOcrRequest>,
) -> ApiResponse<RecognitionResult> {
    let request_id = Uuid::new_v4();

    let result = async {
        req.validate()
            .map_err(|e| OcrError::InvalidRequest(format!("Invalid URL: {e}")))?;

        let service = &state.recognition;
        let lang = service.language_or_default(req.lang.as_deref());
        let device = service.device_or_default(req.use_gpu);
        info!(request_id = %request_id, lang = %lang, device = %device, url = %req.url, "OCR url request");

        service.recognize_url(&req.url, &lang, device).await
    }
    .await;

    respond(request_id, result)
}

/// `POST /api/v1/ocr/base64`
#[utoipa::path(
    post,
    path = "/api/v1/ocr/base64",
    tag = "ocr",
    request_body = Base64OcrRequest,
    responses(
        (status = 200, description = "Recognition result", body = RecognitionResult),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 422, description = "Image could not be decoded", body = ApiError),
    )
)]
pub async fn ocr_base64(
    State(state): State<AppState>,
    AppJson(req): AppJson<Base64OcrRequest>,
) -> ApiResponse<RecognitionResult> {
    let request_id = Uuid::new_v4();

    let result = async {
        req.validate()
            .map_err(|e| OcrError::InvalidRequest(format!("Invalid image: {e}")))?;

        let service = &state.recognition;
        let lang = service.language_or_default(req.lang.as_deref());
        let device = service.device_or_default(req.use_gpu);
        info!(request_id = %request_id, lang = %lang, device = %device, "OCR base64 request");

        service
            .recognize_base64(&req.image, req.format.as_deref(), &lang, device)
            .await
    }
    .await;

    respond(request_id, result)
}

/// `POST /api/v1/ocr/batch`
///
/// Accepts either multipart (`files` fields plus `lang`, `use_gpu`) or a JSON
/// body with base64 `images`. Per-image failures are reported in their slot.
#[utoipa::path(
    post,
    path = "/api/v1/ocr/batch",
    tag = "ocr",
    request_body(content = BatchOcrRequest, description = "JSON with base64 images, or multipart with `files` fields"),
    responses(
        (status = 200, description = "Index-aligned batch results", body = BatchResult),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 413, description = "Too many images", body = ApiError),
    )
)]
pub async fn ocr_batch(State(state): State<AppState>, request: Request) -> ApiResponse<BatchResult> {
    let request_id = Uuid::new_v4();

    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let result = async {
        let (images, lang, use_gpu) = if is_multipart {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| OcrError::InvalidRequest(format!("Malformed multipart body: {e}")))?;
            let form = read_upload_form(multipart).await?;
            let images = form
                .files
                .into_iter()
                .map(|(data, source)| BatchImage::Bytes { data, source })
                .collect::<Vec<_>>();
            (images, form.lang, form.use_gpu)
        } else {
            let AppJson(req) = AppJson::<BatchOcrRequest>::from_request(request, &state).await?;
            let images = req.images.into_iter().map(BatchImage::Base64).collect();
            (images, req.lang, req.use_gpu)
        };

        let service = &state.recognition;
        let lang = service.language_or_default(lang.as_deref());
        let device = service.device_or_default(use_gpu);
        info!(
            request_id = %request_id,
            lang = %lang,
            device = %device,
            images = images.len(),
            "OCR batch request"
        );

        service.recognize_batch(images, &lang, device).await
    }
    .await;

    respond(request_id, result)
}
