use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::{OcrError, Result};
use crate::ocr::{
    format, Device, ImageValidator, ModelManager, NormalizedImage, RecognitionResult,
    ServiceStats, SourceFormat,
};

use super::fetch::{HttpFetcher, ImageFetcher};

/// One image of a batch request, as received.
#[derive(Debug, Clone)]
pub enum BatchImage {
    Bytes { data: Vec<u8>, source: SourceFormat },
    Base64(String),
}

/// Error recorded in a batch slot in place of a result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchItemError {
    pub success: bool,
    pub index: usize,
    pub error: String,
    pub error_type: String,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum BatchItemResult {
    Success(RecognitionResult),
    Failure(BatchItemError),
}

impl BatchItemResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchItemResult::Success(_))
    }
}

/// Per-image outcomes, index-aligned with the request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

/// Coordinates input acquisition, validation, engine lookup, inference and
/// formatting. Every public recognition call counts as one request per image
/// in [`ServiceStats`].
#[derive(Clone)]
pub struct RecognitionService {
    models: Arc<ModelManager>,
    validator: ImageValidator,
    stats: Arc<ServiceStats>,
    fetcher: Arc<dyn ImageFetcher>,
    default_lang: String,
    default_device: Device,
    max_batch_size: usize,
    request_timeout: Duration,
    fetch_timeout: Duration,
}

impl RecognitionService {
    pub fn new(config: &Config, models: Arc<ModelManager>) -> Self {
        Self {
            stats: Arc::clone(models.stats()),
            models,
            validator: ImageValidator::from_config(config),
            fetcher: Arc::new(HttpFetcher::new(config.server.max_content_length)),
            default_lang: config.ocr.default_lang.clone(),
            default_device: Device::from_use_gpu(config.ocr.use_gpu),
            max_batch_size: config.performance.max_batch_size,
            request_timeout: Duration::from_secs(config.performance.request_timeout_secs),
            fetch_timeout: Duration::from_secs(config.performance.fetch_timeout_secs),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn stats(&self) -> &Arc<ServiceStats> {
        &self.stats
    }

    /// Requested language, or the configured default when absent or blank.
    pub fn language_or_default(&self, lang: Option<&str>) -> String {
        lang.map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_lang)
            .to_string()
    }

    pub fn device_or_default(&self, use_gpu: Option<bool>) -> Device {
        use_gpu.map(Device::from_use_gpu).unwrap_or(self.default_device)
    }

    pub async fn recognize_file(
        &self,
        path: &Path,
        lang: &str,
        device: Device,
    ) -> Result<RecognitionResult> {
        self.tracked(lang, async {
            let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::FileNotFound(path.display().to_string()),
                _ => OcrError::from(e),
            })?;
            self.process_bytes(bytes, SourceFormat::from_path(path), lang, device)
                .await
        })
        .await
    }

    pub async fn recognize_url(
        &self,
        url: &str,
        lang: &str,
        device: Device,
    ) -> Result<RecognitionResult> {
        self.tracked(lang, async {
            let url = parse_image_url(url)?;
            let fetched = self.fetcher.fetch(&url, self.fetch_timeout).await?;

            let mut source = SourceFormat::from_path(Path::new(url.path()))
                .with_content_type(fetched.content_type.as_deref());
            // Paths like /render.php carry no usable extension
            let unusable_ext = source
                .extension
                .as_deref()
                .is_some_and(|ext| !self.validator.is_allowed(ext));
            if unusable_ext && source.content_type.is_some() {
                source.extension = None;
            }

            self.process_bytes(fetched.bytes, source, lang, device).await
        })
        .await
    }

    pub async fn recognize_bytes(
        &self,
        bytes: Vec<u8>,
        source: SourceFormat,
        lang: &str,
        device: Device,
    ) -> Result<RecognitionResult> {
        self.tracked(lang, self.process_bytes(bytes, source, lang, device))
            .await
    }

    pub async fn recognize_base64(
        &self,
        data: &str,
        format: Option<&str>,
        lang: &str,
        device: Device,
    ) -> Result<RecognitionResult> {
        self.tracked(lang, async {
            let (bytes, source) = decode_base64_image(data, format)?;
            self.process_bytes(bytes, source, lang, device).await
        })
        .await
    }

    /// Process every image independently. Fails as a whole only when the
    /// batch is empty or larger than `max_batch_size`, before any image is
    /// touched.
    pub async fn recognize_batch(
        &self,
        images: Vec<BatchImage>,
        lang: &str,
        device: Device,
    ) -> Result<BatchResult> {
        if images.is_empty() {
            return Err(OcrError::InvalidRequest("No images provided".to_string()));
        }
        if images.len() > self.max_batch_size {
            return Err(OcrError::BatchTooLarge {
                size: images.len(),
                max: self.max_batch_size,
            });
        }

        info!(lang = %lang, size = images.len(), "Processing batch");

        let futures = images.into_iter().map(|image| {
            self.tracked(lang, async move {
                match image {
                    BatchImage::Bytes { data, source } => {
                        self.process_bytes(data, source, lang, device).await
                    }
                    BatchImage::Base64(encoded) => {
                        let (bytes, source) = decode_base64_image(&encoded, None)?;
                        self.process_bytes(bytes, source, lang, device).await
                    }
                }
            })
        });

        // join_all yields outputs in input order regardless of completion order
        let results: Vec<BatchItemResult> = futures::future::join_all(futures)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| match outcome {
                Ok(result) => BatchItemResult::Success(result),
                Err(e) => BatchItemResult::Failure(BatchItemError {
                    success: false,
                    index,
                    error: e.to_string(),
                    error_type: e.error_type().to_string(),
                    timestamp: Utc::now(),
                }),
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let total = results.len();
        info!(lang = %lang, total, succeeded, "Batch finished");

        Ok(BatchResult {
            total,
            succeeded,
            failed: total - succeeded,
            results,
        })
    }

    /// Count one request and exactly one outcome for `work`.
    async fn tracked<F>(&self, lang: &str, work: F) -> Result<RecognitionResult>
    where
        F: Future<Output = Result<RecognitionResult>>,
    {
        self.stats.record_request();
        match work.await {
            Ok(result) => {
                self.stats.record_success();
                Ok(result)
            }
            Err(e) => {
                self.stats.record_failure();
                if e.is_client_error() {
                    warn!(lang = %lang, error_type = e.error_type(), error = %e, "OCR request rejected");
                } else {
                    error!(lang = %lang, error_type = e.error_type(), error = ?e, "OCR request failed");
                }
                Err(e)
            }
        }
    }

    async fn process_bytes(
        &self,
        bytes: Vec<u8>,
        source: SourceFormat,
        lang: &str,
        device: Device,
    ) -> Result<RecognitionResult> {
        let start = Instant::now();

        let validator = self.validator.clone();
        let normalized: NormalizedImage =
            tokio::task::spawn_blocking(move || validator.validate_and_normalize(&bytes, &source))
                .await
                .map_err(|e| OcrError::Internal(format!("Image validation task failed: {e}")))??;

        if normalized.was_resized() {
            debug!(
                from_width = normalized.original_width,
                from_height = normalized.original_height,
                width = normalized.width,
                height = normalized.height,
                "Image downscaled"
            );
        }

        let handle = self.models.get(lang, device).await?;

        let engine = Arc::clone(&handle.engine);
        let (width, height) = (normalized.width, normalized.height);
        let image = normalized.image;
        let inference = tokio::task::spawn_blocking(move || engine.recognize(&image));

        let raw = match tokio::time::timeout(self.request_timeout, inference).await {
            Ok(joined) => joined
                .map_err(|e| OcrError::Internal(format!("Inference task failed: {e}")))??,
            Err(_) => {
                return Err(OcrError::EngineInference(format!(
                    "Inference timed out after {} seconds",
                    self.request_timeout.as_secs()
                )))
            }
        };

        let result = format(&raw, lang)
            .with_image_size(width, height)
            .with_processing_time(start.elapsed());

        info!(
            lang = %lang,
            device = %handle.device,
            detections = result.details.len(),
            elapsed_ms = result.processing_time_ms,
            "OCR completed"
        );
        Ok(result)
    }
}

/// Only absolute http(s) URLs are fetched.
pub fn parse_image_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| OcrError::InvalidRequest(format!("Invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(OcrError::InvalidRequest(format!(
            "Unsupported URL scheme '{scheme}', expected http or https"
        ))),
    }
}

/// Decode a base64 image, accepting an optional `data:<mime>;base64,` prefix.
/// An explicit `format` wins over the data URL's mime type.
pub fn decode_base64_image(data: &str, format: Option<&str>) -> Result<(Vec<u8>, SourceFormat)> {
    let data = data.trim();
    let (mime, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                OcrError::InvalidRequest("Malformed data URL: missing ','".to_string())
            })?;
            let mime = header.strip_suffix(";base64").ok_or_else(|| {
                OcrError::InvalidRequest("Data URL is not base64 encoded".to_string())
            })?;
            (Some(mime), payload)
        }
        None => (None, data),
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| OcrError::InvalidRequest(format!("Invalid base64 image data: {e}")))?;

    let source = match format.map(str::trim).filter(|f| !f.is_empty()) {
        Some(ext) => SourceFormat {
            extension: Some(ext.trim_start_matches('.').to_lowercase()),
            content_type: None,
        },
        None => SourceFormat::unknown().with_content_type(mime),
    };

    Ok((bytes, source))
}
