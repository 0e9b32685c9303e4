use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::engine::RawDetection;

pub const NO_TEXT_FOUND: &str = "No text found";

/// One recognized text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TextDetection {
    pub text: String,
    /// Engine confidence in `[0, 1]`.
    pub confidence: f32,
    /// Polygon corners in pixel coordinates of the normalized image.
    #[schema(value_type = Vec<Vec<f32>>)]
    pub bbox: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecognitionResult {
    pub success: bool,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
    pub lang: String,
    /// Detection texts joined in engine order.
    pub text: String,
    pub word_count: usize,
    pub avg_confidence: f32,
    pub details: Vec<TextDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
    pub processing_time_ms: u64,
}

impl RecognitionResult {
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    pub fn with_processing_time(mut self, elapsed: std::time::Duration) -> Self {
        self.processing_time_ms = elapsed.as_millis() as u64;
        self
    }
}

/// Turn raw engine output into a [`RecognitionResult`].
///
/// A detection with a non-finite score means the engine output cannot be
/// trusted; the whole result is then reported as empty.
pub fn format(raw: &[RawDetection], lang: &str) -> RecognitionResult {
    let details: Vec<TextDetection> = if raw.iter().any(|d| !d.score.is_finite()) {
        tracing::warn!(lang = %lang, "Discarding malformed engine output");
        Vec::new()
    } else {
        raw.iter()
            .map(|d| TextDetection {
                text: d.text.clone(),
                confidence: d.score.clamp(0.0, 1.0),
                bbox: d.polygon.clone(),
            })
            .collect()
    };

    let avg_confidence = if details.is_empty() {
        0.0
    } else {
        details.iter().map(|d| d.confidence).sum::<f32>() / details.len() as f32
    };

    let text = details
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    RecognitionResult {
        success: true,
        timestamp: Utc::now(),
        lang: lang.to_string(),
        text,
        word_count: details.len(),
        avg_confidence,
        message: details.is_empty().then(|| NO_TEXT_FOUND.to_string()),
        details,
        image_width: 0,
        image_height: 0,
        processing_time_ms: 0,
    }
}
