use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Body of `POST /api/v1/ocr/url`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UrlOcrRequest {
    /// Absolute http(s) URL of the image.
    #[validate(url, length(max = 2048))]
    pub url: String,
    /// Language code, defaults to the configured default language.
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub use_gpu: Option<bool>,
}

/// Body of `POST /api/v1/ocr/base64`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct Base64OcrRequest {
    /// Base64 image data, optionally as a `data:<mime>;base64,` URL.
    #[validate(length(min = 1))]
    pub image: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub use_gpu: Option<bool>,
    /// Image format hint such as `png`; sniffed from the data when absent.
    #[serde(default)]
    pub format: Option<String>,
}

/// JSON body of `POST /api/v1/ocr/batch`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchOcrRequest {
    /// Base64 encoded images, processed in order.
    pub images: Vec<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub use_gpu: Option<bool>,
}
