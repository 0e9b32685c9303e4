use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{OcrError, Result};

/// Bytes downloaded from a URL plus the declared content type, if any.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// HTTP collaborator used for URL-sourced images.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedImage>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Downloads larger than `max_bytes` are abandoned with a fetch error.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("ocr-service/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            max_bytes,
        }
    }

    fn too_large(&self, url: &Url) -> OcrError {
        OcrError::Fetch(format!(
            "Image at {url} exceeds the {} byte download limit",
            self.max_bytes
        ))
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedImage> {
        let mut response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OcrError::Fetch(format!(
                "HTTP error {} from {}",
                response.status(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(self.too_large(url));
        }

        // Content-Length may be absent or wrong, so the cap is enforced while streaming
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(url = %url, size = bytes.len(), "Fetched image");
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}
