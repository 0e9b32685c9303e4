#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use image::{DynamicImage, GenericImageView, ImageFormat};

use ocr_service::api::{create_router, AppState};
use ocr_service::config::Config;
use ocr_service::error::{OcrError, Result};
use ocr_service::ocr::{
    Device, EngineFactory, EngineOptions, ModelManager, OcrEngine, RawDetection, ServiceStats,
};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Reports one detection per 100px of image height, reading "line N".
pub struct LineEngine {
    language: String,
    delay: Duration,
}

impl OcrEngine for LineEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let (w, h) = image.dimensions();
        let lines = h / 100;
        Ok((0..lines)
            .map(|i| {
                let top = (i * 100) as f32;
                RawDetection::new(
                    format!("{} line {}", self.language, i + 1),
                    0.9,
                    vec![[0.0, top], [w as f32, top], [w as f32, top + 100.0], [0.0, top + 100.0]],
                )
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub builds: AtomicUsize,
    pub inference_delay: Duration,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inference_delay(mut self, delay: Duration) -> Self {
        self.inference_delay = delay;
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl EngineFactory for FakeFactory {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn gpu_available(&self) -> bool {
        false
    }

    fn create(
        &self,
        language: &str,
        _device: Device,
        _options: &EngineOptions,
    ) -> Result<Arc<dyn OcrEngine>> {
        if language == "missing" {
            return Err(OcrError::EngineLoad("weights not found".to_string()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(LineEngine {
            language: language.to_string(),
            delay: self.inference_delay,
        }))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.performance.max_batch_size = 3;
    config.performance.fetch_timeout_secs = 2;
    config.performance.preload_models = vec![];
    config.ocr.default_lang = "ch".to_string();
    config.ocr.use_gpu = false;
    config
}

pub fn app_with(config: Config, factory: Arc<FakeFactory>) -> (Router, AppState) {
    init_test_logger();
    let models = Arc::new(ModelManager::new(
        factory,
        &config.ocr,
        Arc::new(ServiceStats::new()),
    ));
    let state = AppState::new(config, models);
    (create_router(state.clone()), state)
}

pub fn test_app() -> (Router, AppState) {
    app_with(test_config(), Arc::new(FakeFactory::new()))
}

pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgb8(width, height);
    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .expect("encode png");
    output
}

pub const BOUNDARY: &str = "ocr-test-boundary";

pub struct Part {
    name: String,
    filename: Option<String>,
    data: Vec<u8>,
}

pub fn file_part(name: &str, filename: &str, data: &[u8]) -> Part {
    Part {
        name: name.to_string(),
        filename: Some(filename.to_string()),
        data: data.to_vec(),
    }
}

pub fn text_part(name: &str, value: &str) -> Part {
    Part {
        name: name.to_string(),
        filename: None,
        data: value.as_bytes().to_vec(),
    }
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match &part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                part.name
            ),
            None => format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                part.name
            ),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("build request")
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

// Re-export commonly used crates for convenience
pub use serial_test::serial;
pub use tempfile;
pub use wiremock;
