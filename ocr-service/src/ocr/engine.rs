use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{OcrError, Result};

/// Inference device an engine is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    pub fn from_use_gpu(use_gpu: bool) -> Self {
        if use_gpu {
            Device::Gpu
        } else {
            Device::Cpu
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu => write!(f, "gpu"),
        }
    }
}

/// One raw detection as produced by an engine, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub text: String,
    pub score: f32,
    pub polygon: Vec<[f32; 2]>,
}

impl RawDetection {
    pub fn new(text: impl Into<String>, score: f32, polygon: Vec<[f32; 2]>) -> Self {
        Self {
            text: text.into(),
            score,
            polygon,
        }
    }
}

/// Options passed to engine construction.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub use_textline_orientation: bool,
    pub model_dir: Option<PathBuf>,
}

/// A loaded recognizer. Implementations must tolerate concurrent calls,
/// serializing internally if the underlying library requires it.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>>;
}

/// Builds engines for a (language, device) pair.
pub trait EngineFactory: Send + Sync {
    /// Backend identifier reported by the introspection endpoints.
    fn name(&self) -> &'static str;

    fn gpu_available(&self) -> bool;

    /// Construct an engine. May block for a long time (model download,
    /// weight loading); callers run it off the async executor.
    fn create(
        &self,
        language: &str,
        device: Device,
        options: &EngineOptions,
    ) -> Result<Arc<dyn OcrEngine>>;
}

/// Factory used when no OCR backend is compiled in.
pub struct UnavailableEngineFactory;

impl EngineFactory for UnavailableEngineFactory {
    fn name(&self) -> &'static str {
        "unavailable"
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
        Err(OcrError::EngineLoad(format!(
            "No OCR backend compiled in; cannot load model for '{language}'"
        )))
    }
}

/// The factory for the backend selected at compile time.
pub fn default_factory() -> Arc<dyn EngineFactory> {
    #[cfg(feature = "tesseract")]
    {
        Arc::new(super::tesseract::TesseractFactory)
    }

    #[cfg(not(feature = "tesseract"))]
    {
        Arc::new(UnavailableEngineFactory)
    }
}
