//! OCR core: engine capability, model cache, image validation and result
//! formatting.
//!
//! # Architecture
//!
//! - `OcrEngine` / `EngineFactory` define the opaque recognition capability
//! - `ModelManager` lazily builds one engine per `(language, device)` key
//! - `ImageValidator` checks the format allow-list, decodes and downscales
//! - `format` turns raw detections into a `RecognitionResult`
//! - `ServiceStats` holds the request and model counters
//!
//! Backends are selected at compile time. With the `tesseract` feature the
//! default factory builds Tesseract engines; without it every model load
//! fails with an engine load error.
//!
//! # Usage
//!
//! ```rust,ignore
//! let manager = ModelManager::new(default_factory(), &config.ocr, stats);
//! let handle = manager.get("en", Device::Cpu).await?;
//! let raw = handle.engine.recognize(&image)?;
//! let result = format(&raw, "en");
//! ```

mod engine;
mod formatter;
mod manager;
mod stats;
#[cfg(feature = "tesseract")]
mod tesseract;
mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{
    default_factory, Device, EngineFactory, EngineOptions, OcrEngine, RawDetection,
    UnavailableEngineFactory,
};
pub use formatter::{format, RecognitionResult, TextDetection, NO_TEXT_FOUND};
pub use manager::{EngineHandle, LoadedModel, ModelInfo, ModelManager};
pub use stats::{ServiceStats, StatsSnapshot};
#[cfg(feature = "tesseract")]
pub use tesseract::{tessdata_language, TesseractFactory};
pub use validator::{ImageValidator, NormalizedImage, SourceFormat};
