//! In-process engine doubles for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GenericImageView};

use crate::error::{OcrError, Result};

use super::engine::{Device, EngineFactory, EngineOptions, OcrEngine, RawDetection};

/// Returns a fixed line per call; fails on images narrower than 2px.
pub struct StubEngine {
    pub language: String,
}

impl OcrEngine for StubEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let (w, h) = image.dimensions();
        if w < 2 {
            return Err(OcrError::EngineInference("image too narrow".into()));
        }
        let (w, h) = (w as f32, h as f32);
        Ok(vec![
            RawDetection::new(
                format!("hello {}", self.language),
                0.9,
                vec![[0.0, 0.0], [w, 0.0], [w, h / 2.0], [0.0, h / 2.0]],
            ),
            RawDetection::new(
                "world",
                0.7,
                vec![[0.0, h / 2.0], [w, h / 2.0], [w, h], [0.0, h]],
            ),
        ])
    }
}

#[derive(Default)]
pub struct StubFactory {
    gpu: bool,
    delay: Duration,
    failing: HashSet<String>,
    attempts: AtomicUsize,
    builds: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gpu(mut self) -> Self {
        self.gpu = true;
        self
    }

    pub fn with_build_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn failing_for(mut self, language: &str) -> Self {
        self.failing.insert(language.to_string());
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Peak number of `create` calls running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl EngineFactory for StubFactory {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn gpu_available(&self) -> bool {
        self.gpu
    }

    fn create(
        &self,
        language: &str,
        _device: Device,
        _options: &EngineOptions,
    ) -> Result<Arc<dyn OcrEngine>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(language) {
            return Err(OcrError::EngineLoad(format!("no weights for '{language}'")));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubEngine {
            language: language.to_string(),
        }))
    }
}
