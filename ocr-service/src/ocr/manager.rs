//! Lazily constructed, shared OCR engines keyed by language and device.
//!
//! The cache map is only locked long enough to find or insert a slot. Each
//! slot is a `OnceCell`, so construction for one key is single-flight while
//! different languages can load in parallel. Inference never runs under any
//! manager lock; callers get a cloned [`EngineHandle`] and use it directly.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::OcrConfig;
use crate::error::{OcrError, Result};

use super::engine::{Device, EngineFactory, EngineOptions, OcrEngine};
use super::stats::{ServiceStats, StatsSnapshot};

/// A constructed engine bound to one (language, device) pair.
#[derive(Clone)]
pub struct EngineHandle {
    pub language: String,
    pub device: Device,
    pub engine: Arc<dyn OcrEngine>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("language", &self.language)
            .field("device", &self.device)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LoadedModel {
    pub key: String,
    pub language: String,
    pub device: Device,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ModelInfo {
    pub backend: String,
    pub loaded_models: Vec<String>,
    pub models: Vec<LoadedModel>,
    pub stats: StatsSnapshot,
}

type Slot = Arc<OnceCell<EngineHandle>>;

pub struct ModelManager {
    factory: Arc<dyn EngineFactory>,
    options: EngineOptions,
    gpu_fallback: bool,
    models: RwLock<HashMap<String, Slot>>,
    stats: Arc<ServiceStats>,
}

impl ModelManager {
    pub fn new(factory: Arc<dyn EngineFactory>, config: &OcrConfig, stats: Arc<ServiceStats>) -> Self {
        Self {
            factory,
            options: EngineOptions {
                use_textline_orientation: config.use_textline_orientation,
                model_dir: config.model_dir.as_ref().map(PathBuf::from),
            },
            gpu_fallback: config.gpu_fallback,
            models: RwLock::new(HashMap::new()),
            stats,
        }
    }

    pub fn cache_key(language: &str, device: Device) -> String {
        format!("{language}_{device}")
    }

    pub fn backend_name(&self) -> &'static str {
        self.factory.name()
    }

    pub fn gpu_available(&self) -> bool {
        self.factory.gpu_available()
    }

    pub fn stats(&self) -> &Arc<ServiceStats> {
        &self.stats
    }

    /// Pick the device an engine will actually be built for.
    pub fn resolve_device(&self, requested: Device) -> Result<Device> {
        match requested {
            Device::Cpu => Ok(Device::Cpu),
            Device::Gpu if self.factory.gpu_available() => Ok(Device::Gpu),
            Device::Gpu if self.gpu_fallback => {
                warn!("GPU requested but not available, falling back to CPU");
                Ok(Device::Cpu)
            }
            Device::Gpu => Err(OcrError::EngineLoad(
                "GPU requested but not available and CPU fallback is disabled".to_string(),
            )),
        }
    }

    /// Return the engine for `(language, device)`, constructing it on first use.
    ///
    /// Construction runs in its own task that owns the slot, so a requester
    /// dropped mid-load leaves the init permit held until the build finishes.
    pub async fn get(&self, language: &str, device: Device) -> Result<EngineHandle> {
        let device = self.resolve_device(device)?;
        let key = Self::cache_key(language, device);
        let slot = self.slot(&key);

        if let Some(handle) = slot.get() {
            return Ok(handle.clone());
        }

        let loader = Loader {
            factory: Arc::clone(&self.factory),
            options: self.options.clone(),
            stats: Arc::clone(&self.stats),
            language: language.to_string(),
            device,
            key,
        };
        tokio::spawn(async move {
            slot.get_or_try_init(|| loader.build())
                .await
                .map(EngineHandle::clone)
        })
        .await
        .map_err(|e| OcrError::EngineLoad(format!("Model load task failed: {e}")))?
    }

    fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(slot);
        }

        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            models
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    /// Eagerly load `languages`. Failures are logged and skipped.
    /// Returns the number of languages that loaded successfully.
    pub async fn preload(&self, languages: &[String], device: Device) -> usize {
        info!(languages = ?languages, "Preloading OCR models");
        let mut loaded = 0;

        for lang in languages {
            match self.get(lang, device).await {
                Ok(_) => {
                    loaded += 1;
                    info!(lang = %lang, "Model preloaded");
                }
                Err(e) => error!(lang = %lang, error = %e, "Model preload failed"),
            }
        }

        info!(loaded, requested = languages.len(), "Model preload finished");
        loaded
    }

    pub fn loaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn info(&self) -> ModelInfo {
        let mut models: Vec<LoadedModel> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(key, slot)| {
                slot.get().map(|handle| LoadedModel {
                    key: key.clone(),
                    language: handle.language.clone(),
                    device: handle.device,
                    created_at: handle.created_at,
                })
            })
            .collect();
        models.sort_by(|a, b| a.key.cmp(&b.key));

        ModelInfo {
            backend: self.factory.name().to_string(),
            loaded_models: models.iter().map(|m| m.key.clone()).collect(),
            models,
            stats: self.stats.snapshot(),
        }
    }
}

/// Everything a detached model build needs.
struct Loader {
    factory: Arc<dyn EngineFactory>,
    options: EngineOptions,
    stats: Arc<ServiceStats>,
    language: String,
    device: Device,
    key: String,
}

impl Loader {
    async fn build(&self) -> Result<EngineHandle> {
        info!(key = %self.key, backend = self.factory.name(), "Loading OCR model");
        let start = Instant::now();

        let factory = Arc::clone(&self.factory);
        let options = self.options.clone();
        let lang = self.language.clone();
        let device = self.device;
        let engine = tokio::task::spawn_blocking(move || factory.create(&lang, device, &options))
            .await
            .map_err(|e| OcrError::EngineLoad(format!("Model construction task failed: {e}")))??;

        self.stats.record_model_loaded();
        info!(
            key = %self.key,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "OCR model loaded"
        );

        Ok(EngineHandle {
            language: self.language.clone(),
            device,
            engine,
            created_at: Utc::now(),
        })
    }
}
