use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{OcrError, Result};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a comma-separated env var into a list, falling back to `default`
/// when unset or empty.
fn parse_env_list(var: &str, default: &[&str]) -> Vec<String> {
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

const DEFAULT_FORMATS: &[&str] = &[".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".webp"];
const DEFAULT_LANGUAGES: &[&str] = &["ch", "en"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a request body in bytes (uploads and batch payloads).
    pub max_content_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub default_lang: String,
    pub use_textline_orientation: bool,
    pub use_gpu: bool,
    /// Build a CPU engine when a GPU was requested but none is available.
    /// When false, such requests fail with an engine load error instead.
    pub gpu_fallback: bool,
    pub max_image_size: u32,
    pub supported_formats: Vec<String>,
    pub supported_languages: Vec<String>,
    pub model_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub preload_models: Vec<String>,
    pub max_batch_size: usize,
    pub request_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("OCR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("OCR_PORT", 8000),
                max_content_length: parse_env_or("OCR_MAX_CONTENT_LENGTH", 50 * 1024 * 1024),
            },
            ocr: OcrConfig {
                default_lang: env::var("OCR_DEFAULT_LANG").unwrap_or_else(|_| "ch".to_string()),
                use_textline_orientation: parse_env_or("OCR_USE_TEXTLINE_ORIENTATION", true),
                use_gpu: parse_env_or("OCR_USE_GPU", false),
                gpu_fallback: parse_env_or("OCR_GPU_FALLBACK", true),
                max_image_size: parse_env_or("OCR_MAX_IMAGE_SIZE", 4096),
                supported_formats: parse_env_list("OCR_SUPPORTED_FORMATS", DEFAULT_FORMATS),
                supported_languages: parse_env_list("OCR_SUPPORTED_LANGUAGES", DEFAULT_LANGUAGES),
                model_dir: env::var("OCR_MODEL_DIR").ok(),
            },
            performance: PerformanceConfig {
                preload_models: parse_env_list("OCR_PRELOAD_MODELS", DEFAULT_LANGUAGES),
                max_batch_size: parse_env_or("OCR_MAX_BATCH_SIZE", 10),
                request_timeout_secs: parse_env_or("OCR_REQUEST_TIMEOUT", 60),
                fetch_timeout_secs: parse_env_or("OCR_FETCH_TIMEOUT", 30),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Load configuration with the optional file at `path` deep-merged over
    /// the env-derived defaults. A missing file is not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = Self::from_env();

        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "No config file found, using defaults and environment"
            );
            defaults.validate()?;
            return Ok(defaults);
        }

        let base = ::config::Config::try_from(&defaults)
            .map_err(|e| OcrError::Internal(format!("Failed to build default config: {e}")))?;

        let merged = ::config::Config::builder()
            .add_source(base)
            .add_source(::config::File::from(path))
            .build()
            .map_err(|e| {
                OcrError::Internal(format!(
                    "Failed to read config file {}: {e}",
                    path.display()
                ))
            })?;

        let loaded: Self = merged.try_deserialize().map_err(|e| {
            OcrError::Internal(format!("Invalid config file {}: {e}", path.display()))
        })?;

        loaded.validate()?;
        tracing::info!(path = %path.display(), "Configuration loaded from file");
        Ok(loaded)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ocr.max_image_size == 0 {
            return Err(OcrError::Internal(
                "ocr.max_image_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Allow-list entries normalized to lowercase extensions without the dot.
    pub fn normalized_formats(&self) -> Vec<String> {
        self.ocr
            .supported_formats
            .iter()
            .map(|f| f.trim().trim_start_matches('.').to_lowercase())
            .filter(|f| !f.is_empty())
            .collect()
    }
}
