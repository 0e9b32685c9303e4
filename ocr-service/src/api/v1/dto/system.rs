use serde::Serialize;
use utoipa::ToSchema;

/// Payload of `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub gpu_available: bool,
    /// Seconds since start.
    pub uptime: f64,
}

/// Payload of `GET /api/v1/info`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InfoData {
    pub name: String,
    pub version: String,
    pub description: String,
    pub status: String,
    pub backend: String,
    pub default_lang: String,
    pub supported_languages: Vec<String>,
    pub supported_formats: Vec<String>,
    pub max_image_size: u32,
    pub max_batch_size: usize,
    pub api_endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
}

impl EndpointInfo {
    pub fn new(method: &str, path: &str, description: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        }
    }
}
