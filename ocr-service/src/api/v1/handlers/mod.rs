pub(crate) mod health;
pub mod models;
pub mod ocr;

pub use health::{health_check, service_info};
