//! v1 API Data Transfer Objects.
//!
//! Request bodies and handler-specific payloads. Recognition results, batch
//! results and model info are serialized straight from the core types.

pub mod ocr;
pub mod system;

pub use ocr::*;
pub use system::*;
