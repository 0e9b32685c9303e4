//! Multi-language OCR over HTTP.
//!
//! Images arrive as uploads, URLs, base64 payloads or batches, are validated
//! and normalized, and are recognized by a lazily loaded engine per
//! `(language, device)` pair.

pub mod api;
pub mod config;
pub mod error;
pub mod ocr;
pub mod services;
