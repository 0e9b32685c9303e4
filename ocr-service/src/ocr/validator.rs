use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageReader};

use crate::config::Config;
use crate::error::{OcrError, Result};

/// What the caller declared about the bytes: a file extension and/or a
/// content type. Either may be missing, in which case the format is sniffed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFormat {
    pub extension: Option<String>,
    pub content_type: Option<String>,
}

impl SourceFormat {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn from_path(path: &Path) -> Self {
        Self {
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase()),
            content_type: None,
        }
    }

    pub fn from_filename(name: &str) -> Self {
        Self::from_path(Path::new(name))
    }

    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
            .filter(|ct| !ct.is_empty());
        self
    }
}

/// A decoded image ready for inference, with its post-resize dimensions.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub image: DynamicImage,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl NormalizedImage {
    pub fn was_resized(&self) -> bool {
        self.width != self.original_width || self.height != self.original_height
    }
}

#[derive(Debug, Clone)]
pub struct ImageValidator {
    allowed_formats: Vec<String>,
    max_image_size: u32,
}

impl ImageValidator {
    pub fn new(allowed_formats: Vec<String>, max_image_size: u32) -> Self {
        Self {
            allowed_formats: allowed_formats
                .into_iter()
                .map(|f| canonical_extension(&f))
                .collect(),
            max_image_size,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.normalized_formats(), config.ocr.max_image_size)
    }

    pub fn max_image_size(&self) -> u32 {
        self.max_image_size
    }

    pub fn is_allowed(&self, extension: &str) -> bool {
        let ext = canonical_extension(extension);
        self.allowed_formats.iter().any(|f| *f == ext)
    }

    /// Check the format against the allow-list, decode, and downscale so the
    /// longer side fits `max_image_size`.
    pub fn validate_and_normalize(
        &self,
        bytes: &[u8],
        source: &SourceFormat,
    ) -> Result<NormalizedImage> {
        // Cheap rejection before any decoding
        let format = self.resolve_format(bytes, source)?;

        if bytes.is_empty() {
            return Err(OcrError::CorruptImage("Image data is empty".to_string()));
        }

        let img = ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| OcrError::CorruptImage(format!("Failed to read image: {e}")))?
            .decode()
            .map_err(|e| OcrError::CorruptImage(format!("Failed to decode image: {e}")))?;

        let (original_width, original_height) = img.dimensions();
        if original_width == 0 || original_height == 0 {
            return Err(OcrError::CorruptImage("Image has no pixels".to_string()));
        }

        let img = resize_if_needed(img, self.max_image_size);
        let img = to_rgb(img);
        let (width, height) = img.dimensions();

        Ok(NormalizedImage {
            image: img,
            format,
            width,
            height,
            original_width,
            original_height,
        })
    }

    fn resolve_format(&self, bytes: &[u8], source: &SourceFormat) -> Result<String> {
        if let Some(ext) = source.extension.as_deref().filter(|e| !e.is_empty()) {
            let ext = canonical_extension(ext);
            return if self.is_allowed(&ext) {
                Ok(ext)
            } else {
                Err(OcrError::UnsupportedFormat(format!(".{ext}")))
            };
        }

        if let Some(content_type) = source.content_type.as_deref() {
            if content_type != "application/octet-stream" {
                if let Some(exts) = mime_guess::get_mime_extensions_str(content_type) {
                    return exts
                        .iter()
                        .map(|e| canonical_extension(e))
                        .find(|e| self.is_allowed(e))
                        .ok_or_else(|| OcrError::UnsupportedFormat(content_type.to_string()));
                }
            }
        }

        match infer::get(bytes) {
            Some(kind) => {
                let ext = canonical_extension(kind.extension());
                if self.is_allowed(&ext) {
                    Ok(ext)
                } else {
                    Err(OcrError::UnsupportedFormat(kind.mime_type().to_string()))
                }
            }
            None if bytes.is_empty() => {
                Err(OcrError::CorruptImage("Image data is empty".to_string()))
            }
            None => Err(OcrError::UnsupportedFormat(
                "Unable to determine image format".to_string(),
            )),
        }
    }
}

/// Lowercase, dot-free extension with common aliases folded together.
fn canonical_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    match ext.as_str() {
        "tif" => "tiff".to_string(),
        "jpe" | "jfif" | "pjpeg" | "pjp" => "jpg".to_string(),
        _ => ext,
    }
}

/// New dimensions with the longer side equal to `max_dim`, or `None` when the
/// image already fits. A ceiling of 0 disables downscaling.
fn scaled_dimensions(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    let longer = width.max(height);
    if max_dim == 0 || longer <= max_dim {
        return None;
    }

    let scale = max_dim as f64 / longer as f64;
    let shrink = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dim);

    if width >= height {
        Some((max_dim, shrink(height)))
    } else {
        Some((shrink(width), max_dim))
    }
}

/// Resize image if it exceeds maximum dimension while maintaining aspect ratio
///
/// Uses Lanczos3 filter for high-quality downscaling
fn resize_if_needed(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    match scaled_dimensions(width, height, max_dim) {
        Some((new_width, new_height)) => {
            tracing::debug!(
                width,
                height,
                new_width,
                new_height,
                "Downscaling oversized image"
            );
            img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3)
        }
        None => img,
    }
}

/// Engines take three-channel input; drop alpha and expand grayscale.
fn to_rgb(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}
