//! Local OCR via Tesseract (leptess).

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use leptess::{LepTess, Variable};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{OcrError, Result};

use super::engine::{Device, EngineFactory, EngineOptions, OcrEngine, RawDetection};

/// Service language code to tessdata language code.
pub fn tessdata_language(lang: &str) -> &str {
    match lang {
        "ch" => "chi_sim",
        "chinese_cht" => "chi_tra",
        "en" => "eng",
        "japan" => "jpn",
        "korean" => "kor",
        "fr" => "fra",
        "german" => "deu",
        other => other,
    }
}

pub struct TesseractFactory;

impl EngineFactory for TesseractFactory {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn gpu_available(&self) -> bool {
        false
    }

    fn create(
        &self,
        language: &str,
        _device: Device,
        options: &EngineOptions,
    ) -> Result<Arc<dyn OcrEngine>> {
        let tess_lang = tessdata_language(language);
        let data_path = options.model_dir.as_ref().and_then(|p| p.to_str());

        let mut lt = LepTess::new(data_path, tess_lang).map_err(|e| {
            OcrError::EngineLoad(format!("Tesseract not available for '{tess_lang}': {e}"))
        })?;

        // 1 = automatic segmentation with orientation and script detection
        let psm = if options.use_textline_orientation { "1" } else { "3" };
        lt.set_variable(Variable::TesseditPagesegMode, psm)
            .map_err(|e| OcrError::EngineLoad(format!("Failed to set page segmentation: {e}")))?;

        info!(lang = %language, tessdata = %tess_lang, "Tesseract engine initialized");

        Ok(Arc::new(TesseractEngine {
            tesseract: Mutex::new(lt),
        }))
    }
}

/// A single Tesseract handle. The C API is not re-entrant, so calls are
/// serialized on the mutex.
pub struct TesseractEngine {
    tesseract: Mutex<LepTess>,
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrError::EngineInference(format!("Failed to encode image: {e}")))?;

        let tsv = {
            let mut lt = self.tesseract.blocking_lock();
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::EngineInference(format!("Failed to set image: {e}")))?;
            lt.get_tsv_text(0)
                .map_err(|e| OcrError::EngineInference(format!("Failed to extract text: {e}")))?
        };

        Ok(parse_tsv_lines(&tsv))
    }
}

struct LineAccumulator {
    key: (u32, u32, u32, u32),
    words: Vec<String>,
    confidences: Vec<f32>,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl LineAccumulator {
    fn finish(self) -> Option<RawDetection> {
        if self.words.is_empty() {
            return None;
        }
        let score = self.confidences.iter().sum::<f32>() / self.confidences.len() as f32 / 100.0;
        let (l, t, r, b) = (
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
        );
        Some(RawDetection::new(
            self.words.join(" "),
            score,
            vec![[l, t], [r, t], [r, b], [l, b]],
        ))
    }
}

/// Group Tesseract TSV word rows into text lines, in reading order.
///
/// Columns: level, page, block, par, line, word, left, top, width, height,
/// conf, text. Only level-5 rows with a non-negative confidence and
/// non-blank text count as words.
pub fn parse_tsv_lines(tsv: &str) -> Vec<RawDetection> {
    let mut lines = Vec::new();
    let mut current: Option<LineAccumulator> = None;

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let nums: Vec<u32> = cols[1..10].iter().filter_map(|c| c.parse().ok()).collect();
        if nums.len() != 9 {
            continue;
        }
        let conf: f32 = match cols[10].parse() {
            Ok(c) if c >= 0.0 => c,
            _ => continue,
        };
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }

        let key = (nums[0], nums[1], nums[2], nums[3]);
        let (left, top, width, height) = (nums[5], nums[6], nums[7], nums[8]);

        match current.as_mut() {
            Some(line) if line.key == key => {
                line.left = line.left.min(left);
                line.top = line.top.min(top);
                line.right = line.right.max(left + width);
                line.bottom = line.bottom.max(top + height);
            }
            _ => {
                if let Some(done) = current.take().and_then(LineAccumulator::finish) {
                    lines.push(done);
                }
                current = Some(LineAccumulator {
                    key,
                    words: Vec::new(),
                    confidences: Vec::new(),
                    left,
                    top,
                    right: left + width,
                    bottom: top + height,
                });
            }
        }

        if let Some(line) = current.as_mut() {
            line.words.push(text.to_string());
            line.confidences.push(conf);
        }
    }

    if let Some(done) = current.and_then(LineAccumulator::finish) {
        lines.push(done);
    }
    lines
}
