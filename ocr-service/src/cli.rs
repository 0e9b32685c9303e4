//! One-shot recognition from the command line.

use std::path::Path;

use clap::ValueEnum;

use ocr_service::error::Result;
use ocr_service::ocr::{Device, RecognitionResult};
use ocr_service::services::RecognitionService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON
    Json,
    /// Only the recognized text
    Text,
    /// One line per detection with confidence
    Pretty,
}

pub enum Input<'a> {
    File(&'a Path),
    Url(&'a str),
}

pub async fn recognize(
    service: &RecognitionService,
    input: Input<'_>,
    lang: &str,
    device: Device,
    output: OutputFormat,
) -> Result<()> {
    let result = match input {
        Input::File(path) => service.recognize_file(path, lang, device).await?,
        Input::Url(url) => service.recognize_url(url, lang, device).await?,
    };

    println!("{}", render(&result, output));
    Ok(())
}

fn render(result: &RecognitionResult, output: OutputFormat) -> String {
    match output {
        OutputFormat::Json => {
            serde_json::to_string(result).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        }
        OutputFormat::Text => result.text.clone(),
        OutputFormat::Pretty => {
            let mut out = format!(
                "Language: {}  Image: {}x{}  Time: {}ms\n",
                result.lang, result.image_width, result.image_height, result.processing_time_ms
            );
            match &result.message {
                Some(message) => out.push_str(message),
                None => {
                    out.push_str(&format!(
                        "Lines: {}  Avg confidence: {:.1}%\n",
                        result.word_count,
                        result.avg_confidence * 100.0
                    ));
                    for (i, detection) in result.details.iter().enumerate() {
                        out.push_str(&format!(
                            "\n[{:>2}] ({:.1}%) {}",
                            i + 1,
                            detection.confidence * 100.0,
                            detection.text
                        ));
                    }
                }
            }
            out
        }
    }
}
