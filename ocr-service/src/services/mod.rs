mod fetch;
mod recognition;

pub use fetch::{FetchedImage, HttpFetcher, ImageFetcher};
pub use recognition::{
    decode_base64_image, parse_image_url, BatchImage, BatchItemError, BatchItemResult,
    BatchResult, RecognitionService,
};
