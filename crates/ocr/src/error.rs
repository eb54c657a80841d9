//! OCR 错误类型

use slicer_core::RecognitionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("cannot run {binary}: {reason}")]
    Unavailable { binary: String, reason: String },

    #[error("tesseract failed: {0}")]
    Engine(String),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<OcrError> for RecognitionError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::Io(e) => RecognitionError::Io(e),
            other => RecognitionError::Engine(other.to_string()),
        }
    }
}
