//! 扫描试卷按题目切分的核心模型与分块逻辑

pub mod boundary;
pub mod document;
pub mod engine;
pub mod segment;

pub use boundary::{BoundaryDetector, DEFAULT_QUESTION_PATTERN};
pub use document::{MergedDocument, Page, RenderedPage};
pub use engine::{DrawingClassifier, PageRenderer, RenderSession, TextRecognizer};
pub use segment::{Chunk, PageIssue, PageStage, Segmentation, Segmenter};

/// 识别和分类的默认渲染分辨率
pub const DEFAULT_DPI: u32 = 300;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid question pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// 文档或单页的渲染失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("cannot open document for rendering: {0}")]
    Open(String),
    #[error("cannot render page {index}: {message}")]
    Page { index: usize, message: String },
}

/// 单页的文字识别失败
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("recognition engine failed: {0}")]
    Engine(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
