//! 扫描试卷批量切分为按题目的 PDF

pub mod cli;
pub mod config;
pub mod report;
pub mod scheduler;

pub use config::{load_config, ConfigError, CorruptInputPolicy, SliceConfig};
pub use report::{RunSummary, DRAWING_LOG_FILE};
pub use scheduler::{
    BatchError, BatchRun, BatchScheduler, BatchSettings, Engines, OutputFile, StudentResult,
    UnitOutcome,
};

use slicer_core::{BoundaryDetector, CoreError};
use slicer_ocr::{OcrError, TesseractEngine};
use slicer_render::{PdfiumRenderer, RendererUnavailable};
use slicer_vision::EdgeDensityClassifier;

/// 在处理任何学生之前终止运行的错误
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Pattern(#[from] CoreError),
    #[error("text recognition unavailable: {0}")]
    Recognizer(#[from] OcrError),
    #[error(transparent)]
    Renderer(#[from] RendererUnavailable),
}

/// 已检查可用、可在工作线程间共享的引擎
pub struct Toolchain {
    pub renderer: PdfiumRenderer,
    pub recognizer: TesseractEngine,
    pub classifier: EdgeDensityClassifier,
    pub detector: BoundaryDetector,
}

impl Toolchain {
    pub fn engines(&self) -> Engines<'_> {
        Engines {
            renderer: &self.renderer,
            recognizer: &self.recognizer,
            classifier: &self.classifier,
            detector: &self.detector,
        }
    }
}

/// 编译题头模式，加载 tesseract 和 pdfium
pub fn preflight(config: &SliceConfig) -> Result<Toolchain, StartupError> {
    let detector = BoundaryDetector::new(&config.question_pattern)?;
    let recognizer = TesseractEngine::new(config.tesseract.clone())?;
    let renderer = PdfiumRenderer::bind(config.pdfium_dir.as_deref())?;
    let classifier = EdgeDensityClassifier::new(config.edge_threshold);

    log::info!(
        "[Startup] tesseract {}, 题头模式 {}, 边缘阈值 {}",
        recognizer.version(),
        detector.pattern(),
        classifier.threshold()
    );

    Ok(Toolchain {
        renderer,
        recognizer,
        classifier,
        detector,
    })
}
