//! 在线程池上批量处理学生目录
//!
//! 每个学生目录是一个工作单元。单元之间不共享可变状态：各自返回
//! [`StudentResult`]，结果只在线程池的有序收集处汇合。

use chrono::{DateTime, Local};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use slicer_core::{BoundaryDetector, DrawingClassifier, PageRenderer, Segmenter, TextRecognizer};
use slicer_pdf::{
    discover_sources, merge_sources, write_chunks, MergeError, SourceDocument, WrittenChunk,
};
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::CorruptInputPolicy;
use crate::report::{self, ReportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub dpi: u32,
    pub on_corrupt: CorruptInputPolicy,
}

/// 所有工作线程只读共享的引擎
#[derive(Clone, Copy)]
pub struct Engines<'a> {
    pub renderer: &'a dyn PageRenderer,
    pub recognizer: &'a dyn TextRecognizer,
    pub classifier: &'a dyn DrawingClassifier,
    pub detector: &'a BoundaryDetector,
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("cannot read input folder {}: {source}", path.display())]
    InputRoot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot create output folder {}: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// 一个学生目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentUnit {
    pub id: String,
    pub dir: PathBuf,
}

/// `input_dir` 的直接子目录，按学生 ID 排序
pub fn discover_students(input_dir: &Path) -> Result<Vec<StudentUnit>, BatchError> {
    let entries = fs::read_dir(input_dir).map_err(|source| BatchError::InputRoot {
        path: input_dir.to_path_buf(),
        source,
    })?;

    let mut students: Vec<StudentUnit> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|dir| {
            let id = dir.file_name()?.to_string_lossy().to_string();
            Some(StudentUnit { id, dir })
        })
        .collect();

    students.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(students)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UnitOutcome {
    Completed,
    Skipped { reason: String },
    Failed { error: String },
}

impl fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitOutcome::Completed => write!(f, "completed"),
            UnitOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            UnitOutcome::Failed { error } => write!(f, "failed ({})", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub file_name: String,
    pub path: PathBuf,
    pub has_drawing: bool,
    pub page_count: usize,
}

impl From<WrittenChunk> for OutputFile {
    fn from(chunk: WrittenChunk) -> Self {
        Self {
            file_name: chunk.file_name,
            path: chunk.path,
            has_drawing: chunk.has_drawing,
            page_count: chunk.page_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResult {
    pub student_id: String,
    pub outcome: UnitOutcome,
    /// 已写入的文件，按题目顺序
    pub files: Vec<OutputFile>,
    /// 处理过程中遇到的非致命问题
    pub warnings: Vec<String>,
}

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub settings: BatchSettings,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// 每个学生一个结果，按学生 ID 排序
    pub results: Vec<StudentResult>,
    pub drawing_log: PathBuf,
}

impl BatchRun {
    pub fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed { .. }))
    }
}

/// 单元提前结束的原因
enum UnitError {
    Skip(String),
    Fail(String),
}

pub struct BatchScheduler<'a> {
    settings: BatchSettings,
    engines: Engines<'a>,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(settings: BatchSettings, engines: Engines<'a>) -> Self {
        Self { settings, engines }
    }

    /// 处理所有学生目录并写入绘图日志
    ///
    /// 单个学生的失败记录在其 [`StudentResult`] 中；只有输入根目录、
    /// 输出根目录、线程池和日志的问题才返回错误。
    pub fn run(&self) -> Result<BatchRun, BatchError> {
        let started_at = Local::now();
        let students = discover_students(&self.settings.input_dir)?;

        fs::create_dir_all(&self.settings.output_dir).map_err(|source| {
            BatchError::OutputRoot {
                path: self.settings.output_dir.clone(),
                source,
            }
        })?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.settings.workers)
            .thread_name(|i| format!("slicer-worker-{}", i))
            .build()?;

        let total = students.len();
        let done = AtomicUsize::new(0);
        log::info!(
            "[Batch] {} 个学生, {} 个工作线程",
            total,
            self.settings.workers
        );

        let results: Vec<StudentResult> = pool.install(|| {
            students
                .par_iter()
                .map(|unit| {
                    let result = self.process_student(unit);
                    let k = done.fetch_add(1, Ordering::SeqCst) + 1;
                    log::info!("[Batch] [{}/{}] {}: {}", k, total, unit.id, result.outcome);
                    result
                })
                .collect()
        });

        let drawing_log = report::write_drawing_log(&self.settings.output_dir, &results)?;

        Ok(BatchRun {
            settings: self.settings.clone(),
            started_at,
            finished_at: Local::now(),
            results,
            drawing_log,
        })
    }

    /// 处理一个单元，所有失败都转为该单元的结果
    pub fn process_student(&self, unit: &StudentUnit) -> StudentResult {
        let mut warnings = Vec::new();

        let processed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.process_unit(unit, &mut warnings)
        }))
        .unwrap_or_else(|_| Err(UnitError::Fail("worker panicked".to_string())));

        let (outcome, files) = match processed {
            Ok(files) => (UnitOutcome::Completed, files),
            Err(UnitError::Skip(reason)) => {
                log::warn!("[Batch] 跳过 {}: {}", unit.id, reason);
                (UnitOutcome::Skipped { reason }, Vec::new())
            }
            Err(UnitError::Fail(error)) => {
                log::error!("[Batch] {} 处理失败: {}", unit.id, error);
                (UnitOutcome::Failed { error }, Vec::new())
            }
        };

        StudentResult {
            student_id: unit.id.clone(),
            outcome,
            files,
            warnings,
        }
    }

    fn process_unit(
        &self,
        unit: &StudentUnit,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<OutputFile>, UnitError> {
        let paths = discover_sources(&unit.dir).map_err(|e| match e {
            MergeError::NoInput { .. } => UnitError::Skip(e.to_string()),
            other => UnitError::Fail(other.to_string()),
        })?;

        let mut sources = Vec::with_capacity(paths.len());
        for path in &paths {
            match SourceDocument::load(path) {
                Ok(source) => sources.push(source),
                Err(e) => match self.settings.on_corrupt {
                    CorruptInputPolicy::SkipFile => {
                        log::warn!("[Batch] {}: 忽略文件 {}", unit.id, e);
                        warnings.push(e.to_string());
                    }
                    CorruptInputPolicy::SkipStudent => return Err(UnitError::Skip(e.to_string())),
                },
            }
        }

        if sources.is_empty() {
            return Err(UnitError::Skip(format!(
                "no readable PDF files in {}",
                unit.dir.display()
            )));
        }

        let merged = merge_sources(sources).map_err(|e| UnitError::Fail(e.to_string()))?;

        let segmenter = Segmenter::new(
            self.engines.renderer,
            self.engines.recognizer,
            self.engines.classifier,
            self.engines.detector,
            self.settings.dpi,
        );
        let segmentation = segmenter.segment(&unit.id, &merged);
        warnings.extend(segmentation.issues.iter().map(|issue| issue.to_string()));

        let dir = self.settings.output_dir.join(&unit.id);
        let written = write_chunks(&merged, &segmentation.chunks, &unit.id, &dir)
            .map_err(|e| UnitError::Fail(e.to_string()))?;

        Ok(written.into_iter().map(OutputFile::from).collect())
    }
}
