//! 绘图日志与运行汇总

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::{BatchRun, StudentResult, UnitOutcome};

/// 输出根目录下的绘图日志文件名
pub const DRAWING_LOG_FILE: &str = "drawing_detection_log.txt";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

/// 每个含绘图的文件一行 `{student}: {file} [DRAWING]`，按结果顺序
pub fn drawing_log_lines(results: &[StudentResult]) -> Vec<String> {
    results
        .iter()
        .flat_map(|result| {
            result
                .files
                .iter()
                .filter(|file| file.has_drawing)
                .map(move |file| format!("{}: {} [DRAWING]", result.student_id, file.file_name))
        })
        .collect()
}

/// 写入绘图日志，没有绘图文件时也写空文件
pub fn write_drawing_log(
    output_dir: &Path,
    results: &[StudentResult],
) -> Result<PathBuf, ReportError> {
    let path = output_dir.join(DRAWING_LOG_FILE);
    let mut content = String::new();
    for line in drawing_log_lines(results) {
        content.push_str(&line);
        content.push('\n');
    }

    fs::write(&path, content).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

/// 可序列化的运行汇总
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_ms: i64,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub students: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub flagged_files: Vec<String>,
    pub drawing_log: PathBuf,
    pub results: Vec<StudentResult>,
}

impl RunSummary {
    pub fn from_run(run: &BatchRun) -> Self {
        let flagged_files = run
            .results
            .iter()
            .flat_map(|r| r.files.iter())
            .filter(|f| f.has_drawing)
            .map(|f| f.file_name.clone())
            .collect();

        Self {
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.to_rfc3339(),
            elapsed_ms: (run.finished_at - run.started_at).num_milliseconds(),
            input_dir: run.settings.input_dir.clone(),
            output_dir: run.settings.output_dir.clone(),
            workers: run.settings.workers,
            students: run.results.len(),
            completed: run.completed(),
            skipped: run.skipped(),
            failed: run.failed(),
            flagged_files,
            drawing_log: run.drawing_log.clone(),
            results: run.results.clone(),
        }
    }
}

/// 输出汇总日志，未完成的学生各占一行
pub fn log_summary(summary: &RunSummary) {
    log::info!(
        "[Batch] 完成, 耗时 {} ms: 成功 {}, 跳过 {}, 失败 {}, 含绘图文件 {}",
        summary.elapsed_ms,
        summary.completed,
        summary.skipped,
        summary.failed,
        summary.flagged_files.len()
    );

    for result in &summary.results {
        match &result.outcome {
            UnitOutcome::Completed => {}
            UnitOutcome::Skipped { reason } => {
                log::warn!("[Batch] {} 已跳过: {}", result.student_id, reason)
            }
            UnitOutcome::Failed { error } => {
                log::error!("[Batch] {} 处理失败: {}", result.student_id, error)
            }
        }
        for warning in &result.warnings {
            log::warn!("[Batch] {}: {}", result.student_id, warning);
        }
    }

    log::info!("[Batch] 绘图日志: {}", summary.drawing_log.display());
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), ReportError> {
    let raw = serde_json::to_string_pretty(summary)?;
    fs::write(path, raw).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
