use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use slicer_core::{DEFAULT_DPI, DEFAULT_QUESTION_PATTERN};
use slicer_ocr::TesseractConfig;
use slicer_vision::DEFAULT_EDGE_THRESHOLD;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::BatchSettings;

/// 无法解析的源 PDF 的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptInputPolicy {
    /// 忽略该文件，保留该学生的其他文件
    #[default]
    SkipFile,
    /// 跳过整个学生
    SkipStudent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SliceConfig {
    /// 输入目录，每个学生一个子目录
    pub input_dir: Option<PathBuf>,
    /// 输出目录，存放按题目的 PDF 和绘图日志
    pub output_dir: Option<PathBuf>,
    /// 工作线程数，未设置时使用全部可用核心
    pub workers: Option<usize>,
    /// 识别和分类使用的渲染分辨率
    pub dpi: u32,
    /// 边缘像素数超过该值即判定为绘图页
    pub edge_threshold: u64,
    /// 题头正则，不区分大小写
    pub question_pattern: String,
    pub on_corrupt: CorruptInputPolicy,
    /// pdfium 动态库所在目录
    pub pdfium_dir: Option<PathBuf>,
    pub tesseract: TesseractConfig,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            output_dir: None,
            workers: None,
            dpi: DEFAULT_DPI,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            question_pattern: DEFAULT_QUESTION_PATTERN.to_string(),
            on_corrupt: CorruptInputPolicy::default(),
            pdfium_dir: None,
            tesseract: TesseractConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// 读取 JSON 配置文件，缺失的字段使用默认值
pub fn load_config(path: &Path) -> Result<SliceConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// 实际工作线程数：指定值，或全部可用核心
pub fn worker_count(requested: Option<usize>) -> usize {
    requested
        .filter(|n| *n > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}

impl SliceConfig {
    /// 校验配置并转换为批处理参数
    pub fn batch_settings(&self) -> Result<BatchSettings, ConfigError> {
        let input_dir = self
            .input_dir
            .clone()
            .ok_or(ConfigError::Missing("input directory"))?;
        let output_dir = self
            .output_dir
            .clone()
            .ok_or(ConfigError::Missing("output directory"))?;

        if self.dpi == 0 {
            return Err(ConfigError::Invalid("dpi must be positive".to_string()));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be positive".to_string()));
        }

        Ok(BatchSettings {
            input_dir,
            output_dir,
            workers: worker_count(self.workers),
            dpi: self.dpi,
            on_corrupt: self.on_corrupt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SliceConfig::default();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.edge_threshold, 1000);
        assert_eq!(config.question_pattern, DEFAULT_QUESTION_PATTERN);
        assert_eq!(config.on_corrupt, CorruptInputPolicy::SkipFile);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slicer.json");
        fs::write(
            &path,
            r#"{
                "inputDir": "scans",
                "dpi": 200,
                "onCorrupt": "skip-student",
                "tesseract": { "lang": "eng+deu" }
            }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.input_dir, Some(PathBuf::from("scans")));
        assert_eq!(config.dpi, 200);
        assert_eq!(config.on_corrupt, CorruptInputPolicy::SkipStudent);
        assert_eq!(config.tesseract.lang_or_default(), "eng+deu");
        assert_eq!(config.edge_threshold, 1000);
        assert_eq!(config.output_dir, None);
    }

    #[test]
    fn test_bad_json_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ dpi: ").unwrap();

        match load_config(&path) {
            Err(ConfigError::Json { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected json error, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_settings_requires_directories() {
        let config = SliceConfig::default();
        assert!(matches!(
            config.batch_settings(),
            Err(ConfigError::Missing("input directory"))
        ));
    }

    #[test]
    fn test_batch_settings_rejects_zero_values() {
        let mut config = SliceConfig {
            input_dir: Some("in".into()),
            output_dir: Some("out".into()),
            ..Default::default()
        };
        config.workers = Some(0);
        assert!(matches!(
            config.batch_settings(),
            Err(ConfigError::Invalid(_))
        ));

        config.workers = Some(3);
        config.dpi = 0;
        assert!(matches!(
            config.batch_settings(),
            Err(ConfigError::Invalid(_))
        ));

        config.dpi = 150;
        let settings = config.batch_settings().unwrap();
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.dpi, 150);
    }

    #[test]
    fn test_worker_count_defaults_to_available_cores() {
        assert_eq!(worker_count(Some(4)), 4);
        assert!(worker_count(None) >= 1);
        assert!(worker_count(Some(0)) >= 1);
    }
}
