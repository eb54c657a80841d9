use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{load_config, ConfigError, CorruptInputPolicy, SliceConfig};

#[derive(Parser, Debug)]
#[command(
    name = "exam-slicer",
    about = "Split scanned exam submissions into one PDF per question",
    long_about = "Merges each student's scanned PDFs, finds question headers with OCR,\n\
                  flags drawing-heavy pages and writes one PDF per question.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 将每个学生目录切分为按题目的 PDF
    Slice(SliceArgs),
    /// 检查 tesseract 和 pdfium 是否可用
    Check(EngineArgs),
}

/// 所有命令共用的参数
#[derive(Args, Debug, Default, Clone)]
pub struct EngineArgs {
    /// JSON 配置文件，命令行参数优先
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tesseract 可执行文件
    #[arg(long, value_name = "PATH")]
    pub tesseract: Option<String>,

    /// 作为 TESSDATA_PREFIX 导出的目录
    #[arg(long, value_name = "PATH")]
    pub tessdata: Option<String>,

    /// 识别语言，如 eng 或 eng+deu
    #[arg(long, value_name = "LANG")]
    pub lang: Option<String>,

    /// pdfium 动态库所在目录
    #[arg(long, alias = "pdfium_dir", value_name = "DIR")]
    pub pdfium_dir: Option<PathBuf>,
}

impl EngineArgs {
    /// 有配置文件时读取，否则使用默认值，再叠加引擎相关参数
    pub fn to_config(&self) -> Result<SliceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SliceConfig::default(),
        };

        if let Some(binary) = &self.tesseract {
            config.tesseract.binary_path = Some(binary.clone());
        }
        if let Some(tessdata) = &self.tessdata {
            config.tesseract.tessdata_path = Some(tessdata.clone());
        }
        if let Some(lang) = &self.lang {
            config.tesseract.lang = Some(lang.clone());
        }
        if let Some(dir) = &self.pdfium_dir {
            config.pdfium_dir = Some(dir.clone());
        }

        Ok(config)
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct SliceArgs {
    /// 输入目录，每个学生一个 PDF 子目录
    #[arg(long, alias = "input_dir", value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// 输出目录
    #[arg(long, alias = "output_dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// 工作线程数 [默认: 可用核心数]
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// 渲染分辨率 [默认: 300]
    #[arg(long, value_name = "N")]
    pub dpi: Option<u32>,

    /// 绘图页的边缘像素阈值 [默认: 1000]
    #[arg(long, alias = "edge_threshold", value_name = "N")]
    pub edge_threshold: Option<u64>,

    /// 题头正则，不区分大小写
    #[arg(long, alias = "question_pattern", value_name = "REGEX")]
    pub question_pattern: Option<String>,

    /// 无法读取的 PDF 的处理方式 [默认: skip-file]
    #[arg(long, value_enum, value_name = "POLICY")]
    pub on_corrupt: Option<CorruptInputPolicy>,

    /// 另将运行汇总写为 JSON
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    #[command(flatten)]
    pub engines: EngineArgs,
}

impl SliceArgs {
    /// 合并配置：命令行参数 > 配置文件 > 默认值
    pub fn to_config(&self) -> Result<SliceConfig, ConfigError> {
        let mut config = self.engines.to_config()?;

        if let Some(dir) = &self.input_dir {
            config.input_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if let Some(threshold) = self.edge_threshold {
            config.edge_threshold = threshold;
        }
        if let Some(pattern) = &self.question_pattern {
            config.question_pattern = pattern.clone();
        }
        if let Some(policy) = self.on_corrupt {
            config.on_corrupt = policy;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("exam-slicer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_slice_flags() {
        let cli = parse(&[
            "slice",
            "--input-dir",
            "scans",
            "--output_dir",
            "out",
            "--workers",
            "4",
            "--on-corrupt",
            "skip-student",
            "--lang",
            "deu",
        ]);
        let Command::Slice(args) = cli.command else {
            panic!("expected slice");
        };

        let config = args.to_config().unwrap();
        assert_eq!(config.input_dir, Some(PathBuf::from("scans")));
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.on_corrupt, CorruptInputPolicy::SkipStudent);
        assert_eq!(config.tesseract.lang_or_default(), "deu");
        assert_eq!(config.dpi, 300);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slicer.json");
        fs::write(
            &path,
            r#"{"inputDir": "from-file", "outputDir": "out", "dpi": 150, "edgeThreshold": 500}"#,
        )
        .unwrap();

        let args = SliceArgs {
            input_dir: Some(PathBuf::from("from-flag")),
            edge_threshold: Some(2500),
            engines: EngineArgs {
                config: Some(path),
                ..Default::default()
            },
            ..Default::default()
        };

        let config = args.to_config().unwrap();
        assert_eq!(config.input_dir, Some(PathBuf::from("from-flag")));
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.dpi, 150);
        assert_eq!(config.edge_threshold, 2500);
    }

    #[test]
    fn test_check_command() {
        let cli = parse(&["check", "--tesseract", "/opt/bin/tesseract"]);
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.tesseract.binary_or_default(), "/opt/bin/tesseract");
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = Cli::try_parse_from(["exam-slicer", "slice", "--on-corrupt", "ignore"]);
        assert!(result.is_err());
    }
}
