//! Tesseract OCR 引擎 (命令行封装)

use image::{DynamicImage, ImageFormat};
use slicer_core::{RecognitionError, RenderedPage, TextRecognizer};
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use crate::{OcrError, TesseractConfig, TesseractStatus};

/// 所有工作线程共享的 Tesseract 引擎，每次识别启动独立进程
pub struct TesseractEngine {
    config: TesseractConfig,
    version: String,
}

impl TesseractEngine {
    /// 检查可执行文件可用后创建引擎
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        let version = get_tesseract_version(config.binary_or_default())?;

        log::info!(
            "[Tesseract] 版本 {}, 语言 {}",
            version,
            config.lang_or_default()
        );

        Ok(Self { config, version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// 识别 `image_path` 处的图像并返回纯文本
    ///
    /// `dpi` 为图像的渲染分辨率，PNG 本身不带分辨率信息。
    pub fn recognize_file(
        &self,
        image_path: &Path,
        dpi: Option<u32>,
    ) -> Result<String, OcrError> {
        let start = Instant::now();

        let mut cmd = Command::new(self.config.binary_or_default());
        cmd.args(command_args(&self.config, image_path, dpi));

        if let Some(tessdata_path) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata_path);
        }

        let output = cmd.output().map_err(|e| OcrError::Unavailable {
            binary: self.config.binary_or_default().to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(stderr.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();

        log::debug!(
            "[Tesseract] 识别 {} 个字符, 耗时 {} ms",
            text.len(),
            start.elapsed().as_millis()
        );

        Ok(text)
    }

    /// 通过临时 PNG 文件识别内存中的图像
    pub fn recognize_image(
        &self,
        img: &DynamicImage,
        dpi: Option<u32>,
    ) -> Result<String, OcrError> {
        let scratch = tempfile::Builder::new()
            .prefix("slicer-ocr-")
            .suffix(".png")
            .tempfile()?;

        let gray = DynamicImage::ImageLuma8(img.to_luma8());
        gray.save_with_format(scratch.path(), ImageFormat::Png)?;

        self.recognize_file(scratch.path(), dpi)
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, page: &RenderedPage) -> Result<String, RecognitionError> {
        Ok(self.recognize_image(page.image(), Some(page.dpi()))?)
    }
}

/// 识别 `image_path` 并输出到 stdout 的命令行参数
fn command_args(config: &TesseractConfig, image_path: &Path, dpi: Option<u32>) -> Vec<String> {
    let mut args = vec![
        image_path.to_string_lossy().to_string(),
        "stdout".to_string(),
        "-l".to_string(),
        config.lang_or_default().to_string(),
    ];

    if let Some(dpi) = dpi {
        args.push("--dpi".to_string());
        args.push(dpi.to_string());
    }
    if let Some(psm) = config.psm {
        args.push("--psm".to_string());
        args.push(psm.to_string());
    }
    if let Some(oem) = config.oem {
        args.push("--oem".to_string());
        args.push(oem.to_string());
    }

    args
}

/// 通过 `tesseract --version` 获取版本
pub fn get_tesseract_version(binary_path: &str) -> Result<String, OcrError> {
    let unavailable = |reason: String| OcrError::Unavailable {
        binary: binary_path.to_string(),
        reason,
    };

    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|e| unavailable(e.to_string()))?;

    if !output.status.success() {
        return Err(unavailable(format!("--version exited with {}", output.status)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    Ok(parse_version(&format!("{}{}", stdout, stderr)))
}

/// 从 `--version` 输出中解析版本号，如 "tesseract 5.3.0" 或 "tesseract v5.3.0"
fn parse_version(output: &str) -> String {
    output
        .lines()
        .filter(|line| line.contains("tesseract"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
        .next()
        .unwrap_or_else(|| "unknown".to_string())
}

/// 通过 `tesseract --list-langs` 获取已安装语言
pub fn get_tesseract_langs(
    binary_path: &str,
    tessdata_path: Option<&str>,
) -> Result<Vec<String>, OcrError> {
    let mut cmd = Command::new(binary_path);
    cmd.arg("--list-langs");

    if let Some(path) = tessdata_path {
        cmd.env("TESSDATA_PREFIX", path);
    }

    let output = cmd.output().map_err(|e| OcrError::Unavailable {
        binary: binary_path.to_string(),
        reason: e.to_string(),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    Ok(parse_langs(&format!("{}{}", stdout, stderr)))
}

fn parse_langs(output: &str) -> Vec<String> {
    let mut langs = Vec::new();
    let mut found_list = false;

    for line in output.lines() {
        let line = line.trim();
        if line.contains("List of available languages") {
            found_list = true;
            continue;
        }
        if found_list && !line.is_empty() && !line.contains(':') {
            langs.push(line.to_string());
        }
    }

    langs
}

/// 检测配置的可执行文件，失败时回退到 `PATH` 中的 tesseract
pub fn detect_tesseract_status(config: &TesseractConfig) -> TesseractStatus {
    let configured = config.binary_or_default();

    let mut candidates = vec![configured.to_string()];
    if let Some(found) = which_tesseract(configured) {
        if found != configured {
            candidates.push(found);
        }
    }

    let mut last_error = None;
    for binary in candidates {
        match get_tesseract_version(&binary) {
            Ok(version) => {
                let langs = get_tesseract_langs(&binary, config.tessdata_path.as_deref())
                    .unwrap_or_default();
                let binary_path = which_tesseract(&binary).or(Some(binary));

                return TesseractStatus {
                    installed: true,
                    version: Some(version),
                    binary_path,
                    tessdata_path: config
                        .tessdata_path
                        .clone()
                        .or_else(|| std::env::var("TESSDATA_PREFIX").ok()),
                    available_langs: langs,
                    error: None,
                };
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    TesseractStatus {
        installed: false,
        version: None,
        binary_path: None,
        tessdata_path: None,
        available_langs: Vec::new(),
        error: last_error,
    }
}

/// 用平台的查找命令解析 `binary` 的完整路径
fn which_tesseract(binary: &str) -> Option<String> {
    #[cfg(target_os = "windows")]
    let lookup = "where";
    #[cfg(not(target_os = "windows"))]
    let lookup = "which";

    Command::new(lookup)
        .arg(binary)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| {
            String::from_utf8_lossy(&o.stdout)
                .lines()
                .next()
                .map(|line| line.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}
