//! 基于 Tesseract 命令行的试卷页面文字识别

mod error;
mod tesseract;

pub use error::OcrError;
pub use tesseract::{
    detect_tesseract_status, get_tesseract_langs, get_tesseract_version, TesseractEngine,
};

use serde::{Deserialize, Serialize};

/// 未配置路径时在 `PATH` 中查找的可执行文件名
pub const DEFAULT_BINARY: &str = "tesseract";

/// 未配置时使用的识别语言
pub const DEFAULT_LANG: &str = "eng";

/// Tesseract 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    /// tesseract 可执行文件路径
    pub binary_path: Option<String>,
    /// 作为 `TESSDATA_PREFIX` 导出的目录
    pub tessdata_path: Option<String>,
    /// 识别语言，如 "eng" 或 "eng+deu"
    pub lang: Option<String>,
    /// 页面分割模式 (0-13)
    pub psm: Option<u8>,
    /// OCR 引擎模式 (0-3)
    pub oem: Option<u8>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or(DEFAULT_BINARY)
    }

    pub fn lang_or_default(&self) -> &str {
        self.lang.as_deref().unwrap_or(DEFAULT_LANG)
    }
}

/// `check` 报告的安装状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TesseractStatus {
    pub installed: bool,
    pub version: Option<String>,
    pub binary_path: Option<String>,
    pub tessdata_path: Option<String>,
    pub available_langs: Vec<String>,
    pub error: Option<String>,
}
