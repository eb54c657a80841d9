//! 页面与文档模型
//!
//! 每个学生的提交合并为一个 [`MergedDocument`]，合并之后的各阶段都通过
//! [`Page`] 引用页面。

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// 合并文档中的一页
///
/// 只记录页面来源和在合并文档中的位置，不携带内容。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    /// 源 PDF 文件名
    pub source: String,
    /// 在源 PDF 中的位置，从 0 开始
    pub source_index: usize,
    /// 在合并文档中的位置，从 0 开始
    pub index: usize,
}

impl Page {
    pub fn new(source: impl Into<String>, source_index: usize, index: usize) -> Self {
        Self {
            source: source.into(),
            source_index,
            index,
        }
    }
}

/// 一个学生的有序页面及序列化后的合并 PDF
///
/// 页面先按源文件名排序，再按文件内顺序排列。
#[derive(Debug, Clone, Default)]
pub struct MergedDocument {
    pages: Vec<Page>,
    bytes: Vec<u8>,
}

impl MergedDocument {
    pub fn new(pages: Vec<Page>, bytes: Vec<u8>) -> Self {
        Self { pages, bytes }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 按顺序恰好包含 [`Self::pages`] 的 PDF 字节
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// 单页的栅格图像，逐页生成，用完即弃
#[derive(Debug, Clone)]
pub struct RenderedPage {
    page: Page,
    dpi: u32,
    image: DynamicImage,
}

impl RenderedPage {
    pub fn new(page: Page, dpi: u32, image: DynamicImage) -> Self {
        Self { page, dpi, image }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}
