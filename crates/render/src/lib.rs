//! 基于 pdfium 的页面渲染
//!
//! pdfium 库每个进程只加载一次，由所有工作线程共享。
//! 合并后的文档从内存打开，生命周期为一个学生的处理过程。

use pdfium_render::prelude::*;
use slicer_core::{MergedDocument, Page, PageRenderer, RenderError, RenderSession, RenderedPage};
use std::path::{Path, PathBuf};

/// 每英寸的 PDF 用户空间单位
const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, thiserror::Error)]
#[error("pdfium library is not available: {0}")]
pub struct RendererUnavailable(String);

/// `width_pt` x `height_pt` 点的页面以 `dpi` 渲染后的像素尺寸
pub fn target_size(width_pt: f32, height_pt: f32, dpi: u32) -> (i32, i32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let width = (width_pt * scale).round() as i32;
    let height = (height_pt * scale).round() as i32;
    (width.max(1), height.max(1))
}

/// pdfium 以 u16 为页码，超出范围的页面无法渲染
fn page_number(page: &Page) -> Result<u16, RenderError> {
    u16::try_from(page.index).map_err(|_| RenderError::Page {
        index: page.index,
        message: format!("page index exceeds pdfium limit of {}", u16::MAX),
    })
}

/// 按顺序查找 pdfium 动态库的目录
fn pdfium_search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = explicit {
        paths.push(dir.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());
        }
    }

    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));

    paths
}

/// 通过已绑定的 pdfium 库渲染页面
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    /// 依次尝试 `library_dir`、常用本地目录和系统库，绑定第一个可加载的 pdfium
    pub fn bind(library_dir: Option<&Path>) -> Result<Self, RendererUnavailable> {
        for path in pdfium_search_paths(library_dir) {
            let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
            log::debug!("[Render] 尝试加载 pdfium: {:?}", lib_path);

            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                log::info!("[Render] 已从 {:?} 加载 pdfium", path);
                return Ok(Self {
                    pdfium: Pdfium::new(bindings),
                });
            }
        }

        log::debug!("[Render] 尝试系统 pdfium 库");
        Pdfium::bind_to_system_library()
            .map(|bindings| Self {
                pdfium: Pdfium::new(bindings),
            })
            .map_err(|e| RendererUnavailable(e.to_string()))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn open<'a>(
        &'a self,
        document: &'a MergedDocument,
    ) -> Result<Box<dyn RenderSession + 'a>, RenderError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(document.bytes(), None)
            .map_err(|e| RenderError::Open(e.to_string()))?;
        Ok(Box::new(PdfiumSession { document }))
    }
}

/// 已载入 pdfium 的合并文档
pub struct PdfiumSession<'a> {
    document: PdfDocument<'a>,
}

impl RenderSession for PdfiumSession<'_> {
    fn render(&mut self, page: &Page, dpi: u32) -> Result<RenderedPage, RenderError> {
        let failed = |message: String| RenderError::Page {
            index: page.index,
            message,
        };

        let pdf_page = self
            .document
            .pages()
            .get(page_number(page)?)
            .map_err(|e| failed(e.to_string()))?;

        let (width, height) = target_size(pdf_page.width().value, pdf_page.height().value, dpi);
        log::debug!(
            "[Render] 第 {} 页 ({} p{}): {}x{} 像素, {} dpi",
            page.index + 1,
            page.source,
            page.source_index + 1,
            width,
            height,
            dpi
        );

        let config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height);
        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|e| failed(e.to_string()))?;

        Ok(RenderedPage::new(page.clone(), dpi, bitmap.as_image()))
    }
}
