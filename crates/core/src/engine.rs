//! 分块过程中使用的外部引擎接口
//!
//! 实现由所有工作线程共享，因此要求 `Send + Sync`。
//! 渲染为每份文档打开一个会话，会话只在单个线程中使用。

use crate::document::{MergedDocument, Page, RenderedPage};
use crate::{RecognitionError, RenderError};

/// 渲染合并文档的页面
pub trait PageRenderer: Send + Sync {
    /// 打开 `document` 以逐页渲染
    fn open<'a>(
        &'a self,
        document: &'a MergedDocument,
    ) -> Result<Box<dyn RenderSession + 'a>, RenderError>;
}

/// 由 [`PageRenderer`] 打开的文档
pub trait RenderSession {
    /// 以 `dpi` 渲染一页
    fn render(&mut self, page: &Page, dpi: u32) -> Result<RenderedPage, RenderError>;
}

/// 从渲染页面中提取纯文本
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, page: &RenderedPage) -> Result<String, RecognitionError>;
}

/// 判断渲染页面是否为绘图页
///
/// 分类不会失败：无法判定时实现返回 `false`。
pub trait DrawingClassifier: Send + Sync {
    fn is_drawing(&self, page: &RenderedPage) -> bool;
}
