//! 按题目分块
//!
//! 逐页遍历合并文档，按检测到的题目划分为分块。识别文本中含题头的页面
//! 会结束当前分块，除非当前分块仍为空。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::boundary::BoundaryDetector;
use crate::document::{MergedDocument, Page, RenderedPage};
use crate::engine::{DrawingClassifier, PageRenderer, TextRecognizer};
use crate::RenderError;

/// 属于同一题目的连续页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    number: usize,
    pages: Vec<Page>,
    drawing: Vec<bool>,
}

impl Chunk {
    /// 在文档分块中的序号，从 1 开始
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// 每页的绘图判定，与 [`Self::pages`] 一一对应
    pub fn drawing_flags(&self) -> &[bool] {
        &self.drawing
    }

    pub fn has_drawing(&self) -> bool {
        self.drawing.iter().any(|&d| d)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 输出文件名 `{student}_Q{n}[_drawing].pdf`
    pub fn file_name(&self, student_id: &str) -> String {
        let label = if self.has_drawing() { "_drawing" } else { "" };
        format!("{}_Q{}{}.pdf", student_id, self.number, label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStage {
    Render,
    Recognition,
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStage::Render => write!(f, "render"),
            PageStage::Recognition => write!(f, "recognition"),
        }
    }
}

/// 保留但以降级方式处理的页面
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIssue {
    /// 在合并文档中的位置，从 0 开始
    pub index: usize,
    pub source: String,
    pub stage: PageStage,
    pub message: String,
}

impl fmt::Display for PageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} ({}) {} failed: {}",
            self.index + 1,
            self.source,
            self.stage,
            self.message
        )
    }
}

/// 一份文档的分块结果
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub chunks: Vec<Chunk>,
    pub issues: Vec<PageIssue>,
}

/// 单页的处理结论
struct Observation {
    page: Page,
    boundary: bool,
    drawing: bool,
}

#[derive(Default)]
struct OpenChunk {
    pages: Vec<Page>,
    drawing: Vec<bool>,
}

impl OpenChunk {
    fn push(&mut self, observation: Observation) {
        self.pages.push(observation.page);
        self.drawing.push(observation.drawing);
    }

    fn close(self, number: usize) -> Chunk {
        Chunk {
            number,
            pages: self.pages,
            drawing: self.drawing,
        }
    }
}

enum State {
    Idle,
    InChunk(OpenChunk),
}

impl State {
    fn step(self, observation: Observation, chunks: &mut Vec<Chunk>) -> State {
        let mut open = match self {
            State::InChunk(open) if observation.boundary && !open.pages.is_empty() => {
                chunks.push(open.close(chunks.len() + 1));
                OpenChunk::default()
            }
            State::InChunk(open) => open,
            State::Idle => OpenChunk::default(),
        };
        open.push(observation);
        State::InChunk(open)
    }

    fn finish(self, chunks: &mut Vec<Chunk>) {
        if let State::InChunk(open) = self {
            if !open.pages.is_empty() {
                chunks.push(open.close(chunks.len() + 1));
            }
        }
    }
}

/// 对文档依次执行渲染、识别和分类
pub struct Segmenter<'a> {
    renderer: &'a dyn PageRenderer,
    recognizer: &'a dyn TextRecognizer,
    classifier: &'a dyn DrawingClassifier,
    detector: &'a BoundaryDetector,
    dpi: u32,
}

impl<'a> Segmenter<'a> {
    pub fn new(
        renderer: &'a dyn PageRenderer,
        recognizer: &'a dyn TextRecognizer,
        classifier: &'a dyn DrawingClassifier,
        detector: &'a BoundaryDetector,
        dpi: u32,
    ) -> Self {
        Self {
            renderer,
            recognizer,
            classifier,
            detector,
            dpi,
        }
    }

    /// 将 `document` 划分为题目分块
    ///
    /// 渲染或识别失败不会丢弃页面：该页以空文本、非绘图并入当前分块，
    /// 并记录一条问题。
    pub fn segment(&self, student_id: &str, document: &MergedDocument) -> Segmentation {
        let mut issues = Vec::new();
        let mut chunks = Vec::new();
        let mut state = State::Idle;

        let mut session = self.renderer.open(document);
        if let Err(e) = &session {
            log::warn!("[Segment] {}: {}", student_id, e);
        }

        for (index, page) in document.pages().iter().enumerate() {
            let rendered = match session.as_mut() {
                Ok(session) => session.render(page, self.dpi),
                Err(e) => Err(e.clone()),
            };
            let observation = self.observe(student_id, index, page, rendered, &mut issues);
            state = state.step(observation, &mut chunks);
        }
        state.finish(&mut chunks);

        log::info!(
            "[Segment] {}: {} 页 -> {} 个分块 (降级页 {} 个)",
            student_id,
            document.page_count(),
            chunks.len(),
            issues.len()
        );

        Segmentation { chunks, issues }
    }

    fn observe(
        &self,
        student_id: &str,
        index: usize,
        page: &Page,
        rendered: Result<RenderedPage, RenderError>,
        issues: &mut Vec<PageIssue>,
    ) -> Observation {
        let mut issue = |stage: PageStage, message: String| {
            log::error!(
                "[Segment] {} 第 {} 页: {} 错误: {}",
                student_id,
                index + 1,
                stage,
                message
            );
            issues.push(PageIssue {
                index,
                source: page.source.clone(),
                stage,
                message,
            });
        };

        let (text, drawing) = match rendered {
            Ok(image) => {
                let text = match self.recognizer.recognize(&image) {
                    Ok(text) => text,
                    Err(e) => {
                        issue(PageStage::Recognition, e.to_string());
                        String::new()
                    }
                };
                (text, self.classifier.is_drawing(&image))
            }
            Err(e) => {
                issue(PageStage::Render, e.to_string());
                (String::new(), false)
            }
        };

        let header = self.detector.find_header(&text);
        log::debug!(
            "[Segment] {} 第 {} 页: 题头={:?} 绘图={}",
            student_id,
            index + 1,
            header,
            drawing
        );

        Observation {
            page: page.clone(),
            boundary: header.is_some(),
            drawing,
        }
    }
}
