#![allow(dead_code)]

use exam_slicer::{BatchSettings, CorruptInputPolicy, Engines};
use image::DynamicImage;
use lopdf::{dictionary, Document, Object, Stream};
use slicer_core::{
    BoundaryDetector, DrawingClassifier, MergedDocument, Page, PageRenderer, RecognitionError,
    RenderError, RenderSession, RenderedPage, TextRecognizer,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// (源文件名, 文件内页码，从 0 开始)
pub type PageKey = (String, usize);

pub fn key(source: &str, page: usize) -> PageKey {
    (source.to_string(), page)
}

/// 含 `pages` 个空白 Letter 页面的 PDF
pub fn blank_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// 创建 `{root}/{student}`，写入给定 (文件名, 页数) 的 PDF
pub fn write_student(root: &Path, student: &str, files: &[(&str, usize)]) -> PathBuf {
    let dir = root.join(student);
    fs::create_dir_all(&dir).unwrap();
    for (name, pages) in files {
        fs::write(dir.join(name), blank_pdf(*pages)).unwrap();
    }
    dir
}

pub fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

pub fn settings(input: &Path, output: &Path, workers: usize) -> BatchSettings {
    BatchSettings {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        workers,
        dpi: 72,
        on_corrupt: CorruptInputPolicy::SkipFile,
    }
}

/// 每页渲染为 1x1 图像，列为失败的页面除外
#[derive(Default)]
pub struct FakeRenderer {
    pub failing: HashSet<PageKey>,
}

struct FakeSession<'a> {
    failing: &'a HashSet<PageKey>,
}

impl PageRenderer for FakeRenderer {
    fn open<'a>(
        &'a self,
        _document: &'a MergedDocument,
    ) -> Result<Box<dyn RenderSession + 'a>, RenderError> {
        Ok(Box::new(FakeSession {
            failing: &self.failing,
        }))
    }
}

impl RenderSession for FakeSession<'_> {
    fn render(&mut self, page: &Page, dpi: u32) -> Result<RenderedPage, RenderError> {
        if self.failing.contains(&key(&page.source, page.source_index)) {
            return Err(RenderError::Page {
                index: page.index,
                message: "rasterizer crashed".to_string(),
            });
        }
        Ok(RenderedPage::new(
            page.clone(),
            dpi,
            DynamicImage::new_luma8(1, 1),
        ))
    }
}

/// 列出的页面识别为 "Question N"，其余页面无题头
/// `panics` 中的页面会让识别器崩溃
#[derive(Default)]
pub struct ScriptedText {
    pub headers: HashSet<PageKey>,
    pub panics: HashSet<PageKey>,
}

impl TextRecognizer for ScriptedText {
    fn recognize(&self, page: &RenderedPage) -> Result<String, RecognitionError> {
        let page = page.page();
        if self.panics.contains(&key(&page.source, page.source_index)) {
            panic!("recognizer crashed on {} p{}", page.source, page.source_index + 1);
        }
        if self.headers.contains(&key(&page.source, page.source_index)) {
            Ok(format!("Question {}\nShow your work.", page.index + 1))
        } else {
            Ok("continued from previous page".to_string())
        }
    }
}

/// 列出的页面判定为绘图页
#[derive(Default)]
pub struct ScriptedDrawing {
    pub pages: HashSet<PageKey>,
}

impl DrawingClassifier for ScriptedDrawing {
    fn is_drawing(&self, page: &RenderedPage) -> bool {
        let page = page.page();
        self.pages.contains(&key(&page.source, page.source_index))
    }
}

/// 模拟引擎加默认题头模式
#[derive(Default)]
pub struct Harness {
    pub renderer: FakeRenderer,
    pub text: ScriptedText,
    pub drawing: ScriptedDrawing,
    pub detector: BoundaryDetector,
}

impl Harness {
    pub fn header(mut self, source: &str, page: usize) -> Self {
        self.text.headers.insert(key(source, page));
        self
    }

    pub fn drawing(mut self, source: &str, page: usize) -> Self {
        self.drawing.pages.insert(key(source, page));
        self
    }

    pub fn recognizer_panic(mut self, source: &str, page: usize) -> Self {
        self.text.panics.insert(key(source, page));
        self
    }

    pub fn render_failure(mut self, source: &str, page: usize) -> Self {
        self.renderer.failing.insert(key(source, page));
        self
    }

    pub fn engines(&self) -> Engines<'_> {
        Engines {
            renderer: &self.renderer,
            recognizer: &self.text,
            classifier: &self.drawing,
            detector: &self.detector,
        }
    }
}
