//! 扫描提交的 PDF 合并与按题目输出

mod merge;
mod write;

pub use merge::{discover_sources, merge_sources, SourceDocument};
pub use write::{write_chunks, ChunkWriter, WrittenChunk};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no PDF files in {}", dir.display())]
    NoInput { dir: PathBuf },
    #[error("cannot list {}: {source}", dir.display())]
    Io {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Corrupt { path: PathBuf, source: lopdf::Error },
    #[error("cannot assemble merged document: {0}")]
    Assemble(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("cannot create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot reload merged document: {0}")]
    Reload(lopdf::Error),
    #[error("cannot save {}: {message}", path.display())]
    Save { path: PathBuf, message: String },
    #[error("merged document has no page {index}")]
    MissingPage { index: usize },
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object, Stream};

    /// 构建以 MediaBox 宽度区分各页的 PDF
    ///
    /// `inherit_media_box` 为真时，第一个宽度的 MediaBox 放在页树根节点而非各页上。
    pub fn pdf_with_widths(widths: &[i64], inherit_media_box: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();

        for &width in widths {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if !inherit_media_box {
                page.set("MediaBox", media_box(width));
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let mut pages = dictionary! {
            "Type" => "Pages",
            "Count" => widths.len() as i64,
            "Kids" => kids,
        };
        if inherit_media_box {
            pages.set("MediaBox", media_box(widths.first().copied().unwrap_or(612)));
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn media_box(width: i64) -> Object {
        Object::Array(vec![0.into(), 0.into(), width.into(), 792.into()])
    }

    /// 按页序返回各页的 MediaBox 宽度
    pub fn page_widths(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let page = doc.get_dictionary(id).unwrap();
                page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                    .as_i64()
                    .unwrap()
            })
            .collect()
    }
}
