//! 按题目分块输出 PDF

use lopdf::{dictionary, Document, Object, ObjectId};
use slicer_core::{Chunk, MergedDocument};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::WriteError;

/// 已写入磁盘的分块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenChunk {
    pub path: PathBuf,
    pub file_name: String,
    pub has_drawing: bool,
    pub page_count: usize,
}

/// 从合并文档中抽取页面子集
///
/// 每个分块只复制其页面可达的对象，不会为每个分块克隆整份文档。
pub struct ChunkWriter {
    document: Document,
    page_ids: Vec<ObjectId>,
}

impl ChunkWriter {
    pub fn new(merged: &MergedDocument) -> Result<Self, WriteError> {
        let document = Document::load_mem(merged.bytes()).map_err(WriteError::Reload)?;
        let page_ids = document.get_pages().into_values().collect();
        Ok(Self { document, page_ids })
    }

    /// 按顺序将 `chunk` 的页面写入 `path`
    pub fn write(&self, chunk: &Chunk, path: &Path) -> Result<(), WriteError> {
        let mut subset = self.extract(chunk)?;
        subset.compress();

        let mut file = fs::File::create(path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        subset.save_to(&mut file).map_err(|e| WriteError::Save {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// 构建只包含 `chunk` 页面及其引用对象的新文档
    fn extract(&self, chunk: &Chunk) -> Result<Document, WriteError> {
        let kept = chunk
            .pages()
            .iter()
            .map(|p| {
                self.page_ids
                    .get(p.index)
                    .copied()
                    .ok_or(WriteError::MissingPage { index: p.index })
            })
            .collect::<Result<Vec<ObjectId>, _>>()?;

        // 指向其他页面的引用（如链接目标）不跟随
        let kept_set: BTreeSet<ObjectId> = kept.iter().copied().collect();
        let foreign: BTreeSet<ObjectId> = self
            .page_ids
            .iter()
            .filter(|id| !kept_set.contains(id))
            .copied()
            .collect();

        let pages_id = (self.document.max_id + 1, 0);
        let catalog_id = (self.document.max_id + 2, 0);

        let mut subset = Document::with_version(self.document.version.clone());
        let mut seen: BTreeSet<ObjectId> = BTreeSet::new();
        let mut pending: Vec<ObjectId> = kept.clone();

        while let Some(id) = pending.pop() {
            if foreign.contains(&id) || !seen.insert(id) {
                continue;
            }
            let Ok(object) = self.document.get_object(id) else {
                continue;
            };

            let mut object = object.clone();
            if kept_set.contains(&id) {
                if let Object::Dictionary(page) = &mut object {
                    page.remove(b"Parent");
                }
            }
            collect_references(&object, &mut pending);

            if kept_set.contains(&id) {
                if let Object::Dictionary(page) = &mut object {
                    page.set("Parent", pages_id);
                }
            }
            subset.objects.insert(id, object);
        }

        let kids: Vec<Object> = kept.into_iter().map(Object::Reference).collect();
        subset.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );
        subset.objects.insert(
            catalog_id,
            Object::Dictionary(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            }),
        );
        subset.trailer.set("Root", catalog_id);
        subset.max_id = catalog_id.0;

        Ok(subset)
    }
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, out);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, out);
            }
        }
        _ => {}
    }
}

/// `name` 是否形如 `{student}_Q{n}.pdf` 或 `{student}_Q{n}_drawing.pdf`
fn is_chunk_file_name(student_id: &str, name: &str) -> bool {
    let Some(rest) = name
        .strip_prefix(student_id)
        .and_then(|r| r.strip_prefix("_Q"))
    else {
        return false;
    };
    let number = rest
        .strip_suffix("_drawing.pdf")
        .or_else(|| rest.strip_suffix(".pdf"));

    matches!(number, Some(n) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// 删除上次运行留下、本次未再生成的分块文件
fn remove_stale_chunks(dir: &Path, student_id: &str, written: &[WrittenChunk]) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let current: BTreeSet<&str> = written.iter().map(|w| w.file_name.as_str()).collect();

    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if current.contains(name.as_str()) || !is_chunk_file_name(student_id, &name) {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => log::info!("[Write] {}: 删除旧文件 {}", student_id, path.display()),
            Err(e) => log::warn!(
                "[Write] {}: 旧文件 {} 删除失败: {}",
                student_id,
                path.display(),
                e
            ),
        }
    }
}

/// 将一个学生的所有分块写入 `dir`，目录不存在时创建
///
/// 同一目录中上次运行遗留的分块文件会被删除。
pub fn write_chunks(
    merged: &MergedDocument,
    chunks: &[Chunk],
    student_id: &str,
    dir: &Path,
) -> Result<Vec<WrittenChunk>, WriteError> {
    fs::create_dir_all(dir).map_err(|source| WriteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let writer = ChunkWriter::new(merged)?;
    let mut written = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let file_name = chunk.file_name(student_id);
        let path = dir.join(&file_name);
        writer.write(chunk, &path)?;

        log::info!(
            "[Write] {} Q{}: {} 页 -> {}",
            student_id,
            chunk.number(),
            chunk.len(),
            path.display()
        );

        written.push(WrittenChunk {
            path,
            file_name,
            has_drawing: chunk.has_drawing(),
            page_count: chunk.len(),
        });
    }

    remove_stale_chunks(dir, student_id, &written);

    Ok(written)
}
