//! 将学生的扫描 PDF 合并为一份文档

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use slicer_core::{MergedDocument, Page};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::MergeError;

/// 页面可从页树祖先节点继承的属性
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// 页树嵌套超过该深度视为循环
const MAX_TREE_DEPTH: usize = 64;

/// 已解析的源 PDF
pub struct SourceDocument {
    name: String,
    document: Document,
}

impl SourceDocument {
    pub fn load(path: &Path) -> Result<Self, MergeError> {
        let document = Document::load(path).map_err(|source| MergeError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self { name, document })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }
}

/// 列出 `dir` 下的 PDF 文件，按文件名排序
pub fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    let entries = fs::read_dir(dir).map_err(|source| MergeError::Io {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();

    if paths.is_empty() {
        return Err(MergeError::NoInput {
            dir: dir.to_path_buf(),
        });
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// 合并 `dir` 中的所有 PDF，遇到无法读取的文件即失败
#[cfg(test)]
pub(crate) fn merge_dir(dir: &Path) -> Result<MergedDocument, MergeError> {
    let sources = discover_sources(dir)?
        .iter()
        .map(|p| SourceDocument::load(p))
        .collect::<Result<Vec<_>, _>>()?;
    merge_sources(sources)
}

/// 按给定顺序拼接 `sources` 的页面
pub fn merge_sources(sources: Vec<SourceDocument>) -> Result<MergedDocument, MergeError> {
    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut pages = Vec::new();
    let mut page_objects: Vec<(ObjectId, Dictionary)> = Vec::new();

    for source in sources {
        log::info!("[Merge] {}: {} 页", source.name(), source.page_count());
        let SourceDocument { name, mut document } = source;

        document.renumber_objects_with(next_id);
        next_id = document.max_id + 1;

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();

        for (source_index, &page_id) in page_ids.iter().enumerate() {
            let mut page = document
                .get_dictionary(page_id)
                .map_err(|e| {
                    MergeError::Assemble(format!("{} page {}: {}", name, source_index + 1, e))
                })?
                .clone();
            inherit_attributes(&document, &mut page);
            page_objects.push((page_id, page));
            pages.push(Page::new(name.as_str(), source_index, pages.len()));
        }

        // 源文档的目录和页树由新的单一页树替代
        let mut skipped: BTreeSet<ObjectId> = page_ids.into_iter().collect();
        skipped.extend(document.objects.iter().filter_map(|(id, object)| {
            matches!(type_name(object), Some(b"Catalog") | Some(b"Pages")).then_some(*id)
        }));

        for (id, object) in document.objects {
            if !skipped.contains(&id) {
                merged.objects.insert(id, object);
            }
        }
    }

    let pages_id = (next_id, 0);
    let catalog_id = (next_id + 1, 0);

    let mut kids = Vec::with_capacity(page_objects.len());
    for (id, mut page) in page_objects {
        page.set("Parent", pages_id);
        merged.objects.insert(id, Object::Dictionary(page));
        kids.push(Object::Reference(id));
    }

    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);
    merged.max_id = catalog_id.0;
    merged.prune_objects();

    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|e| MergeError::Assemble(e.to_string()))?;

    Ok(MergedDocument::new(pages, bytes))
}

fn type_name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Dictionary(dict) => dict.get(b"Type").and_then(Object::as_name).ok(),
        _ => None,
    }
}

/// 将页面从页树祖先继承的属性复制到页面本身，合并后祖先节点不再保留
fn inherit_attributes(document: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(id) = parent {
        if depth >= MAX_TREE_DEPTH {
            log::warn!("[Merge] 页树深度超过 {} 层", MAX_TREE_DEPTH);
            break;
        }
        let Ok(node) = document.get_dictionary(id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{page_widths, pdf_with_widths};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_merge_keeps_file_name_then_page_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b_scan.pdf", &pdf_with_widths(&[201, 202], false));
        write(&dir, "a_scan.pdf", &pdf_with_widths(&[101, 102, 103], false));
        write(&dir, "c_scan.PDF", &pdf_with_widths(&[301], false));
        write(&dir, "notes.txt", b"not a pdf");

        let merged = merge_dir(dir.path()).unwrap();

        assert_eq!(merged.page_count(), 6);
        assert_eq!(
            page_widths(merged.bytes()),
            vec![101, 102, 103, 201, 202, 301]
        );

        let pages = merged.pages();
        assert_eq!(pages[0], Page::new("a_scan.pdf", 0, 0));
        assert_eq!(pages[3], Page::new("b_scan.pdf", 0, 3));
        assert_eq!(pages[5], Page::new("c_scan.PDF", 0, 5));
        let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_merge_copies_inherited_media_box() {
        let dir = TempDir::new().unwrap();
        write(&dir, "scan.pdf", &pdf_with_widths(&[420, 420], true));

        let merged = merge_dir(dir.path()).unwrap();
        assert_eq!(page_widths(merged.bytes()), vec![420, 420]);
    }

    #[test]
    fn test_empty_folder_is_no_input() {
        let dir = TempDir::new().unwrap();
        write(&dir, "readme.md", b"# nothing here");

        let err = merge_dir(dir.path()).unwrap_err();
        assert!(matches!(err, MergeError::NoInput { .. }));
    }

    #[test]
    fn test_corrupt_file_names_the_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.pdf", &pdf_with_widths(&[100], false));
        let broken = write(&dir, "b.pdf", b"%PDF-1.4 garbage");

        match merge_dir(dir.path()) {
            Err(MergeError::Corrupt { path, .. }) => assert_eq!(path, broken),
            other => panic!("expected corrupt input, got {:?}", other.map(|m| m.page_count())),
        }
    }

    #[test]
    fn test_source_document_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "exam.pdf", &pdf_with_widths(&[1, 2, 3], false));

        let source = SourceDocument::load(&path).unwrap();
        assert_eq!(source.name(), "exam.pdf");
        assert_eq!(source.page_count(), 3);
    }
}
