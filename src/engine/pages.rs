//! Page-level document operations and metadata.
//!
//! These work on whole pages and never look inside content streams:
//! merge documents, delete or extract pages, and edit the Info
//! dictionary.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors.
const INHERITABLE: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Document metadata (Info dictionary).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    /// Document title
    pub title: Option<String>,
    /// Document author
    pub author: Option<String>,
    /// Document subject
    pub subject: Option<String>,
    /// Document keywords (comma-separated)
    pub keywords: Option<String>,
    /// Creator application
    pub creator: Option<String>,
    /// PDF producer
    pub producer: Option<String>,
    /// Modification date (PDF date format)
    pub mod_date: Option<String>,
}

impl DocumentInfo {
    /// Create a new empty DocumentInfo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the keywords.
    pub fn keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    /// Set the creator.
    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Set the producer.
    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 6] {
        [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Keywords", &self.keywords),
            ("Creator", &self.creator),
            ("Producer", &self.producer),
        ]
    }

    /// Read the Info dictionary of a document.
    pub fn read(doc: &Document) -> Self {
        let mut info = Self::default();
        let Some(dict) = info_dictionary(doc) else {
            return info;
        };
        let text = |key: &[u8]| match dict.get(key) {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        };
        info.title = text(b"Title");
        info.author = text(b"Author");
        info.subject = text(b"Subject");
        info.keywords = text(b"Keywords");
        info.creator = text(b"Creator");
        info.producer = text(b"Producer");
        info.mod_date = text(b"ModDate");
        info
    }

    /// Write the set fields into the document's Info dictionary and stamp
    /// `/ModDate` with the current time.
    pub fn apply(&self, doc: &mut Document) -> Result<()> {
        let mut dict = info_dictionary(doc).cloned().unwrap_or_else(Dictionary::new);
        for (key, value) in self.fields() {
            if let Some(value) = value {
                dict.set(key, Object::String(encode_text_string(value), lopdf::StringFormat::Literal));
            }
        }
        dict.set(
            "ModDate",
            Object::string_literal(format_pdf_date(chrono::Local::now())),
        );
        let info_id = match doc.trailer.get(b"Info").and_then(Object::as_reference) {
            Ok(id) => id,
            Err(_) => doc.new_object_id(),
        };
        doc.objects.insert(info_id, Object::Dictionary(dict));
        doc.trailer.set("Info", info_id);
        log::debug!("Updated document info {:?}", info_id);
        Ok(())
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Format a timestamp as a PDF date (`D:YYYYMMDDHHmmSS+HH'mm'`).
pub fn format_pdf_date<Tz: chrono::TimeZone>(time: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let offset = time.format("%z").to_string();
    let (hours, minutes) = offset.split_at(offset.len().saturating_sub(2));
    format!("D:{}{}'{}'", time.format("%Y%m%d%H%M%S"), hours, minutes)
}

/// PDF text strings are PDFDocEncoding or UTF-16BE with a byte order mark.
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn encode_text_string(text: &str) -> Vec<u8> {
    if text.chars().all(|c| (c as u32) < 0x80) {
        text.as_bytes().to_vec()
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        bytes
    }
}

/// Parse a 1-based page selection like `1,3,5-7` into 0-based indices.
///
/// Indices keep the order given; duplicates are dropped.
pub fn parse_page_ranges(selection: &str, page_count: usize) -> Result<Vec<usize>> {
    let mut pages = Vec::new();
    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_page_number(start)?, parse_page_number(end)?),
            None => {
                let page = parse_page_number(part)?;
                (page, page)
            },
        };
        if start > end {
            return Err(Error::InvalidArgument(format!("Page range '{}' is reversed", part)));
        }
        if end > page_count {
            return Err(Error::InvalidPage {
                page: end - 1,
                count: page_count,
            });
        }
        for page in start..=end {
            if !pages.contains(&(page - 1)) {
                pages.push(page - 1);
            }
        }
    }
    if pages.is_empty() {
        return Err(Error::InvalidArgument(format!("No pages in selection '{}'", selection)));
    }
    Ok(pages)
}

fn parse_page_number(text: &str) -> Result<usize> {
    match text.trim().parse::<usize>() {
        Ok(page) if page >= 1 => Ok(page),
        _ => Err(Error::InvalidArgument(format!("Invalid page number '{}'", text.trim()))),
    }
}

/// Delete pages (0-based).
pub fn delete_pages(doc: &mut Document, pages: &[usize]) -> Result<()> {
    let count = doc.get_pages().len();
    if let Some(&page) = pages.iter().find(|&&page| page >= count) {
        return Err(Error::InvalidPage { page, count });
    }
    let mut numbers: Vec<u32> = pages.iter().map(|&page| page as u32 + 1).collect();
    numbers.sort_unstable();
    numbers.dedup();
    if numbers.len() == count {
        return Err(Error::InvalidArgument("Cannot delete every page of a document".to_string()));
    }
    doc.delete_pages(&numbers);
    doc.prune_objects();
    log::info!("Deleted {} page(s), {} remain", numbers.len(), count - numbers.len());
    Ok(())
}

/// Copy of the document containing only `pages` (0-based).
pub fn extract_pages(doc: &Document, pages: &[usize]) -> Result<Document> {
    let count = doc.get_pages().len();
    if let Some(&page) = pages.iter().find(|&&page| page >= count) {
        return Err(Error::InvalidPage { page, count });
    }
    let remove: Vec<usize> = (0..count).filter(|page| !pages.contains(page)).collect();
    let mut extracted = doc.clone();
    if !remove.is_empty() {
        delete_pages(&mut extracted, &remove)?;
    }
    Ok(extracted)
}

/// Split a document into one document per page group.
pub fn split(doc: &Document, groups: &[Vec<usize>]) -> Result<Vec<Document>> {
    groups.iter().map(|group| extract_pages(doc, group)).collect()
}

/// Merge documents in order into a new document.
///
/// Object ids of every input are shifted past the previous one, inherited
/// page attributes are copied onto each page and all pages hang off a
/// single new page tree.
pub fn merge(documents: Vec<Document>) -> Result<Document> {
    if documents.is_empty() {
        return Err(Error::InvalidArgument("Nothing to merge".to_string()));
    }
    let mut merged = Document::with_version("1.5");
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, page_id) in doc.get_pages() {
            let mut page = doc.get_dictionary(page_id)?.clone();
            for key in INHERITABLE {
                if page.has(key) {
                    continue;
                }
                if let Some(value) = inherited(&doc, page_id, key) {
                    page.set(key.to_vec(), value);
                }
            }
            pages.push((page_id, page));
        }
        for (id, object) in doc.objects {
            let tree_node = match &object {
                Object::Dictionary(dict) => matches!(
                    dict.get(b"Type"),
                    Ok(Object::Name(name)) if name == b"Pages" || name == b"Catalog" || name == b"Page"
                ),
                _ => false,
            };
            if !tree_node {
                objects.insert(id, object);
            }
        }
    }

    let pages_id: ObjectId = (max_id, 0);
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = kids.len() as i64;
    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        objects.insert(id, Object::Dictionary(page));
    }
    objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id: ObjectId = (max_id + 1, 0);
    objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );

    merged.objects = objects;
    merged.max_id = max_id + 1;
    merged.trailer.set("Root", catalog_id);
    merged.renumber_objects();
    log::info!("Merged {} page(s)", count);
    Ok(merged)
}

/// Load a document, refusing encrypted files.
pub fn load(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let doc = Document::load(path)?;
    if doc.is_encrypted() {
        return Err(Error::EncryptedDocument);
    }
    Ok(doc)
}

/// Compress and write a document.
pub fn save(doc: &mut Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    doc.compress();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer)?;
    writer.flush()?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Merge PDF files in order into `output`; returns the page count.
pub fn merge_files<P: AsRef<Path>>(inputs: &[P], output: impl AsRef<Path>) -> Result<usize> {
    let documents = inputs.iter().map(|path| load(path)).collect::<Result<Vec<_>>>()?;
    let mut merged = merge(documents)?;
    let count = merged.get_pages().len();
    save(&mut merged, output)?;
    Ok(count)
}

/// Delete pages (0-based) of `input` into `output`; returns the remaining page count.
pub fn delete_pages_file(input: impl AsRef<Path>, pages: &[usize], output: impl AsRef<Path>) -> Result<usize> {
    let mut doc = load(input)?;
    delete_pages(&mut doc, pages)?;
    let count = doc.get_pages().len();
    save(&mut doc, output)?;
    Ok(count)
}

/// Write each page group of `input` to `{prefix}_{n}.pdf` (1-based `n`).
pub fn split_file(input: impl AsRef<Path>, groups: &[Vec<usize>], prefix: &str) -> Result<Vec<PathBuf>> {
    let doc = load(input)?;
    let mut written = Vec::with_capacity(groups.len());
    for (index, mut part) in split(&doc, groups)?.into_iter().enumerate() {
        let path = PathBuf::from(format!("{}_{}.pdf", prefix, index + 1));
        save(&mut part, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Apply metadata changes to `input` and write `output`.
pub fn edit_metadata_file(input: impl AsRef<Path>, info: &DocumentInfo, output: impl AsRef<Path>) -> Result<()> {
    let mut doc = load(input)?;
    info.apply(&mut doc)?;
    save(&mut doc, output)
}

fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?.get(b"Parent").ok()?.as_reference().ok()?;
    for _ in 0..64 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;

    fn document(page_count: usize, label: &str) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids = Vec::new();
        for i in 0..page_count {
            let content = format!("BT /F1 12 Tf 72 700 Td ({} {}) Tj ET", label, i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_parse_page_ranges() {
        assert_eq!(parse_page_ranges("1,3,5-7", 10).unwrap(), vec![0, 2, 4, 5, 6]);
        assert_eq!(parse_page_ranges(" 2 , 2-3 ", 3).unwrap(), vec![1, 2]);
        assert!(matches!(parse_page_ranges("0", 3), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_page_ranges("3-2", 3), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_page_ranges("4", 3), Err(Error::InvalidPage { page: 3, count: 3 })));
        assert!(parse_page_ranges("", 3).is_err());
    }

    #[test]
    fn test_merge_page_count_and_inheritance() {
        let merged = merge(vec![document(2, "A"), document(3, "B")]).unwrap();
        let pages = merged.get_pages();
        assert_eq!(pages.len(), 5);
        for page_id in pages.values() {
            let page = merged.get_dictionary(*page_id).unwrap();
            assert!(page.has(b"MediaBox"));
            assert!(page.has(b"Resources"));
        }
    }

    #[test]
    fn test_merge_nothing() {
        assert!(matches!(merge(Vec::new()), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_delete_pages() {
        let mut doc = document(4, "A");
        delete_pages(&mut doc, &[0, 2]).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        assert!(matches!(delete_pages(&mut doc, &[5]), Err(Error::InvalidPage { page: 5, count: 2 })));
        assert!(matches!(delete_pages(&mut doc, &[0, 1]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_split_groups() {
        let doc = document(5, "A");
        let parts = split(&doc, &[vec![0, 1], vec![4]]).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].get_pages().len(), 2);
        assert_eq!(parts[1].get_pages().len(), 1);
        // The source is untouched
        assert_eq!(doc.get_pages().len(), 5);
    }

    #[test]
    fn test_document_info_round_trip() {
        let mut doc = document(1, "A");
        DocumentInfo::new()
            .title("Certidão")
            .author("Registro Civil")
            .apply(&mut doc)
            .unwrap();
        let info = DocumentInfo::read(&doc);
        assert_eq!(info.title.as_deref(), Some("Certidão"));
        assert_eq!(info.author.as_deref(), Some("Registro Civil"));
        assert!(info.mod_date.as_deref().is_some_and(|d| d.starts_with("D:")));
        assert!(info.subject.is_none());
    }

    #[test]
    fn test_format_pdf_date() {
        use chrono::TimeZone;
        let time = chrono::FixedOffset::east_opt(-3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 17, 9, 30, 0)
            .unwrap();
        assert_eq!(format_pdf_date(time), "D:20240517093000-03'00'");
    }

    #[test]
    fn test_file_operations() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        save(&mut document(2, "A"), &a).unwrap();
        save(&mut document(1, "B"), &b).unwrap();

        let merged = dir.path().join("merged.pdf");
        assert_eq!(merge_files(&[&a, &b], &merged).unwrap(), 3);
        assert_eq!(load(&merged).unwrap().get_pages().len(), 3);

        let trimmed = dir.path().join("trimmed.pdf");
        assert_eq!(delete_pages_file(&merged, &[1], &trimmed).unwrap(), 2);

        let prefix = dir.path().join("part");
        let parts = split_file(&merged, &[vec![0], vec![1, 2]], prefix.to_str().unwrap()).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(load(&parts[1]).unwrap().get_pages().len(), 2);

        let titled = dir.path().join("titled.pdf");
        edit_metadata_file(&a, &DocumentInfo::new().title("Report"), &titled).unwrap();
        assert_eq!(DocumentInfo::read(&load(&titled).unwrap()).title.as_deref(), Some("Report"));
    }
}
