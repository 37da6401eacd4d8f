//! `lopdf`-backed [`DocumentEngine`].

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::content::{blank_operation, group_runs, interpret_page};
use super::fonts::{
    embed_program, encode_standard, name_entry, number, resolve, standard_font_dictionary,
    stream_bytes, PageFont,
};
use super::{DocumentEngine, FontResource, TextPlacement};
use crate::elements::{text_box, Color, TextRun};
use crate::error::{Error, Result};
use crate::fonts::{same_font_name, FontDescriptor, FontFlags, FontSource};
use crate::geometry::Rect;

/// Growth of the redaction box before testing glyph centres against it.
const REDACTION_SLACK: f32 = 0.01;

/// Deepest `/Parent` chain followed when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Operators that change the graphics state outside of `q`/`Q`.
const STATE_OPERATORS: &[&str] = &[
    "cm", "w", "J", "j", "M", "d", "ri", "i", "gs", "CS", "cs", "SC", "SCN", "sc", "scn", "G",
    "g", "RG", "rg", "K", "k", "W", "W*",
];

/// A PDF document opened for editing.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    /// Font program streams already embedded, by (base font, program size)
    programs: HashMap<(String, usize), ObjectId>,
}

/// Snapshot of a [`PdfDocument`].
#[derive(Debug, Clone)]
pub struct PdfCheckpoint {
    doc: Document,
    programs: HashMap<(String, usize), ObjectId>,
}

impl PdfDocument {
    /// Open a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = Document::load(path)?;
        log::info!("Opened {}", path.display());
        Self::from_document(doc)
    }

    /// Open a PDF held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_document(Document::load_mem(bytes)?)
    }

    /// Wrap a loaded document; encrypted documents are refused.
    pub fn from_document(doc: Document) -> Result<Self> {
        if doc.is_encrypted() || doc.trailer.get(b"Encrypt").is_ok() {
            return Err(Error::EncryptedDocument);
        }
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        log::debug!("Document has {} page(s)", page_ids.len());
        Ok(Self {
            doc,
            page_ids,
            programs: HashMap::new(),
        })
    }

    /// Underlying document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Take the underlying document.
    pub fn into_document(self) -> Document {
        self.doc
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.page_ids.get(page).copied().ok_or(Error::InvalidPage {
            page,
            count: self.page_ids.len(),
        })
    }

    /// Look up a page attribute, walking up the page tree.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let dict = self.doc.get_dictionary(current).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        }
        None
    }

    fn page_resources(&self, page_id: ObjectId) -> Dictionary {
        match self.inherited(page_id, b"Resources").map(|obj| resolve(&self.doc, obj)) {
            Some(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        }
    }

    fn page_font_entries(&self, page_id: ObjectId) -> Vec<(String, Object)> {
        let resources = self.page_resources(page_id);
        match resources.get(b"Font").map(|obj| resolve(&self.doc, obj)) {
            Ok(Object::Dictionary(fonts)) => fonts
                .iter()
                .map(|(key, value)| (String::from_utf8_lossy(key).into_owned(), value.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Fonts of a page by resource name.
    pub fn page_fonts(&self, page: usize) -> Result<HashMap<String, PageFont>> {
        let page_id = self.page_id(page)?;
        Ok(self.fonts_of(page_id))
    }

    fn fonts_of(&self, page_id: ObjectId) -> HashMap<String, PageFont> {
        let mut fonts = HashMap::new();
        for (key, obj) in self.page_font_entries(page_id) {
            match PageFont::load(&self.doc, &key, &obj) {
                Ok(font) => {
                    fonts.insert(key, font);
                },
                Err(e) => log::warn!("Skipping font /{}: {}", key, e),
            }
        }
        fonts
    }

    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page = self.doc.get_dictionary(page_id)?;
        let contents = match page.get(b"Contents") {
            Ok(obj) => obj,
            Err(_) => return Ok(Vec::new()),
        };
        match resolve(&self.doc, contents) {
            Object::Stream(stream) => stream_bytes(stream),
            Object::Array(parts) => {
                let mut content = Vec::new();
                for part in parts {
                    let stream = resolve(&self.doc, part).as_stream()?;
                    if !content.is_empty() {
                        content.push(b'\n');
                    }
                    content.extend_from_slice(&stream_bytes(stream)?);
                }
                Ok(content)
            },
            _ => Err(Error::Backend("/Contents is not a stream or array".to_string())),
        }
    }

    fn page_operations(&self, page_id: ObjectId) -> Result<Vec<Operation>> {
        let bytes = self.page_content(page_id)?;
        Ok(Content::decode(&bytes)?.operations)
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        match self.doc.get_object_mut(page_id)? {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(Error::Backend("Page object is not a dictionary".to_string())),
        }
    }

    /// Replace the page content with `operations` followed by `appended`.
    ///
    /// The existing operations are wrapped in `q`/`Q` when they leave
    /// graphics state behind, so appended drawing starts from the default
    /// state.
    fn write_operations(
        &mut self,
        page_id: ObjectId,
        operations: Vec<Operation>,
        appended: Vec<Operation>,
    ) -> Result<()> {
        let mut all = Vec::with_capacity(operations.len() + appended.len() + 2);
        if leaks_state(&operations) {
            all.push(Operation::new("q", vec![]));
            all.extend(operations);
            all.push(Operation::new("Q", vec![]));
        } else {
            all.extend(operations);
        }
        all.extend(appended);
        let bytes = Content { operations: all }.encode()?;
        let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), bytes));
        self.page_dict_mut(page_id)?.set("Contents", stream_id);
        Ok(())
    }

    fn append_operations(&mut self, page_id: ObjectId, appended: Vec<Operation>) -> Result<()> {
        let operations = self.page_operations(page_id)?;
        self.write_operations(page_id, operations, appended)
    }

    /// Add `font_id` to the page's font resources and return its key.
    ///
    /// The page gets its own copy of inherited resources; an existing key
    /// for the same font object is reused.
    fn register_font(&mut self, page_id: ObjectId, font_id: ObjectId) -> Result<String> {
        let mut resources = self.page_resources(page_id);
        let mut fonts = match resources.get(b"Font").map(|obj| resolve(&self.doc, obj)) {
            Ok(Object::Dictionary(fonts)) => fonts.clone(),
            _ => Dictionary::new(),
        };
        if let Some((key, _)) = fonts
            .iter()
            .find(|(_, value)| matches!(value, Object::Reference(id) if *id == font_id))
        {
            return Ok(String::from_utf8_lossy(key).into_owned());
        }
        let mut n = 1;
        while fonts.has(format!("FK{}", n).as_bytes()) {
            n += 1;
        }
        let key = format!("FK{}", n);
        fonts.set(key.clone(), Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));
        self.page_dict_mut(page_id)?.set("Resources", Object::Dictionary(resources));
        Ok(key)
    }

    fn describe_font(&self, key: &str, obj: &Object) -> Option<FontDescriptor> {
        let object_id = match obj {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let dict = resolve(&self.doc, obj).as_dict().ok()?;
        let subtype = name_entry(&self.doc, dict, b"Subtype");
        let name = if subtype.as_deref() == Some("Type3") {
            format!("Type3:{}", key)
        } else {
            name_entry(&self.doc, dict, b"BaseFont").unwrap_or_else(|| key.to_string())
        };
        let mut descriptor = FontDescriptor::new(name);
        descriptor.object_id = object_id;

        match dict.get(b"Encoding").map(|obj| resolve(&self.doc, obj)) {
            Ok(Object::Name(encoding)) => {
                descriptor.encoding = Some(String::from_utf8_lossy(encoding).into_owned());
            },
            Ok(Object::Dictionary(encoding)) => {
                descriptor.encoding = Some(
                    name_entry(&self.doc, encoding, b"BaseEncoding")
                        .unwrap_or_else(|| "Custom".to_string()),
                );
            },
            _ => {},
        }

        let font_descriptor = if subtype.as_deref() == Some("Type0") {
            match dict.get(b"DescendantFonts").map(|obj| resolve(&self.doc, obj)) {
                Ok(Object::Array(fonts)) => fonts
                    .first()
                    .and_then(|font| resolve(&self.doc, font).as_dict().ok())
                    .and_then(|font| font.get(b"FontDescriptor").ok()),
                _ => None,
            }
        } else {
            dict.get(b"FontDescriptor").ok()
        }
        .and_then(|obj| resolve(&self.doc, obj).as_dict().ok());

        if let Some(fd) = font_descriptor {
            let flags = fd
                .get(b"Flags")
                .ok()
                .and_then(|obj| number(resolve(&self.doc, obj)))
                .map(|bits| FontFlags::from_bits_truncate(bits as u32))
                .unwrap_or_else(FontFlags::empty);
            let weight = fd
                .get(b"FontWeight")
                .ok()
                .and_then(|obj| number(resolve(&self.doc, obj)))
                .unwrap_or(0.0);
            let italic_angle = fd
                .get(b"ItalicAngle")
                .ok()
                .and_then(|obj| number(resolve(&self.doc, obj)))
                .unwrap_or(0.0);
            descriptor.flags = flags;
            descriptor.is_bold |= flags.contains(FontFlags::FORCE_BOLD) || weight >= 600.0;
            descriptor.is_italic |= flags.contains(FontFlags::ITALIC) || italic_angle.abs() > 0.5;

            let program = [&b"FontFile2"[..], b"FontFile3", b"FontFile"]
                .iter()
                .filter_map(|key| fd.get(key).ok())
                .find_map(|obj| resolve(&self.doc, obj).as_stream().ok())
                .and_then(|stream| stream_bytes(stream).ok());
            if let Some(bytes) = program {
                descriptor.source = FontSource::Embedded(Arc::new(bytes));
            }
        }
        Some(descriptor)
    }
}

/// Whether operations change graphics state outside any `q`/`Q` pair.
fn leaks_state(operations: &[Operation]) -> bool {
    let mut depth: i32 = 0;
    for op in operations {
        match op.operator.as_str() {
            "q" => depth += 1,
            "Q" => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            },
            other if depth == 0 && STATE_OPERATORS.contains(&other) => return true,
            _ => {},
        }
    }
    depth != 0
}

/// Operators drawing `codes` with font `key` at `placement`.
fn text_operations(key: &str, placement: &TextPlacement, codes: Vec<u8>) -> Vec<Operation> {
    let (sin, cos) = placement.rotation.to_radians().sin_cos();
    let Color { r, g, b } = placement.color;
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(key.as_bytes().to_vec()), placement.font_size.into()],
        ),
        Operation::new("Tc", vec![Object::Integer(0)]),
        Operation::new("Tw", vec![Object::Integer(0)]),
        Operation::new("Tz", vec![Object::Integer(100)]),
        Operation::new("Ts", vec![Object::Integer(0)]),
        Operation::new(
            "Tm",
            vec![
                cos.into(),
                sin.into(),
                (-sin).into(),
                cos.into(),
                placement.x.into(),
                placement.y.into(),
            ],
        ),
        Operation::new("Tj", vec![Object::String(codes, StringFormat::Hexadecimal)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

impl DocumentEngine for PdfDocument {
    type Checkpoint = PdfCheckpoint;

    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn extract_page_runs(&self, page: usize) -> Result<Vec<TextRun>> {
        let page_id = self.page_id(page)?;
        let operations = self.page_operations(page_id)?;
        let fonts = self.fonts_of(page_id);
        let shown = interpret_page(&operations, &fonts);
        Ok(group_runs(page, &shown))
    }

    fn extract_fonts(&self) -> Result<Vec<FontDescriptor>> {
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut descriptors = Vec::new();
        for &page_id in &self.page_ids {
            for (key, obj) in self.page_font_entries(page_id) {
                if let Object::Reference(id) = obj {
                    if !seen.insert(id) {
                        continue;
                    }
                }
                if let Some(descriptor) = self.describe_font(&key, &obj) {
                    descriptors.push(descriptor);
                }
            }
        }
        Ok(descriptors)
    }

    fn redact(&mut self, page: usize, bbox: Rect, fill: Color) -> Result<()> {
        let page_id = self.page_id(page)?;
        let operations = self.page_operations(page_id)?;
        let fonts = self.fonts_of(page_id);
        let reach = bbox.expand(REDACTION_SLACK);

        let hits: HashMap<usize, Option<f32>> = interpret_page(&operations, &fonts)
            .into_iter()
            .filter(|shown| !shown.text.is_empty())
            .filter(|shown| {
                // Only operators whose glyphs sit inside the box; a neighbour
                // line whose box merely overlaps stays.
                let glyphs = text_box(
                    shown.origin.x,
                    shown.origin.y,
                    shown.advance,
                    shown.font_size,
                    shown.rotation,
                );
                reach.contains(&glyphs.center())
            })
            .map(|shown| (shown.op_index, shown.blank_kern))
            .collect();

        if hits.is_empty() {
            return Err(Error::RedactionFailed {
                page,
                x: bbox.x,
                y: bbox.y,
                reason: "no text is shown inside the box".to_string(),
            });
        }

        let mut redacted = Vec::with_capacity(operations.len());
        for (index, op) in operations.into_iter().enumerate() {
            match hits.get(&index) {
                Some(kern) => redacted.extend(blank_operation(&op, *kern)),
                None => redacted.push(op),
            }
        }

        let Color { r, g, b } = fill;
        let paint = vec![
            Operation::new("q", vec![]),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new(
                "re",
                vec![bbox.x.into(), bbox.y.into(), bbox.width.into(), bbox.height.into()],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ];
        self.write_operations(page_id, redacted, paint)?;
        log::debug!("Redacted {} text operator(s) on page {}", hits.len(), page + 1);
        Ok(())
    }

    fn insert_text(
        &mut self,
        page: usize,
        placement: &TextPlacement,
        content: &str,
        font: &FontResource,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let (font_id, codes) = match font {
            FontResource::Program { base_font, program } => {
                let key = (base_font.clone(), program.data().len());
                let embedded = embed_program(
                    &mut self.doc,
                    base_font,
                    program,
                    content,
                    self.programs.get(&key).copied(),
                )?;
                self.programs.insert(key, embedded.file_id);
                (embedded.font_id, embedded.codes)
            },
            FontResource::Standard(standard) => {
                let codes = encode_standard(*standard, content)?;
                (self.doc.add_object(standard_font_dictionary(*standard)), codes)
            },
            FontResource::Document { object_id, .. } => {
                let font = PageFont::load(&self.doc, "", &Object::Reference(*object_id))?;
                (*object_id, font.encode(content)?)
            },
        };
        let key = self.register_font(page_id, font_id)?;
        self.append_operations(page_id, text_operations(&key, placement, codes))?;
        log::debug!(
            "Inserted {} character(s) with /{} ({}) on page {}",
            content.chars().count(),
            key,
            font.base_font(),
            page + 1
        );
        Ok(())
    }

    fn rewrite_text(
        &mut self,
        page: usize,
        placement: &TextPlacement,
        content: &str,
        font_name: &str,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let fonts = self.fonts_of(page_id);
        let font = match fonts.get(font_name) {
            Some(font) => font,
            None => {
                let mut candidates: Vec<&PageFont> = fonts
                    .values()
                    .filter(|font| same_font_name(&font.base_font, font_name))
                    .collect();
                candidates.sort_by(|a, b| a.resource_name.cmp(&b.resource_name));
                candidates
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::FontNotInDocument(font_name.to_string()))?
            },
        };
        let codes = font.encode(content)?;
        let key = font.resource_name.clone();
        self.append_operations(page_id, text_operations(&key, placement, codes))?;
        log::debug!("Rewrote text with existing font /{} on page {}", key, page + 1);
        Ok(())
    }

    fn checkpoint(&self) -> PdfCheckpoint {
        PdfCheckpoint {
            doc: self.doc.clone(),
            programs: self.programs.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: PdfCheckpoint) {
        self.doc = checkpoint.doc;
        self.programs = checkpoint.programs;
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        log::info!("Saved {}", path.display());
        Ok(())
    }
}

impl PdfDocument {
    /// Serialize the document, dropping unreferenced objects.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        let pruned = self.doc.prune_objects();
        let objects = &self.doc.objects;
        self.programs.retain(|_, id| objects.contains_key(id));
        self.doc.compress();
        self.doc.save_to(writer)?;
        log::debug!("Wrote document ({} unreferenced object(s) dropped)", pruned.len());
        Ok(())
    }

    /// Serialize to bytes.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::StandardFont;
    use lopdf::dictionary;

    fn single_page(content: &str, font: Dictionary) -> PdfDocument {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(font);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1i64,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        PdfDocument::from_document(doc).unwrap()
    }

    fn arial() -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "ArialMT",
            "Encoding" => "WinAnsiEncoding",
        }
    }

    #[test]
    fn test_extract_runs_with_inherited_resources() {
        let doc = single_page("BT /F1 12 Tf 72 700 Td (Hello World) Tj ET", arial());
        let runs = doc.extract_page_runs(0).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].content, "Hello World");
        assert_eq!(runs[0].font_name, "ArialMT");
        assert_eq!(runs[0].font_resource, "F1");
        assert_eq!((runs[0].x, runs[0].y, runs[0].font_size), (72.0, 700.0, 12.0));
    }

    #[test]
    fn test_invalid_page() {
        let doc = single_page("", arial());
        assert!(matches!(doc.extract_page_runs(3), Err(Error::InvalidPage { page: 3, count: 1 })));
    }

    #[test]
    fn test_redact_removes_only_covered_text() {
        let mut doc = single_page(
            "BT /F1 12 Tf 72 700 Td (Keep) Tj ET BT /F1 12 Tf 72 600 Td (Remove) Tj ET",
            arial(),
        );
        let target = doc.extract_page_runs(0).unwrap()[1].clone();
        doc.redact(0, target.bbox(), Color::white()).unwrap();
        let runs = doc.extract_page_runs(0).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].content, "Keep");
    }

    #[test]
    fn test_redact_keeps_tightly_spaced_neighbour() {
        let mut doc = single_page(
            "BT /F1 12 Tf 72 700 Td (FIRST LINE) Tj 0 -11 Td (SECOND LINE) Tj ET",
            arial(),
        );
        let before = doc.extract_page_runs(0).unwrap();
        assert_eq!(before.len(), 2);
        assert!(before[0].bbox().intersects(&before[1].bbox()));

        doc.redact(0, before[0].bbox(), Color::white()).unwrap();
        let runs = doc.extract_page_runs(0).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].content, "SECOND LINE");
        assert_eq!(runs[0].y, 689.0);
    }

    #[test]
    fn test_redact_empty_box_fails() {
        let mut doc = single_page("BT /F1 12 Tf 72 700 Td (Text) Tj ET", arial());
        let err = doc.redact(0, Rect::new(300.0, 100.0, 50.0, 10.0), Color::white()).unwrap_err();
        assert!(matches!(err, Error::RedactionFailed { page: 0, .. }));
    }

    #[test]
    fn test_insert_standard_font() {
        let mut doc = single_page("BT /F1 12 Tf 72 700 Td (Old) Tj ET", arial());
        let placement = TextPlacement {
            x: 100.0,
            y: 500.0,
            font_size: 14.0,
            color: Color::black(),
            rotation: 0.0,
        };
        doc.insert_text(0, &placement, "Añadido", &FontResource::Standard(StandardFont::Helvetica))
            .unwrap();
        let runs = doc.extract_page_runs(0).unwrap();
        let inserted = runs.iter().find(|run| run.content == "Añadido").unwrap();
        assert_eq!(inserted.font_name, "Helvetica");
        assert_eq!(inserted.font_resource, "FK1");
        assert!((inserted.x - 100.0).abs() < 1e-3 && (inserted.font_size - 14.0).abs() < 1e-3);
        // The original font entry survives next to the new one
        assert_eq!(doc.page_fonts(0).unwrap().len(), 2);
    }

    #[test]
    fn test_rewrite_with_page_font_by_base_name() {
        let mut doc = single_page("", arial());
        let placement = TextPlacement {
            x: 50.0,
            y: 50.0,
            font_size: 10.0,
            color: Color::black(),
            rotation: 0.0,
        };
        doc.rewrite_text(0, &placement, "ALCÂNTARA", "ArialMT").unwrap();
        let runs = doc.extract_page_runs(0).unwrap();
        assert_eq!(runs[0].content, "ALCÂNTARA");
        assert_eq!(runs[0].font_resource, "F1");

        let err = doc.rewrite_text(0, &placement, "x", "Garamond").unwrap_err();
        assert!(matches!(err, Error::FontNotInDocument(_)));
    }

    #[test]
    fn test_checkpoint_rollback() {
        let mut doc = single_page("BT /F1 12 Tf 72 700 Td (Text) Tj ET", arial());
        let before = doc.checkpoint();
        let bbox = doc.extract_page_runs(0).unwrap()[0].bbox();
        doc.redact(0, bbox, Color::white()).unwrap();
        assert!(doc.extract_page_runs(0).unwrap().is_empty());
        doc.rollback(before);
        assert_eq!(doc.extract_page_runs(0).unwrap()[0].content, "Text");
    }

    #[test]
    fn test_extract_fonts_and_round_trip() {
        let mut doc = single_page("BT /F1 12 Tf 72 700 Td (Text) Tj ET", arial());
        let fonts = doc.extract_fonts().unwrap();
        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts[0].normalized_name, "ArialMT");
        assert_eq!(fonts[0].encoding.as_deref(), Some("WinAnsiEncoding"));
        assert!(fonts[0].embedded_bytes().is_none());

        let bytes = doc.to_bytes().unwrap();
        let reopened = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reopened.extract_page_runs(0).unwrap()[0].content, "Text");
    }

    #[test]
    fn test_leaks_state() {
        let balanced = Content::decode(b"q 1 0 0 1 5 5 cm Q BT ET").unwrap().operations;
        assert!(!leaks_state(&balanced));
        let leaking = Content::decode(b"1 0 0 rg BT ET").unwrap().operations;
        assert!(leaks_state(&leaking));
    }
}
