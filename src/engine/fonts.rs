//! Fonts as they appear in a page's `/Resources`.
//!
//! [`PageFont`] turns the raw font dictionary into the three things the
//! content interpreter and the rewriter need: character codes to Unicode,
//! code widths, and Unicode back to codes. The builders at the bottom add
//! new font dictionaries for text the document did not contain before.

use std::collections::{BTreeMap, HashMap};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::fonts::{
    generate_tounicode_cmap, normalize_font_name, style_from_name, unicode_to_winansi,
    BaseEncoding, CMap, FontFlags, FontProgram, SimpleEncoding, StandardFont,
};

/// Width used when nothing else is known about a glyph (1/1000 em).
const DEFAULT_WIDTH: f32 = 500.0;

/// Default `/DW` of CID fonts.
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// One character code of a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Character code
    pub code: u32,
    /// Unicode text of the code (may be several characters for ligatures)
    pub text: String,
    /// Advance in glyph space (1/1000 em)
    pub width: f32,
    /// Single-byte code 32, the only code word spacing applies to
    pub is_space: bool,
}

/// A font dictionary referenced from a page.
#[derive(Debug, Clone)]
pub struct PageFont {
    /// Key in the page's `/Font` resource dictionary
    pub resource_name: String,
    /// `/BaseFont` with the subset prefix removed
    pub base_font: String,
    /// Object of the font dictionary (None for inline dictionaries)
    pub object_id: Option<ObjectId>,
    composite: bool,
    encoding: SimpleEncoding,
    to_unicode: Option<CMap>,
    widths: HashMap<u32, f32>,
    missing_width: f32,
    standard: Option<StandardFont>,
}

impl PageFont {
    /// Read a font from its resource entry.
    pub fn load(doc: &Document, resource_name: &str, font: &Object) -> Result<Self> {
        let (object_id, dict) = match font {
            Object::Reference(id) => (Some(*id), doc.get_dictionary(*id)?),
            Object::Dictionary(dict) => (None, dict),
            _ => {
                return Err(Error::Font(format!(
                    "Font resource '{}' is not a dictionary",
                    resource_name
                )))
            },
        };

        let base_font = name_entry(doc, dict, b"BaseFont")
            .map(|name| normalize_font_name(&name))
            .unwrap_or_else(|| resource_name.to_string());
        let composite = name_entry(doc, dict, b"Subtype").as_deref() == Some("Type0");
        let (bold, italic) = style_from_name(&base_font);
        let standard = StandardFont::from_base_font(&base_font)
            .or_else(|| StandardFont::map_family(&base_font, bold, italic));

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_stream().ok())
            .and_then(|stream| stream_bytes(stream).ok())
            .map(|bytes| CMap::parse(&bytes))
            .filter(|cmap| !cmap.is_empty());

        let mut font = Self {
            resource_name: resource_name.to_string(),
            base_font,
            object_id,
            composite,
            encoding: SimpleEncoding::default(),
            to_unicode,
            widths: HashMap::new(),
            missing_width: 0.0,
            standard,
        };

        if composite {
            font.load_cid_widths(doc, dict);
        } else {
            font.load_simple_encoding(doc, dict);
            font.load_simple_widths(doc, dict);
        }
        Ok(font)
    }

    /// Placeholder for a font name the page does not define.
    pub fn unknown(resource_name: &str) -> Self {
        Self {
            resource_name: resource_name.to_string(),
            base_font: resource_name.to_string(),
            object_id: None,
            composite: false,
            encoding: SimpleEncoding::default(),
            to_unicode: None,
            widths: HashMap::new(),
            missing_width: 0.0,
            standard: None,
        }
    }

    /// Whether codes are two bytes wide (Type0 fonts).
    pub fn is_composite(&self) -> bool {
        self.composite
    }

    fn load_simple_encoding(&mut self, doc: &Document, dict: &Dictionary) {
        let Ok(encoding) = dict.get(b"Encoding") else {
            return;
        };
        match resolve(doc, encoding) {
            Object::Name(name) => {
                if let Some(base) = BaseEncoding::from_name(&String::from_utf8_lossy(name)) {
                    self.encoding = SimpleEncoding::from_base(base);
                }
            },
            Object::Dictionary(enc) => {
                if let Some(base) = name_entry(doc, enc, b"BaseEncoding")
                    .and_then(|name| BaseEncoding::from_name(&name))
                {
                    self.encoding = SimpleEncoding::from_base(base);
                }
                if let Ok(Object::Array(items)) = enc.get(b"Differences").map(|o| resolve(doc, o)) {
                    let differences = parse_differences(items);
                    self.encoding
                        .apply_differences(differences.iter().map(|(code, name)| (*code, name.as_str())));
                }
            },
            _ => {},
        }
    }

    fn load_simple_widths(&mut self, doc: &Document, dict: &Dictionary) {
        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|obj| number(resolve(doc, obj)))
            .unwrap_or(0.0) as u32;
        if let Ok(Object::Array(widths)) = dict.get(b"Widths").map(|o| resolve(doc, o)) {
            for (offset, width) in widths.iter().enumerate() {
                if let Some(width) = number(resolve(doc, width)) {
                    self.widths.insert(first_char + offset as u32, width);
                }
            }
        }
        self.missing_width = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .and_then(|descriptor| descriptor.get(b"MissingWidth").ok())
            .and_then(|obj| number(resolve(doc, obj)))
            .unwrap_or(0.0);
    }

    fn load_cid_widths(&mut self, doc: &Document, dict: &Dictionary) {
        self.missing_width = DEFAULT_CID_WIDTH;
        let descendant = match dict.get(b"DescendantFonts").map(|o| resolve(doc, o)) {
            Ok(Object::Array(fonts)) => fonts.first().and_then(|f| resolve(doc, f).as_dict().ok()),
            _ => None,
        };
        let Some(descendant) = descendant else {
            return;
        };
        if let Some(dw) = descendant.get(b"DW").ok().and_then(|o| number(resolve(doc, o))) {
            self.missing_width = dw;
        }
        if let Ok(Object::Array(w)) = descendant.get(b"W").map(|o| resolve(doc, o)) {
            self.widths = parse_cid_widths(doc, w);
        }
    }

    fn width(&self, code: u32, text: &str) -> f32 {
        if let Some(&width) = self.widths.get(&code) {
            return width;
        }
        if self.composite || !self.widths.is_empty() {
            return self.missing_width;
        }
        match (self.standard, text.chars().next()) {
            (Some(font), Some(ch)) => font.char_width(ch) as f32,
            _ => DEFAULT_WIDTH,
        }
    }

    fn text_of(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|cmap| cmap.lookup(code)) {
            return text.to_string();
        }
        if !self.composite {
            if let Some(ch) = self.encoding.decode(code as u8) {
                return ch.to_string();
            }
        }
        '\u{FFFD}'.to_string()
    }

    /// Split a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let step = if self.composite { 2 } else { 1 };
        bytes
            .chunks(step)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                let text = self.text_of(code);
                Glyph {
                    code,
                    width: self.width(code, &text),
                    is_space: step == 1 && code == 32,
                    text,
                }
            })
            .collect()
    }

    /// Decoded text of a shown string.
    pub fn decode_text(&self, bytes: &[u8]) -> String {
        self.decode(bytes).into_iter().map(|glyph| glyph.text).collect()
    }

    /// Whether the font has a usable glyph behind `code`.
    ///
    /// Simple fonts that list widths describe unused codes of a subset
    /// with width 0 or leave them out of the range.
    fn has_code(&self, code: u32) -> bool {
        if self.composite || self.widths.is_empty() {
            return true;
        }
        self.widths.get(&code).is_some_and(|&width| width > 0.0) || code == 32
    }

    /// Encode text with this font's own mapping.
    ///
    /// Uses the `/ToUnicode` map when it names the character, the simple
    /// encoding otherwise. Fails on the first character without a code.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let reverse = self.to_unicode.as_ref().map(CMap::reverse).unwrap_or_default();
        let mut out = Vec::with_capacity(text.len() * if self.composite { 2 } else { 1 });
        for ch in text.chars() {
            let code = reverse
                .get(&ch)
                .copied()
                .or_else(|| {
                    if self.composite {
                        None
                    } else {
                        self.encoding.encode(ch).map(u32::from)
                    }
                })
                .filter(|&code| self.has_code(code))
                .ok_or_else(|| Error::Unencodable {
                    font: self.base_font.clone(),
                    character: ch,
                })?;
            if self.composite {
                out.extend_from_slice(&(code as u16).to_be_bytes());
            } else if code <= 0xFF {
                out.push(code as u8);
            } else {
                return Err(Error::Unencodable {
                    font: self.base_font.clone(),
                    character: ch,
                });
            }
        }
        Ok(out)
    }
}

/// A font added to the document for new text.
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedText {
    /// Font dictionary to register in the page resources
    pub font_id: ObjectId,
    /// Font program stream, shared between insertions
    pub file_id: ObjectId,
    /// Text encoded for the new font
    pub codes: Vec<u8>,
}

/// Add a Type0 font with Identity-H encoding for `program`.
///
/// Codes are glyph ids; `/W` and `/ToUnicode` cover the glyphs of `text`.
/// `file_id` reuses a program stream added by an earlier insertion.
pub(crate) fn embed_program(
    doc: &mut Document,
    base_font: &str,
    program: &FontProgram,
    text: &str,
    file_id: Option<ObjectId>,
) -> Result<EmbeddedText> {
    let layout = program.layout(text)?;
    let mut codes = Vec::with_capacity(layout.len() * 2);
    let mut unicode: BTreeMap<u16, char> = BTreeMap::new();
    let mut widths: BTreeMap<u16, u16> = BTreeMap::new();
    for &(ch, gid, advance) in &layout {
        codes.extend_from_slice(&gid.to_be_bytes());
        unicode.entry(gid).or_insert(ch);
        widths.insert(gid, advance);
    }

    let cff = program.is_cff();
    let file_id = match file_id {
        Some(id) => id,
        None => {
            let data = program.data().as_ref().clone();
            let dict = if cff {
                dictionary! { "Subtype" => "OpenType" }
            } else {
                dictionary! { "Length1" => data.len() as i64 }
            };
            doc.add_object(Stream::new(dict, data))
        },
    };

    let name = base_font.replace(' ', "");
    let metrics = program.metrics();
    let mut flags = FontFlags::NONSYMBOLIC;
    if program.is_italic() {
        flags |= FontFlags::ITALIC;
    }
    if program.is_bold() {
        flags |= FontFlags::FORCE_BOLD;
    }
    let (llx, lly, urx, ury) = metrics.bbox;
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(name.as_bytes().to_vec()),
        "Flags" => flags.bits() as i64,
        "FontBBox" => vec![
            Object::Integer(llx as i64),
            Object::Integer(lly as i64),
            Object::Integer(urx as i64),
            Object::Integer(ury as i64),
        ],
        "ItalicAngle" => metrics.italic_angle,
        "Ascent" => metrics.ascent as i64,
        "Descent" => metrics.descent as i64,
        "CapHeight" => metrics.cap_height as i64,
        "StemV" => if program.is_bold() { 120i64 } else { 80i64 },
    };
    descriptor.set(if cff { "FontFile3" } else { "FontFile2" }, file_id);
    let descriptor_id = doc.add_object(descriptor);

    let w: Vec<Object> = widths
        .iter()
        .flat_map(|(&gid, &width)| {
            [Object::Integer(gid as i64), Object::Array(vec![Object::Integer(width as i64)])]
        })
        .collect();
    let mut cid_font = dictionary! {
        "Type" => "Font",
        "Subtype" => if cff { "CIDFontType0" } else { "CIDFontType2" },
        "BaseFont" => Object::Name(name.as_bytes().to_vec()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0i64,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => DEFAULT_CID_WIDTH as i64,
        "W" => w,
    };
    if !cff {
        cid_font.set("CIDToGIDMap", "Identity");
    }
    let cid_font_id = doc.add_object(cid_font);

    let cmap = generate_tounicode_cmap(&unicode);
    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(name.as_bytes().to_vec()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    });
    log::debug!(
        "Embedded {} ({} glyph(s), {})",
        name,
        widths.len(),
        if cff { "CFF" } else { "TrueType" }
    );
    Ok(EmbeddedText {
        font_id,
        file_id,
        codes,
    })
}

/// Font dictionary of a base-14 font.
pub(crate) fn standard_font_dictionary(font: StandardFont) -> Dictionary {
    let mut dict = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
    };
    if !font.is_symbolic() {
        dict.set("Encoding", "WinAnsiEncoding");
    }
    dict
}

/// Encode text for a base-14 font dictionary built by [`standard_font_dictionary`].
pub(crate) fn encode_standard(font: StandardFont, text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|ch| {
            let code = if font.is_symbolic() {
                Some(ch).filter(|c| c.is_ascii() && !c.is_ascii_control()).map(|c| c as u8)
            } else {
                unicode_to_winansi(ch)
            };
            code.ok_or_else(|| Error::Unencodable {
                font: font.base_font().to_string(),
                character: ch,
            })
        })
        .collect()
}

/// Follow a reference, leaving direct objects alone.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Numeric value of an integer or real object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Name value of a dictionary entry, following references.
pub(crate) fn name_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).map(|obj| resolve(doc, obj)) {
        Ok(Object::Name(name)) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Bytes of a stream, decompressed when filtered.
pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| Error::Backend(format!("Failed to decompress stream: {}", e)))
    } else {
        Ok(stream.content.clone())
    }
}

fn parse_differences(items: &[Object]) -> Vec<(u8, String)> {
    let mut differences = Vec::new();
    let mut code: Option<u32> = None;
    for item in items {
        match item {
            Object::Integer(start) => code = u32::try_from(*start).ok(),
            Object::Name(name) => {
                if let Some(current) = code {
                    if current <= 0xFF {
                        differences.push((current as u8, String::from_utf8_lossy(name).into_owned()));
                    }
                    code = current.checked_add(1);
                }
            },
            _ => {},
        }
    }
    differences
}

/// Parse a CID `/W` array: `c [w1 w2 ...]` and `c_first c_last w` entries.
fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(resolve(doc, &items[i])) else {
            break;
        };
        let first = first as u32;
        match items.get(i + 1).map(|obj| resolve(doc, obj)) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    let Some(cid) = u32::try_from(offset).ok().and_then(|o| first.checked_add(o)) else {
                        break;
                    };
                    if let Some(width) = number(resolve(doc, width)) {
                        widths.insert(cid, width);
                    }
                }
                i += 2;
            },
            Some(last) => {
                let last = number(last).map(|l| l as u32);
                let width = items.get(i + 2).and_then(|obj| number(resolve(doc, obj)));
                if let (Some(last), Some(width)) = (last, width) {
                    for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(cid, width);
                    }
                }
                i += 3;
            },
            None => break,
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_differences_stop_at_code_limit() {
        let items = vec![
            Object::Integer(u32::MAX as i64),
            Object::Name(b"A".to_vec()),
            Object::Name(b"B".to_vec()),
            Object::Integer(65),
            Object::Name(b"Aring".to_vec()),
        ];
        assert_eq!(parse_differences(&items), vec![(65, "Aring".to_string())]);
    }

    #[test]
    fn test_cid_widths_near_code_limit() {
        let doc = Document::with_version("1.5");
        let items = vec![
            Object::Integer(u32::MAX as i64),
            Object::Array(vec![Object::Integer(500), Object::Integer(600), Object::Integer(700)]),
        ];
        let widths = parse_cid_widths(&doc, &items);
        assert_eq!(widths.len(), 1);
        assert_eq!(widths.get(&u32::MAX), Some(&500.0));
    }

    fn load(doc: &Document, dict: Dictionary) -> PageFont {
        PageFont::load(doc, "F1", &Object::Dictionary(dict)).unwrap()
    }

    #[test]
    fn test_simple_font_without_widths_uses_standard_metrics() {
        let doc = Document::with_version("1.5");
        let font = load(
            &doc,
            dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "ArialMT",
                "Encoding" => "WinAnsiEncoding",
            },
        );
        assert_eq!(font.base_font, "ArialMT");
        let glyphs = font.decode(b"A \xC2");
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0].text, "A");
        assert_eq!(glyphs[0].width, 667.0);
        assert!(glyphs[1].is_space);
        assert_eq!(glyphs[2].text, "\u{00C2}");
        assert_eq!(font.encode("ALCÂNTARA").unwrap(), b"ALC\xC2NTARA".to_vec());
    }

    #[test]
    fn test_subset_widths_reject_unused_codes() {
        let doc = Document::with_version("1.5");
        let font = load(
            &doc,
            dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "ABCDEF+Calibri",
                "FirstChar" => 65i64,
                "Widths" => vec![Object::Integer(579), Object::Integer(0), Object::Integer(533)],
            },
        );
        assert_eq!(font.base_font, "Calibri");
        assert_eq!(font.encode("AC").unwrap(), vec![65, 67]);
        let err = font.encode("AB").unwrap_err();
        assert!(matches!(err, Error::Unencodable { character: 'B', .. }));
    }

    #[test]
    fn test_differences_override_base_encoding() {
        let doc = Document::with_version("1.5");
        let font = load(
            &doc,
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Custom",
                "Encoding" => dictionary! {
                    "Type" => "Encoding",
                    "BaseEncoding" => "WinAnsiEncoding",
                    "Differences" => vec![Object::Integer(65), "Euro".into(), "eacute".into()],
                },
            },
        );
        assert_eq!(font.decode_text(b"ABC"), "\u{20AC}\u{00E9}C");
        assert_eq!(font.encode("\u{00E9}").unwrap(), vec![66]);
    }

    #[test]
    fn test_composite_font_with_tounicode() {
        let mut doc = Document::with_version("1.5");
        let cmap = b"begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n2 beginbfchar\n<0024> <0041>\n<0025> <0042>\nendbfchar\n";
        let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap.to_vec()));
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "XYZABC+Roboto",
            "DW" => 1000i64,
            "W" => vec![Object::Integer(36), Object::Array(vec![Object::Integer(600), Object::Integer(650)])],
        });
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "XYZABC+Roboto",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant)],
            "ToUnicode" => to_unicode,
        });
        let font = PageFont::load(&doc, "F2", &Object::Reference(font_id)).unwrap();
        assert!(font.is_composite());
        assert_eq!(font.object_id, Some(font_id));
        let glyphs = font.decode(&[0x00, 0x24, 0x00, 0x25, 0x00, 0x30]);
        assert_eq!(glyphs[0].text, "A");
        assert_eq!(glyphs[1].width, 650.0);
        assert_eq!(glyphs[2].width, 1000.0);
        assert!(!glyphs[0].is_space);
        assert_eq!(font.encode("BA").unwrap(), vec![0x00, 0x25, 0x00, 0x24]);
        assert!(font.encode("Z").is_err());
    }

    #[test]
    fn test_standard_encoding() {
        assert_eq!(encode_standard(StandardFont::Helvetica, "Â€").unwrap(), vec![0xC2, 0x80]);
        assert!(matches!(
            encode_standard(StandardFont::Helvetica, "\u{4E2D}"),
            Err(Error::Unencodable { character: '\u{4E2D}', .. })
        ));
        let dict = standard_font_dictionary(StandardFont::TimesBold);
        assert_eq!(dict.get(b"BaseFont").unwrap(), &Object::Name(b"Times-Bold".to_vec()));
        assert!(standard_font_dictionary(StandardFont::Symbol).get(b"Encoding").is_err());
    }

    #[test]
    fn test_unknown_font_decodes_winansi() {
        let font = PageFont::unknown("F9");
        assert_eq!(font.decode_text(b"Hi"), "Hi");
        assert_eq!(font.decode(b"Hi")[0].width, DEFAULT_WIDTH);
    }
}
