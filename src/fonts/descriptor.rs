//! Font identity as it appears in a document or on the host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use lopdf::ObjectId;
use regex::Regex;

use super::standard::StandardFont;

bitflags! {
    /// `/Flags` entry of a font descriptor dictionary.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FontFlags: u32 {
        /// Bit 1: all glyphs have the same width
        const FIXED_PITCH = 1 << 0;
        /// Bit 2: glyphs have serifs
        const SERIF = 1 << 1;
        /// Bit 3: font contains glyphs outside the Adobe standard Latin set
        const SYMBOLIC = 1 << 2;
        /// Bit 4: glyphs resemble cursive handwriting
        const SCRIPT = 1 << 3;
        /// Bit 6: font uses the standard Latin character set
        const NONSYMBOLIC = 1 << 5;
        /// Bit 7: glyphs have dominant vertical strokes that are slanted
        const ITALIC = 1 << 6;
        /// Bit 17: no lowercase letters
        const ALL_CAP = 1 << 16;
        /// Bit 18: lowercase letters are small capitals
        const SMALL_CAP = 1 << 17;
        /// Bit 19: bold glyphs are painted with extra pixels at small sizes
        const FORCE_BOLD = 1 << 18;
    }
}

/// Where the program of a font comes from.
///
/// At most one source exists at a time; a descriptor straight out of the
/// document may be [`Unresolved`](FontSource::Unresolved) until the
/// resolver binds it.
#[derive(Debug, Clone, PartialEq)]
pub enum FontSource {
    /// No loadable program known yet
    Unresolved,
    /// Program bytes embedded in the document
    Embedded(Arc<Vec<u8>>),
    /// Font file on the host filesystem
    System(PathBuf),
    /// Base-14 font every viewer provides
    Standard(StandardFont),
}

/// Identity of a font.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    /// Raw name, possibly subset-prefixed
    pub name: String,
    /// Name with subset prefix removed
    pub normalized_name: String,
    /// Bold style
    pub is_bold: bool,
    /// Italic style
    pub is_italic: bool,
    /// Encoding name (`WinAnsiEncoding`, `Identity-H`, ...)
    pub encoding: Option<String>,
    /// Descriptor flags, when the document declares them
    pub flags: FontFlags,
    /// Font dictionary this descriptor was read from
    pub object_id: Option<ObjectId>,
    /// Program source
    pub source: FontSource,
}

impl FontDescriptor {
    /// Unresolved descriptor for a raw font name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let normalized_name = normalize_font_name(&name);
        let (is_bold, is_italic) = style_from_name(&normalized_name);
        Self {
            name,
            normalized_name,
            is_bold,
            is_italic,
            encoding: None,
            flags: FontFlags::empty(),
            object_id: None,
            source: FontSource::Unresolved,
        }
    }

    /// Override style flags.
    pub fn with_style(mut self, bold: bool, italic: bool) -> Self {
        self.is_bold = bold;
        self.is_italic = italic;
        self
    }

    /// Bind to a program source.
    pub fn with_source(mut self, source: FontSource) -> Self {
        self.source = source;
        self
    }

    /// Set the encoding name.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Embedded program bytes, if bound to the document's program.
    pub fn embedded_bytes(&self) -> Option<&Arc<Vec<u8>>> {
        match &self.source {
            FontSource::Embedded(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Host font file, if bound to one.
    pub fn system_path(&self) -> Option<&Path> {
        match &self.source {
            FontSource::System(path) => Some(path),
            _ => None,
        }
    }

    /// Standard font, if bound to one.
    pub fn standard_font(&self) -> Option<StandardFont> {
        match self.source {
            FontSource::Standard(font) => Some(font),
            _ => None,
        }
    }

    /// Whether a loadable program has been bound.
    pub fn is_resolved(&self) -> bool {
        !matches!(self.source, FontSource::Unresolved)
    }
}

/// Remove PDF subset prefixes (`ABCDEF+`) from a font name.
///
/// Surrounding whitespace is trimmed as well, before and after each
/// prefix. Repeated prefixes are all removed, so the result is a fixed
/// point.
///
/// # Examples
///
/// ```
/// use pdf_fontkeeper::fonts::normalize_font_name;
///
/// assert_eq!(normalize_font_name("ABCDEF+ArialMT"), "ArialMT");
/// assert_eq!(normalize_font_name("ArialMT"), "ArialMT");
/// assert_eq!(normalize_font_name("abcdef+ArialMT"), "abcdef+ArialMT");
/// assert_eq!(normalize_font_name(" ABCDEF+ ArialMT "), "ArialMT");
/// ```
pub fn normalize_font_name(name: &str) -> String {
    lazy_static::lazy_static! {
        static ref SUBSET_PREFIX: Regex = Regex::new(r"^(?:[A-Z]{6}\+)+").unwrap();
    }
    let mut current = name.trim();
    loop {
        let stripped = match SUBSET_PREFIX.find(current) {
            Some(prefix) => current[prefix.end()..].trim(),
            None => return current.to_string(),
        };
        current = stripped;
    }
}

/// Whether two font names denote the same font (case-insensitive, prefixes ignored).
pub fn same_font_name(a: &str, b: &str) -> bool {
    normalize_font_name(a).eq_ignore_ascii_case(&normalize_font_name(b))
}

/// Infer (bold, italic) from style words in a font name.
pub fn style_from_name(name: &str) -> (bool, bool) {
    let lower = name.to_ascii_lowercase();
    let bold = ["bold", "black", "heavy", "semibold", "demibold"]
        .iter()
        .any(|w| lower.contains(w));
    let italic = lower.contains("italic") || lower.contains("oblique");
    (bold, italic)
}
