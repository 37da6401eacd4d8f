//! TrueType/OpenType font programs.
//!
//! Wraps `ttf-parser` to answer the questions the resolver and the
//! embedding code ask of a font file: what it calls itself, which glyph
//! shows a character and how wide that glyph is.

use std::path::Path;
use std::sync::Arc;

use ttf_parser::{Face, GlyphId};

use crate::error::{Error, Result};

/// Default advance used when a glyph has no horizontal metrics.
const DEFAULT_ADVANCE: u16 = 500;

/// Metrics of a font program in PDF glyph space (1/1000 em).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgramMetrics {
    /// Ascender
    pub ascent: i32,
    /// Descender (negative)
    pub descent: i32,
    /// Cap height
    pub cap_height: i32,
    /// Bounding box (llx, lly, urx, ury)
    pub bbox: (i32, i32, i32, i32),
    /// Italic angle in degrees
    pub italic_angle: f32,
}

/// A parsed, owned font program.
#[derive(Debug, Clone)]
pub struct FontProgram {
    data: Arc<Vec<u8>>,
    postscript_name: Option<String>,
    family_name: Option<String>,
    units_per_em: u16,
    is_bold: bool,
    is_italic: bool,
    metrics: ProgramMetrics,
}

impl FontProgram {
    /// Parse font data.
    pub fn parse(data: Arc<Vec<u8>>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Font("Font file is empty".to_string()));
        }
        let face = Face::parse(&data, 0)
            .map_err(|e| Error::Font(format!("Failed to parse font program: {}", e)))?;

        let name_of = |id: u16| {
            face.names()
                .into_iter()
                .filter(|name| name.name_id == id)
                .find_map(|name| name.to_string())
        };
        let postscript_name = name_of(ttf_parser::name_id::POST_SCRIPT_NAME);
        let family_name = name_of(ttf_parser::name_id::FAMILY);

        let units_per_em = face.units_per_em().max(1);
        let scale = |v: i16| (v as i32 * 1000) / units_per_em as i32;
        let bbox = face.global_bounding_box();
        let is_bold = face.is_bold();
        let is_italic = face.is_italic();
        let metrics = ProgramMetrics {
            ascent: scale(face.ascender()),
            descent: scale(face.descender()),
            cap_height: scale(face.capital_height().unwrap_or_else(|| face.ascender())),
            bbox: (scale(bbox.x_min), scale(bbox.y_min), scale(bbox.x_max), scale(bbox.y_max)),
            italic_angle: if is_italic { -12.0 } else { 0.0 },
        };

        Ok(Self {
            postscript_name,
            family_name,
            units_per_em,
            is_bold,
            is_italic,
            metrics,
            data,
        })
    }

    /// Load and parse a font file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(Arc::new(data))
    }

    /// Whether the data looks like an sfnt program ttf-parser can read.
    pub fn is_sfnt(data: &[u8]) -> bool {
        matches!(
            data.get(..4),
            Some([0x00, 0x01, 0x00, 0x00]) | Some(b"OTTO") | Some(b"true") | Some(b"ttcf")
        )
    }

    /// Whether the outlines are CFF (embedded as `FontFile3 /OpenType`).
    pub fn is_cff(&self) -> bool {
        self.data.starts_with(b"OTTO")
    }

    /// Name the font calls itself: PostScript name, else family name.
    pub fn name(&self) -> Option<&str> {
        self.postscript_name
            .as_deref()
            .or(self.family_name.as_deref())
    }

    /// PostScript name from the `name` table.
    pub fn postscript_name(&self) -> Option<&str> {
        self.postscript_name.as_deref()
    }

    /// Family name from the `name` table.
    pub fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
    }

    /// Bold per the OS/2 table.
    pub fn is_bold(&self) -> bool {
        self.is_bold
    }

    /// Italic per the OS/2 table.
    pub fn is_italic(&self) -> bool {
        self.is_italic
    }

    /// Metrics in 1/1000 em.
    pub fn metrics(&self) -> ProgramMetrics {
        self.metrics
    }

    /// Raw program bytes.
    pub fn data(&self) -> &Arc<Vec<u8>> {
        &self.data
    }

    fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, 0).map_err(|e| Error::Font(format!("Failed to parse font program: {}", e)))
    }

    /// Glyph id and advance width (1/1000 em) for every character of `text`.
    ///
    /// Fails with [`Error::MissingGlyph`] on the first character the
    /// program cannot show.
    pub fn layout(&self, text: &str) -> Result<Vec<(char, u16, u16)>> {
        let face = self.face()?;
        text.chars()
            .map(|ch| {
                let gid = face
                    .glyph_index(ch)
                    .filter(|gid| gid.0 != 0)
                    .ok_or_else(|| Error::MissingGlyph {
                        font: self.name().unwrap_or("unnamed").to_string(),
                        character: ch,
                    })?;
                Ok((ch, gid.0, self.advance(&face, gid)))
            })
            .collect()
    }

    /// Whether the program has a glyph for `ch`.
    pub fn has_glyph(&self, ch: char) -> bool {
        self.face()
            .map(|face| face.glyph_index(ch).is_some_and(|gid| gid.0 != 0))
            .unwrap_or(false)
    }

    /// Width of `text` in points at `font_size`.
    pub fn text_width(&self, text: &str, font_size: f32) -> Result<f32> {
        let total: u32 = self.layout(text)?.iter().map(|&(_, _, w)| w as u32).sum();
        Ok(total as f32 * font_size / 1000.0)
    }

    fn advance(&self, face: &Face<'_>, gid: GlyphId) -> u16 {
        face.glyph_hor_advance(gid)
            .map(|adv| (adv as u32 * 1000 / self.units_per_em as u32) as u16)
            .unwrap_or(DEFAULT_ADVANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(FontProgram::parse(Arc::new(Vec::new())).is_err());
        assert!(FontProgram::parse(Arc::new(b"definitely not a font".to_vec())).is_err());
    }

    #[test]
    fn test_is_sfnt_magic() {
        assert!(FontProgram::is_sfnt(&[0x00, 0x01, 0x00, 0x00, 0x00]));
        assert!(FontProgram::is_sfnt(b"OTTO...."));
        assert!(!FontProgram::is_sfnt(b"%!PS-AdobeFont"));
        assert!(!FontProgram::is_sfnt(b"ab"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = FontProgram::from_file(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
