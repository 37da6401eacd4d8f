//! The standard 14 PDF fonts.
//!
//! Every conforming viewer can render these without an embedded program,
//! which makes them the always-available substitutes of the resolver's
//! static family table and last resort.

use serde::{Deserialize, Serialize};

/// One of the base-14 fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardFont {
    #[serde(rename = "Helvetica")]
    Helvetica,
    #[serde(rename = "Helvetica-Bold")]
    HelveticaBold,
    #[serde(rename = "Helvetica-Oblique")]
    HelveticaOblique,
    #[serde(rename = "Helvetica-BoldOblique")]
    HelveticaBoldOblique,
    #[serde(rename = "Times-Roman")]
    TimesRoman,
    #[serde(rename = "Times-Bold")]
    TimesBold,
    #[serde(rename = "Times-Italic")]
    TimesItalic,
    #[serde(rename = "Times-BoldItalic")]
    TimesBoldItalic,
    #[serde(rename = "Courier")]
    Courier,
    #[serde(rename = "Courier-Bold")]
    CourierBold,
    #[serde(rename = "Courier-Oblique")]
    CourierOblique,
    #[serde(rename = "Courier-BoldOblique")]
    CourierBoldOblique,
    #[serde(rename = "Symbol")]
    Symbol,
    #[serde(rename = "ZapfDingbats")]
    ZapfDingbats,
}

/// Families of the standard fonts that have style variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Helvetica,
    Times,
    Courier,
}

/// Family prefixes mapped to a standard family (lowercase, no separators).
const FAMILY_TABLE: &[(&str, Family)] = &[
    ("arial", Family::Helvetica),
    ("helvetica", Family::Helvetica),
    ("liberationsans", Family::Helvetica),
    ("dejavusans", Family::Helvetica),
    ("times", Family::Times),
    ("liberationserif", Family::Times),
    ("nimbusroman", Family::Times),
    ("courier", Family::Courier),
    ("liberationmono", Family::Courier),
    ("nimbusmono", Family::Courier),
];

/// Helvetica advance widths for ASCII 0x20-0x7E (1/1000 em).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Times-Roman advance widths for ASCII 0x20-0x7E (1/1000 em).
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667, 722, 611,
    556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722,
    722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500,
    278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

impl StandardFont {
    /// All fourteen fonts.
    pub const ALL: [StandardFont; 14] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::HelveticaOblique,
        StandardFont::HelveticaBoldOblique,
        StandardFont::TimesRoman,
        StandardFont::TimesBold,
        StandardFont::TimesItalic,
        StandardFont::TimesBoldItalic,
        StandardFont::Courier,
        StandardFont::CourierBold,
        StandardFont::CourierOblique,
        StandardFont::CourierBoldOblique,
        StandardFont::Symbol,
        StandardFont::ZapfDingbats,
    ];

    /// The `/BaseFont` name.
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Look up a font by its exact base-14 name (case-insensitive).
    pub fn from_base_font(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|font| font.base_font().eq_ignore_ascii_case(name))
    }

    /// Whether this is a bold style.
    pub fn is_bold(&self) -> bool {
        self.base_font().contains("Bold")
    }

    /// Whether this is an italic/oblique style.
    pub fn is_italic(&self) -> bool {
        let name = self.base_font();
        name.contains("Italic") || name.contains("Oblique")
    }

    /// Whether the font uses a symbolic built-in encoding.
    pub fn is_symbolic(&self) -> bool {
        matches!(self, StandardFont::Symbol | StandardFont::ZapfDingbats)
    }

    fn styled(family: Family, bold: bool, italic: bool) -> Self {
        match (family, bold, italic) {
            (Family::Helvetica, false, false) => StandardFont::Helvetica,
            (Family::Helvetica, true, false) => StandardFont::HelveticaBold,
            (Family::Helvetica, false, true) => StandardFont::HelveticaOblique,
            (Family::Helvetica, true, true) => StandardFont::HelveticaBoldOblique,
            (Family::Times, false, false) => StandardFont::TimesRoman,
            (Family::Times, true, false) => StandardFont::TimesBold,
            (Family::Times, false, true) => StandardFont::TimesItalic,
            (Family::Times, true, true) => StandardFont::TimesBoldItalic,
            (Family::Courier, false, false) => StandardFont::Courier,
            (Family::Courier, true, false) => StandardFont::CourierBold,
            (Family::Courier, false, true) => StandardFont::CourierOblique,
            (Family::Courier, true, true) => StandardFont::CourierBoldOblique,
        }
    }

    /// Helvetica in the requested style.
    pub fn sans(bold: bool, italic: bool) -> Self {
        Self::styled(Family::Helvetica, bold, italic)
    }

    /// Map a font name to a standard substitute by family prefix.
    ///
    /// ```
    /// use pdf_fontkeeper::fonts::StandardFont;
    ///
    /// assert_eq!(
    ///     StandardFont::map_family("ArialNarrow-Bold", true, false),
    ///     Some(StandardFont::HelveticaBold)
    /// );
    /// assert_eq!(StandardFont::map_family("Garamond", false, false), None);
    /// ```
    pub fn map_family(name: &str, bold: bool, italic: bool) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        FAMILY_TABLE
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix))
            .map(|&(_, family)| Self::styled(family, bold, italic))
    }

    /// Advance width of a character in 1/1000 em.
    ///
    /// ASCII uses the regular-weight metrics of the family; other
    /// characters use the family's average width.
    pub fn char_width(&self, ch: char) -> u16 {
        let code = ch as u32;
        let ascii_index = if (0x20..0x7F).contains(&code) {
            Some((code - 0x20) as usize)
        } else {
            None
        };
        match self {
            StandardFont::Courier
            | StandardFont::CourierBold
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique => 600,
            StandardFont::TimesRoman
            | StandardFont::TimesBold
            | StandardFont::TimesItalic
            | StandardFont::TimesBoldItalic => ascii_index.map(|i| TIMES_WIDTHS[i]).unwrap_or(500),
            StandardFont::Symbol | StandardFont::ZapfDingbats => 600,
            _ => ascii_index.map(|i| HELVETICA_WIDTHS[i]).unwrap_or(556),
        }
    }

    /// Width of `text` in points at `font_size`.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| self.char_width(ch) as u32).sum();
        units as f32 * font_size / 1000.0
    }
}

impl std::fmt::Display for StandardFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.base_font())
    }
}
