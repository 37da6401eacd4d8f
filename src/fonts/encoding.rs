//! Single-byte font encodings.
//!
//! Simple (Type1/TrueType) fonts map each code byte to a glyph through a
//! base encoding plus an optional `/Differences` array of glyph names.
//! [`SimpleEncoding`] folds both into one 256-entry table that decodes
//! shown strings and re-encodes replacement text with the document's own
//! font.

use std::collections::HashMap;

/// Base encodings named by `/Encoding` or `/BaseEncoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    /// Windows-1252 superset of Latin-1
    WinAnsi,
    /// Mac OS Roman
    MacRoman,
    /// Adobe StandardEncoding (ASCII-compatible approximation)
    Standard,
}

impl BaseEncoding {
    /// Parse an encoding name such as `WinAnsiEncoding`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            "StandardEncoding" => Some(BaseEncoding::Standard),
            _ => None,
        }
    }

    /// PDF name of the encoding.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            BaseEncoding::WinAnsi => "WinAnsiEncoding",
            BaseEncoding::MacRoman => "MacRomanEncoding",
            BaseEncoding::Standard => "StandardEncoding",
        }
    }
}

/// Mac OS Roman characters for codes 0x80-0xFF.
const MAC_ROMAN_HIGH: &str = "ÄÅÇÉÑÖÜáàâäãåçéèêëíìîïñóòôöõúùûü†°¢£§•¶ß®©™´¨≠ÆØ∞±≤≥¥µ∂∑∏π∫ªºΩæø¿¡¬√ƒ≈∆«»…\u{00A0}ÀÃÕŒœ–—“”‘’÷◊ÿŸ⁄€‹›ﬁﬂ‡·‚„‰ÂÊÁËÈÍÎÏÌÓÔ\u{F8FF}ÒÚÛÙıˆ˜¯˘˙˚¸˝˛ˇ";

/// Glyph names of printable ASCII, codes 0x20-0x7E.
const ASCII_GLYPH_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand", "quotesingle",
    "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash", "zero",
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "colon", "semicolon",
    "less", "equal", "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J",
    "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft",
    "backslash", "bracketright", "asciicircum", "underscore", "grave", "a", "b", "c", "d", "e", "f",
    "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y",
    "z", "braceleft", "bar", "braceright", "asciitilde",
];

/// Glyph names of Latin-1, codes 0xA0-0xFF.
const LATIN1_GLYPH_NAMES: [&str; 96] = [
    "nbspace", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section",
    "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot", "sfthyphen",
    "registered", "macron", "degree", "plusminus", "twosuperior", "threesuperior", "acute", "mu",
    "paragraph", "periodcentered", "cedilla", "onesuperior", "ordmasculine", "guillemotright",
    "onequarter", "onehalf", "threequarters", "questiondown", "Agrave", "Aacute", "Acircumflex",
    "Atilde", "Adieresis", "Aring", "AE", "Ccedilla", "Egrave", "Eacute", "Ecircumflex",
    "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis", "Eth", "Ntilde", "Ograve",
    "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply", "Oslash", "Ugrave", "Uacute",
    "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls", "agrave", "aacute",
    "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla", "egrave", "eacute",
    "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex", "idieresis", "eth", "ntilde",
    "ograve", "oacute", "ocircumflex", "otilde", "odieresis", "divide", "oslash", "ugrave",
    "uacute", "ucircumflex", "udieresis", "yacute", "thorn", "ydieresis",
];

/// Glyph names outside ASCII/Latin-1 that producers commonly use.
const EXTRA_GLYPH_NAMES: [(&str, char); 32] = [
    ("Euro", '\u{20AC}'),
    ("quotesinglbase", '\u{201A}'),
    ("florin", '\u{0192}'),
    ("quotedblbase", '\u{201E}'),
    ("ellipsis", '\u{2026}'),
    ("dagger", '\u{2020}'),
    ("daggerdbl", '\u{2021}'),
    ("circumflex", '\u{02C6}'),
    ("perthousand", '\u{2030}'),
    ("Scaron", '\u{0160}'),
    ("guilsinglleft", '\u{2039}'),
    ("OE", '\u{0152}'),
    ("Zcaron", '\u{017D}'),
    ("quoteleft", '\u{2018}'),
    ("quoteright", '\u{2019}'),
    ("quotedblleft", '\u{201C}'),
    ("quotedblright", '\u{201D}'),
    ("bullet", '\u{2022}'),
    ("endash", '\u{2013}'),
    ("emdash", '\u{2014}'),
    ("tilde", '\u{02DC}'),
    ("trademark", '\u{2122}'),
    ("scaron", '\u{0161}'),
    ("guilsinglright", '\u{203A}'),
    ("oe", '\u{0153}'),
    ("zcaron", '\u{017E}'),
    ("Ydieresis", '\u{0178}'),
    ("dotlessi", '\u{0131}'),
    ("fi", '\u{FB01}'),
    ("fl", '\u{FB02}'),
    ("minus", '\u{2212}'),
    ("space.alt", ' '),
];

lazy_static::lazy_static! {
    static ref GLYPH_NAMES: HashMap<&'static str, char> = {
        let mut map = HashMap::new();
        for (offset, name) in ASCII_GLYPH_NAMES.iter().enumerate() {
            map.insert(*name, (0x20 + offset as u8) as char);
        }
        for (offset, name) in LATIN1_GLYPH_NAMES.iter().enumerate() {
            map.insert(*name, (0xA0 + offset as u8) as char);
        }
        for (name, ch) in EXTRA_GLYPH_NAMES.iter() {
            map.insert(*name, *ch);
        }
        // Common aliases
        map.insert("nonbreakingspace", '\u{00A0}');
        map.insert("softhyphen", '\u{00AD}');
        map.insert("middot", '\u{00B7}');
        map
    };
}

/// Map a glyph name to Unicode.
///
/// Understands the standard Latin names plus the `uniXXXX` and `uXXXX[XX]`
/// conventions.
pub fn glyph_name_to_unicode(name: &str) -> Option<char> {
    if let Some(&ch) = GLYPH_NAMES.get(name) {
        return Some(ch);
    }
    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// Decode a WinAnsi (Windows-1252) byte.
pub fn winansi_to_unicode(byte: u8) -> Option<char> {
    match byte {
        0x00..=0x7F | 0xA0..=0xFF => Some(byte as char),
        0x80 => Some('\u{20AC}'),
        0x82 => Some('\u{201A}'),
        0x83 => Some('\u{0192}'),
        0x84 => Some('\u{201E}'),
        0x85 => Some('\u{2026}'),
        0x86 => Some('\u{2020}'),
        0x87 => Some('\u{2021}'),
        0x88 => Some('\u{02C6}'),
        0x89 => Some('\u{2030}'),
        0x8A => Some('\u{0160}'),
        0x8B => Some('\u{2039}'),
        0x8C => Some('\u{0152}'),
        0x8E => Some('\u{017D}'),
        0x91 => Some('\u{2018}'),
        0x92 => Some('\u{2019}'),
        0x93 => Some('\u{201C}'),
        0x94 => Some('\u{201D}'),
        0x95 => Some('\u{2022}'),
        0x96 => Some('\u{2013}'),
        0x97 => Some('\u{2014}'),
        0x98 => Some('\u{02DC}'),
        0x99 => Some('\u{2122}'),
        0x9A => Some('\u{0161}'),
        0x9B => Some('\u{203A}'),
        0x9C => Some('\u{0153}'),
        0x9E => Some('\u{017E}'),
        0x9F => Some('\u{0178}'),
        _ => None,
    }
}

/// Encode a character in WinAnsi.
pub fn unicode_to_winansi(ch: char) -> Option<u8> {
    let codepoint = ch as u32;
    if codepoint < 0x80 || (0xA0..=0xFF).contains(&codepoint) {
        return Some(codepoint as u8);
    }
    (0x80u8..=0x9F).find(|&byte| winansi_to_unicode(byte) == Some(ch))
}

/// Check if a character can be encoded in WinAnsi.
pub fn is_winansi_char(ch: char) -> bool {
    unicode_to_winansi(ch).is_some()
}

/// A resolved 256-entry code table of a simple font.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleEncoding {
    table: Vec<Option<char>>,
}

impl SimpleEncoding {
    /// Table of a base encoding.
    pub fn from_base(base: BaseEncoding) -> Self {
        let table = (0..=255u8)
            .map(|byte| match base {
                BaseEncoding::WinAnsi => winansi_to_unicode(byte),
                BaseEncoding::MacRoman if byte >= 0x80 => {
                    MAC_ROMAN_HIGH.chars().nth((byte - 0x80) as usize)
                },
                BaseEncoding::MacRoman | BaseEncoding::Standard => {
                    if (0x20..0x7F).contains(&byte) {
                        Some(byte as char)
                    } else {
                        None
                    }
                },
            })
            .collect();
        Self { table }
    }

    /// Apply a `/Differences` array given as (code, glyph name) pairs.
    ///
    /// Unknown glyph names leave the code unmapped.
    pub fn apply_differences<'a>(&mut self, differences: impl IntoIterator<Item = (u8, &'a str)>) {
        for (code, name) in differences {
            self.table[code as usize] = glyph_name_to_unicode(name);
        }
    }

    /// Unicode for a code byte.
    pub fn decode(&self, code: u8) -> Option<char> {
        self.table[code as usize]
    }

    /// Code byte for a character, lowest code first.
    pub fn encode(&self, ch: char) -> Option<u8> {
        self.table.iter().position(|&c| c == Some(ch)).map(|pos| pos as u8)
    }

    /// Encode a whole string, returning the first character that has no code.
    pub fn encode_str(&self, text: &str) -> std::result::Result<Vec<u8>, char> {
        text.chars().map(|ch| self.encode(ch).ok_or(ch)).collect()
    }
}

impl Default for SimpleEncoding {
    fn default() -> Self {
        Self::from_base(BaseEncoding::WinAnsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winansi_mapping() {
        assert_eq!(unicode_to_winansi('A'), Some(0x41));
        assert_eq!(unicode_to_winansi('\u{00C2}'), Some(0xC2));
        assert_eq!(unicode_to_winansi('\u{20AC}'), Some(0x80));
        assert_eq!(unicode_to_winansi('\u{2014}'), Some(0x97));
        assert_eq!(unicode_to_winansi('\u{4E2D}'), None);
        assert_eq!(winansi_to_unicode(0x81), None);
    }

    #[test]
    fn test_is_winansi_char() {
        assert!(is_winansi_char('\u{00E3}'));
        assert!(!is_winansi_char('\u{03A9}'));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_unicode("A"), Some('A'));
        assert_eq!(glyph_name_to_unicode("Acircumflex"), Some('\u{00C2}'));
        assert_eq!(glyph_name_to_unicode("ccedilla"), Some('\u{00E7}'));
        assert_eq!(glyph_name_to_unicode("space"), Some(' '));
        assert_eq!(glyph_name_to_unicode("uni00C3"), Some('\u{00C3}'));
        assert_eq!(glyph_name_to_unicode("u1F600"), Some('\u{1F600}'));
        assert_eq!(glyph_name_to_unicode("g123"), None);
    }

    #[test]
    fn test_mac_roman_table() {
        assert_eq!(MAC_ROMAN_HIGH.chars().count(), 128);
        let mac = SimpleEncoding::from_base(BaseEncoding::MacRoman);
        assert_eq!(mac.decode(0x80), Some('\u{00C4}'));
        assert_eq!(mac.decode(0xE5), Some('\u{00C2}'));
        assert_eq!(mac.decode(b'A'), Some('A'));
    }

    #[test]
    fn test_differences_override_base() {
        let mut encoding = SimpleEncoding::from_base(BaseEncoding::WinAnsi);
        encoding.apply_differences(vec![(1u8, "Acircumflex"), (b'A', "bogusname")]);
        assert_eq!(encoding.decode(1), Some('\u{00C2}'));
        assert_eq!(encoding.decode(b'A'), None);
        // Lowest code wins when a character appears twice
        assert_eq!(encoding.encode('\u{00C2}'), Some(1));
    }

    #[test]
    fn test_encode_str_reports_unencodable() {
        let encoding = SimpleEncoding::default();
        assert_eq!(encoding.encode_str("AL\u{00C2}"), Ok(vec![b'A', b'L', 0xC2]));
        assert_eq!(encoding.encode_str("A\u{4E2D}"), Err('\u{4E2D}'));
    }
}
