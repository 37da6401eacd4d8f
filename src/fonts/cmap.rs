//! ToUnicode CMap parsing and generation.
//!
//! Parsed maps decode shown strings back to Unicode during run extraction,
//! and their reverse drives re-encoding when text is rewritten with a
//! document's own font. Generated maps accompany every embedded Type0 font
//! so edited text stays extractable.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

/// A character map from character codes to Unicode strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CMap {
    mappings: HashMap<u32, String>,
    /// Byte length of a source code (1 for simple fonts, 2 for Identity-H)
    code_bytes: usize,
}

impl CMap {
    /// Parse a ToUnicode CMap stream (already decompressed).
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_fontkeeper::fonts::CMap;
    ///
    /// let cmap = CMap::parse(b"beginbfchar\n<0041> <0041>\nendbfchar");
    /// assert_eq!(cmap.lookup(0x41), Some("A"));
    /// ```
    pub fn parse(data: &[u8]) -> Self {
        lazy_static::lazy_static! {
            static ref RE_CODESPACE: Regex =
                Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
            static ref RE_BFCHAR: Regex =
                Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
            static ref RE_BFRANGE_SEQ: Regex =
                Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
            static ref RE_BFRANGE_ARRAY: Regex = Regex::new(
                r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*\[((?:\s*<[0-9A-Fa-f]+>\s*)+)\]"
            )
            .unwrap();
            static ref RE_HEX: Regex = Regex::new(r"<([0-9A-Fa-f]+)>").unwrap();
        }

        let content = String::from_utf8_lossy(data);
        let mut mappings = HashMap::new();
        let mut code_digits = 0usize;

        for section in extract_sections(&content, "begincodespacerange", "endcodespacerange") {
            for caps in RE_CODESPACE.captures_iter(section) {
                code_digits = code_digits.max(caps[1].len());
            }
        }

        for section in extract_sections(&content, "beginbfchar", "endbfchar") {
            for caps in RE_BFCHAR.captures_iter(section) {
                let Ok(src) = u32::from_str_radix(&caps[1], 16) else {
                    continue;
                };
                if let Some(dst) = decode_destination(&caps[2]) {
                    log::trace!("ToUnicode bfchar: 0x{:02X} -> {:?}", src, dst);
                    code_digits = code_digits.max(caps[1].len());
                    mappings.insert(src, dst);
                }
            }
        }

        for section in extract_sections(&content, "beginbfrange", "endbfrange") {
            // Array ranges first; their text is then blanked so the
            // sequential pattern cannot re-match inside the array.
            let mut remaining = section.to_string();
            for caps in RE_BFRANGE_ARRAY.captures_iter(section) {
                let (Ok(start), Ok(end)) = (
                    u32::from_str_radix(&caps[1], 16),
                    u32::from_str_radix(&caps[2], 16),
                ) else {
                    continue;
                };
                code_digits = code_digits.max(caps[1].len());
                let destinations: Vec<&str> = RE_HEX
                    .captures_iter(&caps[3])
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .collect();
                let range_size = end.saturating_sub(start) as usize + 1;
                if destinations.len() != range_size {
                    log::warn!(
                        "ToUnicode bfrange array size mismatch: expected {} entries for range 0x{:X}-0x{:X}, got {}",
                        range_size,
                        start,
                        end,
                        destinations.len()
                    );
                }
                for (offset, hex) in destinations.iter().take(range_size).enumerate() {
                    if let Some(dst) = decode_destination(hex) {
                        mappings.insert(start + offset as u32, dst);
                    }
                }
                remaining = remaining.replace(&caps[0], " ");
            }

            for caps in RE_BFRANGE_SEQ.captures_iter(&remaining) {
                let (Ok(start), Ok(end), Ok(dst_start)) = (
                    u32::from_str_radix(&caps[1], 16),
                    u32::from_str_radix(&caps[2], 16),
                    u32::from_str_radix(&caps[3], 16),
                ) else {
                    continue;
                };
                code_digits = code_digits.max(caps[1].len());
                // Guard against absurd ranges in broken files
                let span = end.saturating_sub(start).min(0xFFFF);
                for offset in 0..=span {
                    let code = dst_start.wrapping_add(offset);
                    let decoded = if code > 0xFFFF {
                        decode_utf16_surrogate_pair(code)
                    } else {
                        char::from_u32(code).map(|ch| ch.to_string())
                    };
                    if let Some(dst) = decoded {
                        mappings.insert(start.wrapping_add(offset), dst);
                    }
                }
            }
        }

        Self {
            mappings,
            code_bytes: code_digits.div_ceil(2).max(1),
        }
    }

    /// Unicode text for a character code.
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    /// Byte length of one source code.
    pub fn code_bytes(&self) -> usize {
        self.code_bytes
    }

    /// Number of mapped codes.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Reverse map from single characters to their lowest character code.
    pub fn reverse(&self) -> HashMap<char, u32> {
        let mut reverse: HashMap<char, u32> = HashMap::new();
        for (&code, text) in &self.mappings {
            let mut chars = text.chars();
            if let (Some(ch), None) = (chars.next(), chars.next()) {
                reverse
                    .entry(ch)
                    .and_modify(|existing| *existing = (*existing).min(code))
                    .or_insert(code);
            }
        }
        reverse
    }
}

/// Decode a destination hex string.
///
/// Up to four digits is one code point; eight digits is tried as a UTF-16
/// surrogate pair first; anything else is a sequence of UTF-16 units.
fn decode_destination(hex: &str) -> Option<String> {
    if hex.len() <= 4 {
        let code = u32::from_str_radix(hex, 16).ok()?;
        return char::from_u32(code).map(|ch| ch.to_string());
    }
    if hex.len() == 8 {
        let code = u32::from_str_radix(hex, 16).ok()?;
        let high = (code >> 16) as u16;
        let low = (code & 0xFFFF) as u16;
        if (0xD800..=0xDBFF).contains(&high) && (0xDC00..=0xDFFF).contains(&low) {
            return decode_utf16_surrogate_pair(code);
        }
    }
    let units: Vec<u16> = (0..hex.len())
        .step_by(4)
        .filter_map(|i| u16::from_str_radix(&hex[i..(i + 4).min(hex.len())], 16).ok())
        .collect();
    let text: String = char::decode_utf16(units).filter_map(|r| r.ok()).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode a 32-bit value holding a UTF-16 surrogate pair.
///
/// Values that are not a valid pair are tried as a direct code point.
fn decode_utf16_surrogate_pair(value: u32) -> Option<String> {
    let high = (value >> 16) as u16;
    let low = (value & 0xFFFF) as u16;
    if (0xD800..=0xDBFF).contains(&high) && (0xDC00..=0xDFFF).contains(&low) {
        let codepoint = 0x10000 + (((high & 0x3FF) as u32) << 10) + ((low & 0x3FF) as u32);
        char::from_u32(codepoint).map(|ch| ch.to_string())
    } else {
        char::from_u32(value).map(|ch| ch.to_string())
    }
}

/// Extract sections between begin and end markers.
fn extract_sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut sections = Vec::new();
    let mut remaining = content;

    while let Some(begin_pos) = remaining.find(begin) {
        let after_begin = &remaining[begin_pos + begin.len()..];
        if let Some(end_pos) = after_begin.find(end) {
            sections.push(&after_begin[..end_pos]);
            remaining = &after_begin[end_pos + end.len()..];
        } else {
            break;
        }
    }

    sections
}

/// Generate a ToUnicode CMap for a two-byte (Identity-H) font.
///
/// `mappings` maps glyph ids to the character each one shows.
pub fn generate_tounicode_cmap(mappings: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::new();

    cmap.push_str("/CIDInit /ProcSet findresource begin\n");
    cmap.push_str("12 dict begin\n");
    cmap.push_str("begincmap\n");
    cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
    cmap.push_str("/CMapType 2 def\n");
    cmap.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let entries: Vec<(u16, char)> = mappings.iter().map(|(&gid, &ch)| (gid, ch)).collect();
    // At most 100 entries per bfchar section
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for &(gid, ch) in chunk {
            let mut units = [0u16; 2];
            let encoded = ch.encode_utf16(&mut units);
            let dst: String = encoded.iter().map(|u| format!("{:04X}", u)).collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, dst));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\n");
    cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
    cmap.push_str("end\n");
    cmap.push_str("end\n");
    cmap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bfchar_multiple_per_line() {
        let cmap = CMap::parse(b"2 beginbfchar <01> <0041> <02> <00C2> endbfchar");
        assert_eq!(cmap.lookup(0x01), Some("A"));
        assert_eq!(cmap.lookup(0x02), Some("\u{00C2}"));
        assert_eq!(cmap.code_bytes(), 1);
    }

    #[test]
    fn test_parse_bfrange_sequential() {
        let cmap = CMap::parse(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange");
        assert_eq!(cmap.len(), 95);
        assert_eq!(cmap.lookup(0x41), Some("A"));
        assert_eq!(cmap.lookup(0x7E), Some("~"));
        assert_eq!(cmap.code_bytes(), 2);
    }

    #[test]
    fn test_parse_bfrange_array_ligatures() {
        let data = b"beginbfrange\n<005F> <0061> [<00660066> <00660069> <00660066006C>]\nendbfrange";
        let cmap = CMap::parse(data);
        assert_eq!(cmap.lookup(0x5F), Some("ff"));
        assert_eq!(cmap.lookup(0x60), Some("fi"));
        assert_eq!(cmap.lookup(0x61), Some("ffl"));
        assert_eq!(cmap.len(), 3);
    }

    #[test]
    fn test_parse_surrogate_pair() {
        let cmap = CMap::parse(b"beginbfchar\n<0001> <D835DF0C>\nendbfchar");
        assert_eq!(cmap.lookup(1), Some("\u{1D70C}"));
    }

    #[test]
    fn test_codespace_sets_code_width() {
        let data = b"1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\nbeginbfchar\n<03> <0041>\nendbfchar";
        assert_eq!(CMap::parse(data).code_bytes(), 2);
    }

    #[test]
    fn test_reverse_prefers_lowest_code() {
        let cmap = CMap::parse(b"beginbfchar\n<05> <0041>\n<03> <0041>\n<04> <00660069>\nendbfchar");
        let reverse = cmap.reverse();
        assert_eq!(reverse.get(&'A'), Some(&3));
        assert_eq!(reverse.len(), 1);
    }

    #[test]
    fn test_generated_cmap_parses_back() {
        let mut mappings = BTreeMap::new();
        mappings.insert(36u16, 'A');
        mappings.insert(120u16, '\u{00C2}');
        mappings.insert(900u16, '\u{1F600}');
        let generated = generate_tounicode_cmap(&mappings);
        assert!(generated.contains("3 beginbfchar"));

        let cmap = CMap::parse(generated.as_bytes());
        assert_eq!(cmap.lookup(36), Some("A"));
        assert_eq!(cmap.lookup(120), Some("\u{00C2}"));
        assert_eq!(cmap.lookup(900), Some("\u{1F600}"));
        assert_eq!(cmap.code_bytes(), 2);
    }

    #[test]
    fn test_parse_empty() {
        let cmap = CMap::parse(b"");
        assert!(cmap.is_empty());
        assert_eq!(cmap.code_bytes(), 1);
    }
}
