//! Host font discovery.
//!
//! The locator answers "is there a file on this machine that looks like
//! font X?". Not finding one is an expected outcome and is reported as
//! `None`.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use super::descriptor::normalize_font_name;

/// Width/weight modifiers ignored by the generic family match.
const WIDTH_MODIFIERS: [&str; 9] = [
    "narrow",
    "condensed",
    "compressed",
    "extended",
    "cond",
    "wide",
    "light",
    "black",
    "semibold",
];

/// Vendor suffixes dropped from PostScript names (`ArialMT`, `TimesNewRomanPSMT`).
const VENDOR_SUFFIXES: [&str; 3] = ["psmt", "mt", "ps"];

/// Style words, longest first so `bolditalic` wins over `bold`.
const STYLE_WORDS: [&str; 6] = ["bolditalic", "boldoblique", "bold", "italic", "oblique", "regular"];

/// Anything that can find a font file for a name and style.
pub trait FontLocator {
    /// Find a font file for `name` in the given style.
    fn find(&self, name: &str, bold: bool, italic: bool) -> Option<PathBuf>;
}

impl<T: FontLocator + ?Sized> FontLocator for &T {
    fn find(&self, name: &str, bold: bool, italic: bool) -> Option<PathBuf> {
        (**self).find(name, bold, italic)
    }
}

impl<T: FontLocator + ?Sized> FontLocator for Box<T> {
    fn find(&self, name: &str, bold: bool, italic: bool) -> Option<PathBuf> {
        (**self).find(name, bold, italic)
    }
}

/// One indexed font file.
#[derive(Debug, Clone)]
struct IndexedFile {
    path: PathBuf,
    /// Lowercase stem without separators
    key: String,
}

/// Searches OS font directories for font files.
///
/// The directory tree is walked once, on the first lookup.
#[derive(Debug)]
pub struct SystemFontLocator {
    dirs: Vec<PathBuf>,
    index: OnceCell<Vec<IndexedFile>>,
}

impl SystemFontLocator {
    /// Locator over the platform's standard font directories.
    pub fn new() -> Self {
        Self::with_dirs(default_font_dirs())
    }

    /// Locator over explicit directories.
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            index: OnceCell::new(),
        }
    }

    /// Directories searched by this locator.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn index(&self) -> &[IndexedFile] {
        self.index.get_or_init(|| {
            let mut files = Vec::new();
            for dir in &self.dirs {
                collect_font_files(dir, &mut files, 0);
            }
            files.sort_by(|a, b| a.key.len().cmp(&b.key.len()).then_with(|| a.path.cmp(&b.path)));
            log::debug!("Indexed {} font files in {} directories", files.len(), self.dirs.len());
            files
        })
    }

    fn exact(&self, family: &str, bold: bool, italic: bool) -> Option<PathBuf> {
        let wanted: Vec<String> = style_suffixes(bold, italic)
            .iter()
            .map(|suffix| format!("{}{}", family, suffix))
            .collect();
        // Suffix order expresses preference, so look them up in that order
        wanted.iter().find_map(|key| {
            self.index()
                .iter()
                .find(|file| &file.key == key)
                .map(|file| file.path.clone())
        })
    }

    fn prefix(&self, name_key: &str, bold: bool, italic: bool) -> Option<PathBuf> {
        let candidates: Vec<&IndexedFile> = self
            .index()
            .iter()
            .filter(|file| file.key.starts_with(name_key))
            .collect();
        candidates
            .iter()
            .find(|file| key_style(&file.key) == (bold, italic))
            .or_else(|| candidates.first())
            .map(|file| file.path.clone())
    }
}

impl Default for SystemFontLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FontLocator for SystemFontLocator {
    fn find(&self, name: &str, bold: bool, italic: bool) -> Option<PathBuf> {
        let name_key = font_key(&normalize_font_name(name));
        if name_key.is_empty() {
            return None;
        }
        let (family, name_bold, name_italic) = split_style(&strip_vendor_suffix(&name_key));
        let bold = bold || name_bold;
        let italic = italic || name_italic;

        if let Some(path) = self.exact(&family, bold, italic) {
            log::debug!("Font '{}' found by file name: {}", name, path.display());
            return Some(path);
        }
        if let Some(path) = self.prefix(&family, bold, italic) {
            log::debug!("Font '{}' found by family prefix: {}", name, path.display());
            return Some(path);
        }
        let generic = strip_width_modifiers(&family);
        if generic != family && !generic.is_empty() {
            if let Some(path) = self.exact(&generic, bold, italic) {
                log::debug!("Font '{}' found by generic family '{}': {}", name, generic, path.display());
                return Some(path);
            }
        }
        log::debug!("Font '{}' not found in system font directories", name);
        None
    }
}

/// File-name suffixes of a style, in order of preference.
fn style_suffixes(bold: bool, italic: bool) -> &'static [&'static str] {
    match (bold, italic) {
        (false, false) => &["", "regular", "mt", "r"],
        (true, false) => &["bd", "bold", "b", "boldmt"],
        (false, true) => &["i", "italic", "it", "oblique", "italicmt"],
        (true, true) => &["bi", "bolditalic", "z", "boldoblique", "bolditalicmt"],
    }
}

/// Lowercase ASCII alphanumerics of a name.
fn font_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn strip_vendor_suffix(key: &str) -> String {
    for suffix in VENDOR_SUFFIXES {
        if let Some(stripped) = key.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    key.to_string()
}

/// Split trailing style words off a key: `arialnarrowbold` -> (`arialnarrow`, bold).
fn split_style(key: &str) -> (String, bool, bool) {
    let mut family = key.to_string();
    let mut bold = false;
    let mut italic = false;
    loop {
        let Some(word) = STYLE_WORDS.iter().find(|w| family.ends_with(*w) && family.len() > w.len()) else {
            break;
        };
        family.truncate(family.len() - word.len());
        bold |= word.starts_with("bold");
        italic |= word.contains("italic") || word.contains("oblique");
    }
    (family, bold, italic)
}

fn key_style(key: &str) -> (bool, bool) {
    let (_, bold, italic) = split_style(&strip_vendor_suffix(key));
    (bold, italic)
}

fn strip_width_modifiers(family: &str) -> String {
    let mut generic = family.to_string();
    for modifier in WIDTH_MODIFIERS {
        generic = generic.replace(modifier, "");
    }
    generic
}

fn collect_font_files(dir: &Path, files: &mut Vec<IndexedFile>, depth: usize) {
    // Font trees are shallow; bail out of symlink loops
    if depth > 8 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, files, depth + 1);
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
            .unwrap_or(false);
        if !is_font {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            let key = font_key(stem);
            files.push(IndexedFile { path, key });
        }
    }
}

/// Standard font directories of the current platform.
pub fn default_font_dirs() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut dirs = Vec::new();
    if cfg!(target_os = "windows") {
        let windir = std::env::var_os("WINDIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("C:\\Windows"));
        dirs.push(windir.join("Fonts"));
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Microsoft").join("Windows").join("Fonts"));
        }
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = &home {
            dirs.push(home.join("Library").join("Fonts"));
        }
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = &home {
            dirs.push(home.join(".fonts"));
            dirs.push(home.join(".local").join("share").join("fonts"));
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn font_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            fs::write(dir.path().join(name), b"not really a font").unwrap();
        }
        dir
    }

    #[test]
    fn test_split_style() {
        assert_eq!(split_style("arialnarrowbold"), ("arialnarrow".to_string(), true, false));
        assert_eq!(split_style("timesbolditalic"), ("times".to_string(), true, true));
        assert_eq!(split_style("bold"), ("bold".to_string(), false, false));
        assert_eq!(strip_vendor_suffix("arialmt"), "arial");
        assert_eq!(strip_vendor_suffix("timesnewromanpsmt"), "timesnewroman");
    }

    #[test]
    fn test_exact_file_name_match() {
        let dir = font_dir(&["arial.ttf", "arialbd.ttf", "ariali.ttf", "times.ttf"]);
        let locator = SystemFontLocator::with_dirs(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.find("ArialMT", false, false), Some(dir.path().join("arial.ttf")));
        assert_eq!(locator.find("Arial-BoldMT", false, false), Some(dir.path().join("arialbd.ttf")));
        assert_eq!(locator.find("ABCDEF+ArialMT", false, true), Some(dir.path().join("ariali.ttf")));
    }

    #[test]
    fn test_prefix_match_for_vendor_variants() {
        let dir = font_dir(&["ArialNarrow7.ttf", "ArialNarrow7-Bold.ttf"]);
        let locator = SystemFontLocator::with_dirs(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.find("ArialNarrow", false, false), Some(dir.path().join("ArialNarrow7.ttf")));
        assert_eq!(
            locator.find("ArialNarrow-Bold", false, false),
            Some(dir.path().join("ArialNarrow7-Bold.ttf"))
        );
    }

    #[test]
    fn test_generic_family_only_without_prefix_match() {
        let dir = font_dir(&["arial.ttf", "arialbd.ttf"]);
        let locator = SystemFontLocator::with_dirs(vec![dir.path().to_path_buf()]);
        assert_eq!(
            locator.find("ArialNarrow-Bold", false, false),
            Some(dir.path().join("arialbd.ttf"))
        );
    }

    #[test]
    fn test_no_match_is_none() {
        let dir = font_dir(&["DejaVuSans.ttf", "readme.txt"]);
        let locator = SystemFontLocator::with_dirs(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.find("Garamond", false, false), None);
        assert_eq!(locator.find("readme", false, false), None);
        assert_eq!(locator.find("", false, false), None);
    }

    #[test]
    fn test_missing_directories_are_ignored() {
        let locator = SystemFontLocator::with_dirs(vec![PathBuf::from("/nonexistent/fonts")]);
        assert_eq!(locator.find("Arial", false, false), None);
    }

    #[test]
    fn test_nested_directories_are_indexed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("truetype").join("msttcorefonts")).unwrap();
        let nested = dir.path().join("truetype").join("msttcorefonts").join("Courier_New.ttf");
        fs::write(&nested, b"x").unwrap();
        let locator = SystemFontLocator::with_dirs(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.find("CourierNewPSMT", false, false), Some(nested));
    }
}
