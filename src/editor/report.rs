//! Report of fonts that could not be preserved exactly.
//!
//! One entry per distinct font name, accumulating occurrences and pages,
//! so a font used a hundred times is reported once.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::fonts::{normalize_font_name, MatchQuality, Resolution};

/// Download pages for common families.
const DOWNLOAD_URLS: [(&str, &str); 8] = [
    ("Arial", "https://docs.microsoft.com/typography/font-list/arial"),
    ("ArialMT", "https://docs.microsoft.com/typography/font-list/arial"),
    ("ArialNarrow", "https://docs.microsoft.com/typography/font-list/arial-narrow"),
    ("ArialNarrow-Bold", "https://docs.microsoft.com/typography/font-list/arial-narrow"),
    ("Times", "https://docs.microsoft.com/typography/font-list/times-new-roman"),
    ("TimesNewRoman", "https://docs.microsoft.com/typography/font-list/times-new-roman"),
    ("Courier", "https://docs.microsoft.com/typography/font-list/courier-new"),
    ("CourierNew", "https://docs.microsoft.com/typography/font-list/courier-new"),
];

const RULE_WIDTH: usize = 80;

/// A font the session needed but could not use as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontRequirement {
    /// Normalized name of the font in the document
    pub font_name: String,
    /// Style words found in the name (`Bold Narrow`)
    pub variant: Option<String>,
    /// Worst resolution seen for this font
    pub quality: MatchQuality,
    /// Font drawn instead, `None` when nothing was usable
    pub resolved_font: Option<String>,
    /// Host file of the substitute, if any
    pub system_path: Option<PathBuf>,
    /// Where to get the original font
    pub download_url: String,
    /// How to install it on this platform
    pub installation_instructions: String,
    /// Number of runs affected
    pub occurrences: usize,
    /// Pages affected (0-based)
    pub pages: BTreeSet<usize>,
}

impl FontRequirement {
    /// Requirement for one affected run.
    pub fn new(font_name: &str, quality: MatchQuality, resolved_font: Option<String>, page: usize) -> Self {
        let font_name = normalize_font_name(font_name);
        Self {
            variant: variant_description(&font_name),
            download_url: download_url(&font_name),
            installation_instructions: installation_instructions().to_string(),
            font_name,
            quality,
            resolved_font,
            system_path: None,
            occurrences: 1,
            pages: BTreeSet::from([page]),
        }
    }

    /// Requirement derived from a non-exact resolution.
    pub fn from_resolution(resolution: &Resolution, page: usize) -> Self {
        let resolved = (resolution.quality != MatchQuality::Missing).then(|| resolution.resolved_name().to_string());
        let mut requirement = Self::new(&resolution.requested, resolution.quality, resolved, page);
        requirement.system_path = resolution.descriptor.system_path().map(PathBuf::from);
        requirement
    }

    /// Whether the user has to install something to get an exact result.
    pub fn needs_installation(&self) -> bool {
        self.quality.is_degraded()
    }
}

/// Session summary for logs and audits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Distinct fonts resolved during the session
    pub total_fonts: usize,
    /// Fonts not matched exactly
    pub degraded_fonts: usize,
    /// Per font details
    pub fonts: Vec<FontRequirement>,
    /// Whether anything was degraded
    pub has_issues: bool,
}

/// Accumulates font requirements over a session.
#[derive(Debug, Clone, Default)]
pub struct FontRequirementReport {
    requirements: IndexMap<String, FontRequirement>,
    seen: IndexSet<String>,
}

impl FontRequirementReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a requirement, merging with the entry of the same font.
    pub fn record(&mut self, requirement: FontRequirement) {
        self.seen.insert(requirement.font_name.clone());
        match self.requirements.get_mut(&requirement.font_name) {
            Some(existing) => {
                existing.occurrences += requirement.occurrences;
                existing.pages.extend(requirement.pages);
                if requirement.quality < existing.quality {
                    existing.quality = requirement.quality;
                    existing.resolved_font = requirement.resolved_font;
                    existing.system_path = requirement.system_path;
                }
            },
            None => {
                log::debug!(
                    "Font requirement recorded: '{}' ({})",
                    requirement.font_name,
                    requirement.quality
                );
                self.requirements.insert(requirement.font_name.clone(), requirement);
            },
        }
    }

    /// Note a resolution used for a run on `page`; only non-exact ones become requirements.
    pub fn record_resolution(&mut self, resolution: &Resolution, page: usize) {
        self.seen.insert(normalize_font_name(&resolution.requested));
        if resolution.quality.is_degraded() {
            self.record(FontRequirement::from_resolution(resolution, page));
        }
    }

    /// Note an exact resolution whose glyphs were nonetheless drawn with `shown_font`.
    pub fn record_degraded_write(&mut self, requested: &str, shown_font: &str, page: usize) {
        self.record(FontRequirement::new(
            requested,
            MatchQuality::Fallback,
            Some(normalize_font_name(shown_font)),
            page,
        ));
    }

    /// Requirement for a font, by name.
    pub fn get(&self, font_name: &str) -> Option<&FontRequirement> {
        self.requirements.get(&normalize_font_name(font_name))
    }

    /// Requirements in first-seen order.
    pub fn requirements(&self) -> impl Iterator<Item = &FontRequirement> {
        self.requirements.values()
    }

    /// Number of distinct degraded fonts.
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Whether no font was degraded.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Whether any font was not preserved exactly.
    pub fn has_degradation(&self) -> bool {
        self.requirements.values().any(FontRequirement::needs_installation)
    }

    /// Whether strict mode must refuse the output.
    pub fn should_block(&self, strict: bool) -> bool {
        strict && self.has_degradation()
    }

    /// Names of the degraded fonts.
    pub fn degraded_fonts(&self) -> Vec<String> {
        self.requirements
            .values()
            .filter(|r| r.needs_installation())
            .map(|r| r.font_name.clone())
            .collect()
    }

    /// Human-readable report, one block per font.
    pub fn render(&self) -> String {
        if !self.has_degradation() {
            return "All required fonts are available.".to_string();
        }

        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "{}", heavy);
        let _ = writeln!(out, "WARNING: FONTS NOT PRESERVED EXACTLY");
        let _ = writeln!(out, "{}", heavy);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} font(s) could not be reproduced exactly because they are not available.",
            self.len()
        );
        let _ = writeln!(out);

        for (index, req) in self.requirements.values().enumerate() {
            let _ = writeln!(out, "{}. Font: {}", index + 1, req.font_name);
            if let Some(variant) = &req.variant {
                let _ = writeln!(out, "   Variant: {}", variant);
            }
            let _ = writeln!(out, "   Match: {}", req.quality);
            let _ = writeln!(out, "   Used in: {} occurrence(s)", req.occurrences);
            let pages: Vec<String> = req.pages.iter().map(|p| (p + 1).to_string()).collect();
            let _ = writeln!(out, "   Pages: {}", pages.join(", "));
            match &req.resolved_font {
                Some(fallback) => {
                    let _ = writeln!(out, "   Fallback used: {}", fallback);
                },
                None => {
                    let _ = writeln!(out, "   No similar font found");
                },
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "   To install this font:");
            let _ = writeln!(out, "      Download: {}", req.download_url);
            for line in req.installation_instructions.lines() {
                let _ = writeln!(out, "      {}", line);
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", light);
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "Recommendation:");
        let _ = writeln!(out, "   Install the fonts listed above and run the command again");
        let _ = writeln!(out, "   to keep the original fonts.");
        let _ = writeln!(out);
        let _ = write!(out, "{}", heavy);
        out
    }

    /// Serializable summary.
    pub fn summary(&self) -> ReportSummary {
        let fonts: Vec<FontRequirement> = self.requirements.values().cloned().collect();
        let degraded_fonts = fonts.iter().filter(|r| r.needs_installation()).count();
        ReportSummary {
            total_fonts: self.seen.len(),
            degraded_fonts,
            has_issues: degraded_fonts > 0,
            fonts,
        }
    }
}

/// Style words found in a font name, in a fixed order.
pub fn variant_description(font_name: &str) -> Option<String> {
    let upper = font_name.to_uppercase();
    let mut words = Vec::new();
    if upper.contains("BOLD") {
        words.push("Bold");
    }
    if upper.contains("ITALIC") || upper.contains("OBLIQUE") {
        words.push("Italic");
    }
    if upper.contains("NARROW") {
        words.push("Narrow");
    }
    if upper.contains("CONDENSED") {
        words.push("Condensed");
    }
    if upper.contains("LIGHT") {
        words.push("Light");
    }
    if upper.contains("BLACK") {
        words.push("Black");
    }
    (!words.is_empty()).then(|| words.join(" "))
}

/// Download page for a font; a web search when the family is unknown.
pub fn download_url(font_name: &str) -> String {
    if let Some((_, url)) = DOWNLOAD_URLS.iter().find(|(key, _)| *key == font_name) {
        return url.to_string();
    }
    let lower = font_name.to_lowercase();
    DOWNLOAD_URLS
        .iter()
        .find(|(key, _)| {
            let key = key.to_lowercase();
            lower.contains(&key) || key.contains(&lower)
        })
        .map(|(_, url)| url.to_string())
        .unwrap_or_else(|| format!("https://www.google.com/search?q=download+{}+font", font_name.replace(' ', "+")))
}

/// Installation steps for the platform this binary was built for.
pub fn installation_instructions() -> &'static str {
    if cfg!(target_os = "linux") {
        "1. Download the font file (.ttf or .otf)\n\
         2. Copy it to ~/.fonts/ or /usr/share/fonts/\n\
         3. Run: fc-cache -f -v\n\
         4. Run the command again"
    } else if cfg!(target_os = "macos") {
        "1. Download the font file (.ttf or .otf)\n\
         2. Open Font Book\n\
         3. Drag the file into Font Book or use 'File > Add Fonts'\n\
         4. Run the command again"
    } else {
        "1. Download the font file (.ttf or .otf)\n\
         2. Right-click the file\n\
         3. Select 'Install' or 'Install for all users'\n\
         4. Run the command again"
    }
}
