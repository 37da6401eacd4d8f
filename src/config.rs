//! Configuration for edit sessions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::elements::Color;
use crate::error::{Error, Result};
use crate::fonts::StandardFont;

/// Weights and tolerances used to pair an edited run with its original.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Score for being on the same page (required)
    pub same_page_weight: u32,
    /// Score for |dx| within `x_tolerance`
    pub x_weight: u32,
    /// Score for |dy| within `y_tolerance`
    pub y_weight: u32,
    /// Score for width and height within `size_tolerance`
    pub size_weight: u32,
    /// Score for content equal to the expected content
    pub exact_content_weight: u32,
    /// Score for content containing or contained in the expected content
    pub partial_content_weight: u32,
    /// Horizontal tolerance in points
    pub x_tolerance: f32,
    /// Vertical tolerance in points
    pub y_tolerance: f32,
    /// Size tolerance in points
    pub size_tolerance: f32,
    /// Minimum accepted score
    pub min_score: u32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchPolicy {
    /// Default weights 10/20/15/10/30/15, tolerances 1/3/5 pt, minimum 30.
    pub fn new() -> Self {
        Self {
            same_page_weight: 10,
            x_weight: 20,
            y_weight: 15,
            size_weight: 10,
            exact_content_weight: 30,
            partial_content_weight: 15,
            x_tolerance: 1.0,
            y_tolerance: 3.0,
            size_tolerance: 5.0,
            min_score: 30,
        }
    }

    /// Set the positional tolerances.
    pub fn with_tolerances(mut self, x: f32, y: f32, size: f32) -> Self {
        self.x_tolerance = x;
        self.y_tolerance = y;
        self.size_tolerance = size;
        self
    }

    /// Set the minimum accepted score.
    pub fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Highest score a candidate can reach.
    pub fn max_score(&self) -> u32 {
        self.same_page_weight
            + self.x_weight
            + self.y_weight
            + self.size_weight
            + self.exact_content_weight.max(self.partial_content_weight)
    }
}

/// Font used when nothing in the resolution chain applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FallbackFont {
    /// A base-14 font (always available)
    Standard(StandardFont),
    /// A font file on disk
    File(PathBuf),
}

impl Default for FallbackFont {
    fn default() -> Self {
        FallbackFont::Standard(StandardFont::Helvetica)
    }
}

/// Edit session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Refuse to write output when any font resolution is not exact
    pub strict_fonts: bool,
    /// Keep degraded output without asking
    pub force: bool,
    /// Replace every matching run instead of the first one
    pub all_occurrences: bool,
    /// Font directories to search instead of the platform defaults
    pub font_dirs: Option<Vec<PathBuf>>,
    /// Last-resort font
    pub fallback_font: FallbackFont,
    /// Correspondence matching policy
    pub match_policy: MatchPolicy,
    /// Colour painted over redacted text
    pub background: Color,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EditConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            strict_fonts: false,
            force: false,
            all_occurrences: false,
            font_dirs: None,
            fallback_font: FallbackFont::default(),
            match_policy: MatchPolicy::default(),
            background: Color::white(),
        }
    }

    /// Load configuration from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: EditConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let policy = &self.match_policy;
        if policy.x_tolerance < 0.0 || policy.y_tolerance < 0.0 || policy.size_tolerance < 0.0 {
            return Err(Error::Config("Match tolerances must not be negative".to_string()));
        }
        if policy.min_score > policy.max_score() {
            return Err(Error::Config(format!(
                "Minimum match score {} exceeds the maximum reachable score {}",
                policy.min_score,
                policy.max_score()
            )));
        }
        Ok(())
    }

    /// Enable strict font mode.
    pub fn with_strict_fonts(mut self, enable: bool) -> Self {
        self.strict_fonts = enable;
        self
    }

    /// Skip the confirmation for degraded output.
    pub fn with_force(mut self, enable: bool) -> Self {
        self.force = enable;
        self
    }

    /// Replace every matching run.
    pub fn with_all_occurrences(mut self, enable: bool) -> Self {
        self.all_occurrences = enable;
        self
    }

    /// Search these font directories.
    pub fn with_font_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.font_dirs = Some(dirs);
        self
    }

    /// Use this last-resort font.
    pub fn with_fallback_font(mut self, font: FallbackFont) -> Self {
        self.fallback_font = font;
        self
    }

    /// Use this matching policy.
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Paint redactions with this colour.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditConfig::default();
        assert!(!config.strict_fonts);
        assert_eq!(config.fallback_font, FallbackFont::Standard(StandardFont::Helvetica));
        assert_eq!(config.match_policy.min_score, 30);
        assert_eq!(config.match_policy.max_score(), 85);
        assert_eq!(config.background, Color::white());
    }

    #[test]
    fn test_builder() {
        let config = EditConfig::new()
            .with_strict_fonts(true)
            .with_force(true)
            .with_font_dirs(vec![PathBuf::from("/tmp/fonts")])
            .with_match_policy(MatchPolicy::new().with_min_score(40));
        assert!(config.strict_fonts && config.force);
        assert_eq!(config.font_dirs.as_deref(), Some(&[PathBuf::from("/tmp/fonts")][..]));
        assert_eq!(config.match_policy.min_score, 40);
    }

    #[test]
    fn test_from_json_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"strict_fonts": true, "fallback_font": {"Standard": "Times-Roman"}, "match_policy": {"x_tolerance": 2.0}}"#,
        )
        .unwrap();
        let config = EditConfig::from_json_file(&path).unwrap();
        assert!(config.strict_fonts);
        assert_eq!(config.fallback_font, FallbackFont::Standard(StandardFont::TimesRoman));
        assert_eq!(config.match_policy.x_tolerance, 2.0);
        assert_eq!(config.match_policy.y_tolerance, 3.0);
    }

    #[test]
    fn test_validate_rejects_unreachable_minimum() {
        let config = EditConfig::new().with_match_policy(MatchPolicy::new().with_min_score(200));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = EditConfig::from_json_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
