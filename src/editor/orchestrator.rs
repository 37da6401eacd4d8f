//! Redact-and-reinsert text replacement.
//!
//! Replacing a run erases its glyphs, resolves a font for the new text and
//! writes it with the mutation engines in priority order. Each write is
//! verified by re-extracting the page; an engine whose output shows a
//! different font than requested counts as a fallback and the next engine
//! gets a chance to do better.

use std::str::FromStr;

use serde::Serialize;

use super::matcher::CorrespondenceMatcher;
use super::mutation::{AttemptOutcome, EngineAttempt, MutationEngine, MutationTarget};
use crate::elements::{Color, TextRun};
use crate::engine::{DocumentEngine, FontResource, TextPlacement};
use crate::error::{Error, Result};
use crate::fonts::{
    same_font_name, style_from_name, FontCache, FontCatalog, FontLocator, FontResolver, MatchQuality, Resolution,
};
use crate::geometry::Rect;

/// Largest font size difference still counted as the intended size.
const SIZE_SLACK: f32 = 0.5;

/// Padding is skipped when the new text is wider than this share of the block.
const PADDING_OVERFLOW: f32 = 1.2;

/// Horizontal placement of padded text inside the original block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Trailing spaces
    Left,
    /// Spaces split on both sides
    #[default]
    Center,
    /// Leading spaces
    Right,
}

impl FromStr for Alignment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Alignment::Left),
            "center" | "centre" => Ok(Alignment::Center),
            "right" => Ok(Alignment::Right),
            other => Err(Error::InvalidArgument(format!(
                "Unknown alignment '{}', expected left, center or right",
                other
            ))),
        }
    }
}

/// Caller-requested changes to how the new text looks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOverrides {
    /// Font to draw with instead of the run's own
    pub font_name: Option<String>,
    /// Font size in points
    pub font_size: Option<f32>,
    /// Fill colour
    pub color: Option<Color>,
    /// Baseline rotation in degrees
    pub rotation: Option<f32>,
    /// Baseline origin X
    pub x: Option<f32>,
    /// Baseline origin Y
    pub y: Option<f32>,
    /// Alignment used when padding
    pub alignment: Option<Alignment>,
    /// Pad the new text with spaces to the width of the original block
    pub pad: bool,
}

impl StyleOverrides {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw with another font.
    pub fn with_font_name(mut self, name: impl Into<String>) -> Self {
        self.font_name = Some(name.into());
        self
    }

    /// Draw at another size.
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Draw in another colour.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Draw rotated.
    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = Some(degrees);
        self
    }

    /// Draw at another position.
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Pad to the original block width with this alignment.
    pub fn with_padding(mut self, alignment: Alignment) -> Self {
        self.pad = true;
        self.alignment = Some(alignment);
        self
    }

    /// Placement of the new text for `run`.
    pub fn placement(&self, run: &TextRun) -> TextPlacement {
        let base = TextPlacement::from_run(run);
        TextPlacement {
            x: self.x.unwrap_or(base.x),
            y: self.y.unwrap_or(base.y),
            font_size: self.font_size.unwrap_or(base.font_size),
            color: self.color.unwrap_or(base.color),
            rotation: self.rotation.unwrap_or(base.rotation),
        }
    }
}

/// What happened to one replaced run.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    /// Id of the replaced run
    pub run_id: String,
    /// Page index (0-based)
    pub page: usize,
    /// Content before the edit
    pub original_content: String,
    /// Content written, padding included
    pub new_content: String,
    /// Font the new text should have been drawn with
    pub requested_font: String,
    /// Font the resolver picked
    pub resolved_font: String,
    /// Quality of that pick
    pub quality: MatchQuality,
    /// Full resolution
    #[serde(skip)]
    pub resolution: Resolution,
    /// Every engine attempt in order
    pub attempts: Vec<EngineAttempt>,
    /// Engine whose write was kept
    pub engine: MutationEngine,
    /// The kept write does not show the requested font
    pub font_degraded: bool,
    /// Run found on the page after the edit
    pub result: TextRun,
}

/// Replaces runs in a document, one at a time.
pub struct TextMutationOrchestrator<'a, L: FontLocator> {
    resolver: &'a FontResolver<L>,
    catalog: &'a FontCatalog,
    matcher: CorrespondenceMatcher,
    background: Color,
}

impl<'a, L: FontLocator> TextMutationOrchestrator<'a, L> {
    /// Orchestrator resolving against `catalog` and painting redactions with `background`.
    pub fn new(
        resolver: &'a FontResolver<L>,
        catalog: &'a FontCatalog,
        matcher: CorrespondenceMatcher,
        background: Color,
    ) -> Self {
        Self {
            resolver,
            catalog,
            matcher,
            background,
        }
    }

    /// Replace the content of `run` with `new_content`.
    ///
    /// On error the document is left as it was before the call.
    pub fn replace<E: DocumentEngine + ?Sized>(
        &self,
        doc: &mut E,
        cache: &mut FontCache,
        run: &TextRun,
        new_content: &str,
        overrides: &StyleOverrides,
    ) -> Result<MutationOutcome> {
        let content = if overrides.pad {
            pad_text(
                new_content,
                run.width,
                average_char_width(run),
                overrides.alignment.unwrap_or_default(),
            )
        } else {
            new_content.to_string()
        };

        let untouched = doc.checkpoint();
        let bbox = run.bbox();
        if let Err(err) = doc.redact(run.page, bbox, self.background) {
            doc.rollback(untouched);
            return Err(redaction_error(run.page, &bbox, err));
        }
        let redacted = doc.checkpoint();

        let desired = overrides.font_name.as_deref().unwrap_or(&run.font_name);
        let (bold, italic) = self
            .catalog
            .get(desired)
            .map(|descriptor| (descriptor.is_bold, descriptor.is_italic))
            .unwrap_or_else(|| style_from_name(desired));
        let resolution = self.resolver.resolve_cached(cache, desired, bold, italic, self.catalog);
        if resolution.quality == MatchQuality::Missing {
            doc.rollback(untouched);
            return Err(Error::FontUnavailable(format!(
                "nothing can draw text for '{}'",
                resolution.requested
            )));
        }

        let placement = overrides.placement(run);
        let page_font = overrides.font_name.as_deref().unwrap_or(if run.font_resource.is_empty() {
            run.font_name.as_str()
        } else {
            run.font_resource.as_str()
        });
        let loaded = FontResource::from_descriptor(&resolution.descriptor);
        let target = MutationTarget {
            run,
            placement,
            content: &content,
            resource: loaded.as_ref().ok(),
            document_font: page_font,
        };

        let mut attempts = Vec::with_capacity(MutationEngine::PRIORITY.len());
        let outcome = |attempts: Vec<EngineAttempt>, engine, font_degraded, result: TextRun| MutationOutcome {
            run_id: run.id.clone(),
            page: run.page,
            original_content: run.content.clone(),
            new_content: content.clone(),
            requested_font: desired.to_string(),
            resolved_font: resolution.resolved_name().to_string(),
            quality: resolution.quality,
            resolution: resolution.clone(),
            attempts,
            engine,
            font_degraded,
            result,
        };

        // Resource overlay
        let clock = EngineAttempt::started(MutationEngine::ResourceOverlay);
        let primary = match &loaded {
            Ok(_) => MutationEngine::ResourceOverlay
                .attempt(doc, &target, &self.matcher)
                .map_err(|e| e.to_string()),
            Err(e) => Err(format!("{} engine failed: {}", MutationEngine::ResourceOverlay, e)),
        };
        let primary_written = match primary {
            Ok(found) => {
                let (verdict, reason) = self.judge(desired, &placement, &found);
                let verified = verdict == AttemptOutcome::Verified;
                attempts.push(EngineAttempt::finish(clock, verdict, reason));
                if verified {
                    return Ok(outcome(attempts, MutationEngine::ResourceOverlay, false, found));
                }
                log::info!(
                    "{} engine fell back for run {} on page {}; retrying with {}",
                    MutationEngine::ResourceOverlay,
                    run.id,
                    run.page + 1,
                    MutationEngine::ContentStream
                );
                Some((doc.checkpoint(), found))
            },
            Err(message) => {
                log::info!("{}; retrying with {}", message, MutationEngine::ContentStream);
                attempts.push(EngineAttempt::finish(clock, AttemptOutcome::Failed(message), None));
                None
            },
        };

        // Content stream
        doc.rollback(redacted);
        let clock = EngineAttempt::started(MutationEngine::ContentStream);
        match MutationEngine::ContentStream.attempt(doc, &target, &self.matcher) {
            Ok(found) => {
                let (verdict, reason) = self.judge(desired, &placement, &found);
                let verified = verdict == AttemptOutcome::Verified;
                attempts.push(EngineAttempt::finish(clock, verdict, reason));
                if verified {
                    return Ok(outcome(attempts, MutationEngine::ContentStream, false, found));
                }
                match primary_written {
                    Some((state, first)) => {
                        doc.rollback(state);
                        Ok(outcome(attempts, MutationEngine::ResourceOverlay, true, first))
                    },
                    None => Ok(outcome(attempts, MutationEngine::ContentStream, true, found)),
                }
            },
            Err(err) => {
                attempts.push(EngineAttempt::finish(clock, AttemptOutcome::Failed(err.to_string()), None));
                match primary_written {
                    Some((state, first)) => {
                        doc.rollback(state);
                        Ok(outcome(attempts, MutationEngine::ResourceOverlay, true, first))
                    },
                    None => {
                        doc.rollback(untouched);
                        Err(Error::MutationEngineFailed {
                            page: run.page,
                            run_id: run.id.clone(),
                            reason: attempt_reasons(&attempts),
                        })
                    },
                }
            },
        }
    }

    /// Compare what the page shows with what was asked for.
    fn judge(&self, desired: &str, placement: &TextPlacement, found: &TextRun) -> (AttemptOutcome, Option<String>) {
        if !same_font_name(&found.font_name, desired) {
            let reason = format!("'{}' replaced by '{}'", desired, found.font_name);
            log::warn!("Font fallback detected: {}", reason);
            return (AttemptOutcome::FallbackDetected, Some(reason));
        }
        if (found.font_size - placement.font_size).abs() > SIZE_SLACK {
            let reason = format!("size {:.1} rendered as {:.1}", placement.font_size, found.font_size);
            log::warn!("Font fallback detected: {}", reason);
            return (AttemptOutcome::FallbackDetected, Some(reason));
        }
        (AttemptOutcome::Verified, None)
    }
}

fn redaction_error(page: usize, bbox: &Rect, err: Error) -> Error {
    match err {
        err @ Error::RedactionFailed { .. } => err,
        err if err.is_session_fatal() => err,
        other => Error::RedactionFailed {
            page,
            x: bbox.x,
            y: bbox.y,
            reason: other.to_string(),
        },
    }
}

fn attempt_reasons(attempts: &[EngineAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| match &attempt.outcome {
            AttemptOutcome::Failed(message) => message.clone(),
            AttemptOutcome::FallbackDetected => format!(
                "{} engine fell back: {}",
                attempt.engine,
                attempt.fallback_reason.as_deref().unwrap_or("font changed")
            ),
            AttemptOutcome::Verified => format!("{} engine verified", attempt.engine),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Width of one character if every glyph of the run were equally wide.
pub fn average_char_width(run: &TextRun) -> f32 {
    match run.char_count() {
        0 => 0.0,
        count => run.width / count as f32,
    }
}

/// Surround `content` with spaces so it spans about `block_width`.
///
/// Every character is taken to be `avg_char_width` wide. Content wider than
/// 120% of the block is returned unchanged.
pub fn pad_text(content: &str, block_width: f32, avg_char_width: f32, alignment: Alignment) -> String {
    if avg_char_width <= 0.0 || block_width <= 0.0 {
        return content.to_string();
    }
    let chars = content.chars().count();
    let estimated = chars as f32 * avg_char_width;
    if estimated > block_width * PADDING_OVERFLOW {
        log::warn!(
            "New text is about {:.1}pt wide, more than the {:.1}pt block; padding skipped",
            estimated,
            block_width
        );
        return content.to_string();
    }
    let slots = (block_width / avg_char_width).round() as usize;
    let spaces = slots.saturating_sub(chars);
    let (before, after) = match alignment {
        Alignment::Left => (0, spaces),
        Alignment::Right => (spaces, 0),
        Alignment::Center => (spaces / 2, spaces - spaces / 2),
    };
    format!("{}{}{}", " ".repeat(before), content, " ".repeat(after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FallbackFont, MatchPolicy};
    use crate::engine::PdfDocument;
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};
    use std::path::PathBuf;

    struct NoHostFonts;

    impl FontLocator for NoHostFonts {
        fn find(&self, _name: &str, _bold: bool, _italic: bool) -> Option<PathBuf> {
            None
        }
    }

    fn page_with(content: &str, font: Dictionary) -> PdfDocument {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(font);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        PdfDocument::from_document(doc).unwrap()
    }

    fn simple_font(base_font: &str) -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => base_font,
            "Encoding" => "WinAnsiEncoding",
        }
    }

    fn replace(doc: &mut PdfDocument, content: &str, overrides: &StyleOverrides) -> Result<MutationOutcome> {
        let resolver = FontResolver::new(NoHostFonts, FallbackFont::default());
        let catalog = FontCatalog::extract(doc).unwrap();
        let orchestrator = TextMutationOrchestrator::new(
            &resolver,
            &catalog,
            CorrespondenceMatcher::new(MatchPolicy::default()),
            Color::white(),
        );
        let run = doc.extract_page_runs(0).unwrap()[0].clone();
        orchestrator.replace(doc, &mut FontCache::new(), &run, content, overrides)
    }

    #[test]
    fn test_fallback_recovered_by_content_stream() {
        let mut doc = page_with("BT /F1 12 Tf 72 700 Td (ALCANTARA) Tj ET", simple_font("ArialMT"));
        let outcome = replace(&mut doc, "ALCÂNTARA", &StyleOverrides::new()).unwrap();

        assert_eq!(outcome.quality, MatchQuality::Fallback);
        assert_eq!(outcome.resolved_font, "Helvetica");
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::FallbackDetected);
        assert_eq!(
            outcome.attempts[0].fallback_reason.as_deref(),
            Some("'ArialMT' replaced by 'Helvetica'")
        );
        assert!(outcome.attempts[1].is_verified());
        assert_eq!(outcome.engine, MutationEngine::ContentStream);
        assert!(!outcome.font_degraded);

        let runs = doc.extract_page_runs(0).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].content, "ALCÂNTARA");
        assert_eq!(runs[0].font_name, "ArialMT");
    }

    #[test]
    fn test_standard_font_verified_by_primary() {
        let mut doc = page_with(
            "BT /F1 10 Tf 100 500 Td (Old text) Tj ET",
            dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" },
        );
        let outcome = replace(&mut doc, "New text", &StyleOverrides::new()).unwrap();
        assert_eq!(outcome.quality, MatchQuality::Exact);
        assert_eq!(outcome.engine, MutationEngine::ResourceOverlay);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.result.content, "New text");
    }

    #[test]
    fn test_degraded_when_override_font_absent() {
        let mut doc = page_with("BT /F1 12 Tf 72 700 Td (Hello) Tj ET", simple_font("ArialMT"));
        let overrides = StyleOverrides::new().with_font_name("Calibri");
        let outcome = replace(&mut doc, "Hello", &overrides).unwrap();
        assert!(outcome.font_degraded);
        assert_eq!(outcome.engine, MutationEngine::ResourceOverlay);
        assert!(matches!(outcome.attempts[1].outcome, AttemptOutcome::Failed(_)));
        let runs = doc.extract_page_runs(0).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].font_name, outcome.result.font_name);
    }

    #[test]
    fn test_both_engines_failing_restores_page() {
        let mut doc = page_with("BT /F1 12 Tf 72 700 Td (Hello) Tj ET", simple_font("ArialMT"));
        let err = replace(&mut doc, "日本語", &StyleOverrides::new()).unwrap_err();
        match err {
            Error::MutationEngineFailed { page, reason, .. } => {
                assert_eq!(page, 0);
                assert!(reason.contains("resource-overlay"));
                assert!(reason.contains("content-stream"));
            },
            other => panic!("unexpected error {other}"),
        }
        let runs = doc.extract_page_runs(0).unwrap();
        assert_eq!(runs[0].content, "Hello");
    }

    #[test]
    fn test_redaction_failure_leaves_document() {
        let mut doc = page_with("BT /F1 12 Tf 72 700 Td (Hello) Tj ET", simple_font("ArialMT"));
        let resolver = FontResolver::new(NoHostFonts, FallbackFont::default());
        let catalog = FontCatalog::extract(&doc).unwrap();
        let orchestrator =
            TextMutationOrchestrator::new(&resolver, &catalog, CorrespondenceMatcher::default(), Color::white());
        let phantom = TextRun::new(0, 400.0, 100.0, 30.0, 12.0, "Ghost", "ArialMT");
        let mut cache = FontCache::new();
        let err = orchestrator
            .replace(&mut doc, &mut cache, &phantom, "x", &StyleOverrides::new())
            .unwrap_err();
        assert!(matches!(err, Error::RedactionFailed { page: 0, .. }));
        assert!(cache.is_empty());
        assert_eq!(doc.extract_page_runs(0).unwrap()[0].content, "Hello");
    }

    #[test]
    fn test_overrides_move_the_text() {
        let mut doc = page_with("BT /F1 12 Tf 72 700 Td (Hello) Tj ET", simple_font("ArialMT"));
        let overrides = StyleOverrides::new().with_position(200.0, 300.0).with_font_size(14.0);
        let outcome = replace(&mut doc, "Moved", &overrides).unwrap();
        assert!((outcome.result.x - 200.0).abs() < 1e-3);
        assert!((outcome.result.y - 300.0).abs() < 1e-3);
        assert!((outcome.result.font_size - 14.0).abs() < 1e-3);
    }

    #[test]
    fn test_pad_text_alignments() {
        assert_eq!(pad_text("ab", 60.0, 10.0, Alignment::Center), "  ab  ");
        assert_eq!(pad_text("ab", 50.0, 10.0, Alignment::Center), " ab  ");
        assert_eq!(pad_text("ab", 40.0, 10.0, Alignment::Left), "ab  ");
        assert_eq!(pad_text("ab", 40.0, 10.0, Alignment::Right), "  ab");
    }

    #[test]
    fn test_pad_text_skips_overflow() {
        assert_eq!(pad_text("much too long", 50.0, 10.0, Alignment::Center), "much too long");
        // Within 20% of the block: no room for spaces, content kept
        assert_eq!(pad_text("abcdef", 55.0, 10.0, Alignment::Center), "abcdef");
    }

    #[test]
    fn test_alignment_from_str() {
        assert_eq!("Left".parse::<Alignment>().unwrap(), Alignment::Left);
        assert_eq!("centre".parse::<Alignment>().unwrap(), Alignment::Center);
        assert!("justify".parse::<Alignment>().is_err());
    }
}
