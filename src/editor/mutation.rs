//! Mutation engines.
//!
//! Two ways of writing replacement text are tried in a fixed order. The
//! resource overlay draws with the resolved font resource; the content
//! stream engine re-encodes the text with a font the page already has.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::matcher::CorrespondenceMatcher;
use crate::elements::TextRun;
use crate::engine::{DocumentEngine, FontResource, TextPlacement};
use crate::error::Error;

/// A strategy for writing replacement glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationEngine {
    /// Insert through the engine with a loaded [`FontResource`]
    ResourceOverlay,
    /// Append raw operators using a font resource already on the page
    ContentStream,
}

impl MutationEngine {
    /// Engines in the order they are tried.
    pub const PRIORITY: [MutationEngine; 2] =
        [MutationEngine::ResourceOverlay, MutationEngine::ContentStream];

    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            MutationEngine::ResourceOverlay => "resource-overlay",
            MutationEngine::ContentStream => "content-stream",
        }
    }

    /// Write `content` and return the run found where it was written.
    ///
    /// The returned run is what the page actually shows after the write;
    /// its font may differ from the one asked for.
    pub fn attempt<E: DocumentEngine + ?Sized>(
        &self,
        doc: &mut E,
        target: &MutationTarget<'_>,
        matcher: &CorrespondenceMatcher,
    ) -> Result<TextRun, EngineError> {
        let wrap = |source: Error| EngineError {
            engine: *self,
            source,
        };
        match self {
            MutationEngine::ResourceOverlay => {
                let resource = target
                    .resource
                    .ok_or_else(|| wrap(Error::Font("no font resource was loaded".to_string())))?;
                doc.insert_text(target.run.page, &target.placement, target.content, resource)
                    .map_err(wrap)?
            },
            MutationEngine::ContentStream => doc
                .rewrite_text(target.run.page, &target.placement, target.content, target.document_font)
                .map_err(wrap)?,
        }

        let candidates = doc.extract_page_runs(target.run.page).map_err(wrap)?;
        let expected = target.expected_run();
        matcher
            .find(&expected, target.content, &candidates)
            .map(|matched| matched.run)
            .ok_or_else(|| {
                wrap(Error::RunNotFound {
                    selector: target.content.to_string(),
                })
            })
    }
}

impl fmt::Display for MutationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a mutation engine should write.
#[derive(Debug, Clone)]
pub struct MutationTarget<'a> {
    /// Run being replaced
    pub run: &'a TextRun,
    /// Where the new text goes
    pub placement: TextPlacement,
    /// New text
    pub content: &'a str,
    /// Loaded font for the resource overlay
    pub resource: Option<&'a FontResource>,
    /// Page font (resource key or base name) for the content stream engine
    pub document_font: &'a str,
}

impl MutationTarget<'_> {
    /// The run the page should show once the write succeeded.
    fn expected_run(&self) -> TextRun {
        let mut expected = self.run.clone();
        expected.x = self.placement.x;
        expected.y = self.placement.y;
        expected.font_size = self.placement.font_size;
        expected.height = self.placement.font_size;
        expected.content = self.content.to_string();
        expected
    }
}

/// A mutation engine failed.
#[derive(Debug, thiserror::Error)]
#[error("{engine} engine failed: {source}")]
pub struct EngineError {
    /// Engine that failed
    pub engine: MutationEngine,
    /// Underlying error
    pub source: Error,
}

/// How one engine attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum AttemptOutcome {
    /// Text written with the intended font
    Verified,
    /// Text written, but the page shows a different font or size
    FallbackDetected,
    /// The engine reported an error
    Failed(String),
}

/// Record of one engine attempt.
#[derive(Debug, Clone, Serialize)]
pub struct EngineAttempt {
    /// Engine tried
    pub engine: MutationEngine,
    /// Result
    pub outcome: AttemptOutcome,
    /// What replaced the intended font, when a fallback was detected
    pub fallback_reason: Option<String>,
    /// Time spent
    pub elapsed: Duration,
}

impl EngineAttempt {
    pub(crate) fn started(engine: MutationEngine) -> (Instant, MutationEngine) {
        (Instant::now(), engine)
    }

    pub(crate) fn finish(
        start: (Instant, MutationEngine),
        outcome: AttemptOutcome,
        fallback_reason: Option<String>,
    ) -> Self {
        let (started, engine) = start;
        let attempt = Self {
            engine,
            outcome,
            fallback_reason,
            elapsed: started.elapsed(),
        };
        log::debug!("{} attempt: {:?} in {:?}", attempt.engine, attempt.outcome, attempt.elapsed);
        attempt
    }

    /// Whether the attempt wrote the intended font.
    pub fn is_verified(&self) -> bool {
        self.outcome == AttemptOutcome::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(
            MutationEngine::PRIORITY,
            [MutationEngine::ResourceOverlay, MutationEngine::ContentStream]
        );
        assert_eq!(MutationEngine::ContentStream.to_string(), "content-stream");
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError {
            engine: MutationEngine::ContentStream,
            source: Error::FontNotInDocument("F9".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "content-stream engine failed: Font 'F9' is not present in the document"
        );
    }

    #[test]
    fn test_attempt_serializes() {
        let attempt = EngineAttempt::finish(
            EngineAttempt::started(MutationEngine::ResourceOverlay),
            AttemptOutcome::FallbackDetected,
            Some("'ArialMT' replaced by 'Helvetica'".to_string()),
        );
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["engine"], "resource-overlay");
        assert_eq!(json["outcome"]["status"], "fallback_detected");
        assert!(!attempt.is_verified());
    }
}
