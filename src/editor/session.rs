//! Edit sessions.
//!
//! A session owns one open document, the font cache and the requirement
//! report. Edits are applied in memory; nothing reaches the output path
//! until [`EditSession::finish`] decides the result may be kept.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::matcher::CorrespondenceMatcher;
use super::orchestrator::{MutationOutcome, StyleOverrides, TextMutationOrchestrator};
use super::report::{FontRequirementReport, ReportSummary};
use crate::config::EditConfig;
use crate::elements::TextRun;
use crate::engine::{DocumentEngine, PdfDocument};
use crate::error::{Error, Result};
use crate::fonts::{FontCache, FontCatalog, FontDescriptor, FontLocator, FontResolver, Resolution, SystemFontLocator};

/// Which runs an edit applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The run with this id; its whole content is replaced
    Id(String),
    /// Runs containing this text; only the text itself is replaced
    Content(String),
}

impl Selector {
    fn describe(&self) -> &str {
        match self {
            Selector::Id(id) => id,
            Selector::Content(text) => text,
        }
    }
}

/// One requested edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    /// Runs to edit
    pub selector: Selector,
    /// Replacement text
    pub new_content: String,
    /// Style changes
    pub overrides: StyleOverrides,
}

impl EditRequest {
    /// Replace the whole run with id `id`.
    pub fn by_id(id: impl Into<String>, new_content: impl Into<String>) -> Self {
        Self {
            selector: Selector::Id(id.into()),
            new_content: new_content.into(),
            overrides: StyleOverrides::default(),
        }
    }

    /// Replace `search` wherever a run contains it.
    pub fn by_content(search: impl Into<String>, new_content: impl Into<String>) -> Self {
        Self {
            selector: Selector::Content(search.into()),
            new_content: new_content.into(),
            overrides: StyleOverrides::default(),
        }
    }

    /// Apply style overrides.
    pub fn with_overrides(mut self, overrides: StyleOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// A run that could not be edited while the rest of the batch went on.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    /// Run id
    pub run_id: String,
    /// Page index (0-based)
    pub page: usize,
    /// Error message
    pub error: String,
}

/// Machine-readable record of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAudit {
    /// Local time the audit was taken (RFC 3339)
    pub timestamp: String,
    /// Input file, when opened from disk
    pub input: Option<PathBuf>,
    /// MD5 of the input bytes
    pub input_md5: Option<String>,
    /// Output file, once written
    pub output: Option<PathBuf>,
    /// MD5 of the output file
    pub output_md5: Option<String>,
    /// Successful edits
    pub edits: Vec<MutationOutcome>,
    /// Runs left unchanged because both engines failed
    pub failures: Vec<RunFailure>,
    /// Font report summary
    pub fonts: ReportSummary,
}

impl SessionAudit {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Editing state for one document.
pub struct EditSession<E: DocumentEngine = PdfDocument> {
    document: E,
    config: EditConfig,
    resolver: FontResolver<Box<dyn FontLocator>>,
    catalog: FontCatalog,
    cache: FontCache,
    report: FontRequirementReport,
    outcomes: Vec<MutationOutcome>,
    failures: Vec<RunFailure>,
    input: Option<(PathBuf, String)>,
    output: Option<PathBuf>,
}

impl EditSession<PdfDocument> {
    /// Open a PDF file for editing.
    pub fn open(path: impl AsRef<Path>, config: EditConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let document = PdfDocument::from_bytes(&bytes)?;
        log::info!("Opened {} ({} page(s))", path.display(), document.page_count());
        let mut session = Self::new(document, config)?;
        session.input = Some((path.to_path_buf(), md5_hex(&bytes)));
        Ok(session)
    }
}

impl<E: DocumentEngine> EditSession<E> {
    /// Session over an open document, searching host fonts per `config`.
    pub fn new(document: E, config: EditConfig) -> Result<Self> {
        let locator: Box<dyn FontLocator> = match &config.font_dirs {
            Some(dirs) => Box::new(SystemFontLocator::with_dirs(dirs.clone())),
            None => Box::new(SystemFontLocator::new()),
        };
        Self::with_locator(document, config, locator)
    }

    /// Session using a custom font locator.
    pub fn with_locator(document: E, config: EditConfig, locator: Box<dyn FontLocator>) -> Result<Self> {
        config.validate()?;
        let catalog = FontCatalog::extract(&document)?;
        let resolver = FontResolver::new(locator, config.fallback_font.clone());
        Ok(Self {
            document,
            config,
            resolver,
            catalog,
            cache: FontCache::new(),
            report: FontRequirementReport::new(),
            outcomes: Vec::new(),
            failures: Vec::new(),
            input: None,
            output: None,
        })
    }

    /// The document being edited.
    pub fn document(&self) -> &E {
        &self.document
    }

    /// The session configuration.
    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    /// Fonts the document references.
    pub fn catalog(&self) -> &FontCatalog {
        &self.catalog
    }

    /// Resolutions made so far.
    pub fn cache(&self) -> &FontCache {
        &self.cache
    }

    /// Fonts not preserved exactly so far.
    pub fn report(&self) -> &FontRequirementReport {
        &self.report
    }

    /// Every successful edit, in order.
    pub fn outcomes(&self) -> &[MutationOutcome] {
        &self.outcomes
    }

    /// Runs that could not be edited.
    pub fn failures(&self) -> &[RunFailure] {
        &self.failures
    }

    /// Current text runs of the document.
    pub fn runs(&self) -> Result<Vec<TextRun>> {
        self.document.extract_text_runs()
    }

    /// Resolve every catalogued font without editing anything.
    pub fn font_resolutions(&mut self) -> Vec<(FontDescriptor, Resolution)> {
        let fonts: Vec<FontDescriptor> = self.catalog.iter().cloned().collect();
        fonts
            .into_iter()
            .map(|font| {
                let resolution = self.resolver.resolve_cached(
                    &mut self.cache,
                    &font.normalized_name,
                    font.is_bold,
                    font.is_italic,
                    &self.catalog,
                );
                (font, resolution)
            })
            .collect()
    }

    /// Apply one edit to every selected run.
    ///
    /// A run whose mutation fails is recorded in [`failures`](Self::failures)
    /// and skipped; session-fatal errors stop the batch.
    pub fn apply(&mut self, request: &EditRequest) -> Result<Vec<MutationOutcome>> {
        let targets = self.select(&request.selector)?;
        let orchestrator = TextMutationOrchestrator::new(
            &self.resolver,
            &self.catalog,
            CorrespondenceMatcher::new(self.config.match_policy),
            self.config.background,
        );

        let mut applied = Vec::new();
        for run in &targets {
            let new_content = replacement(run, &request.selector, &request.new_content, self.config.all_occurrences);
            match orchestrator.replace(&mut self.document, &mut self.cache, run, &new_content, &request.overrides) {
                Ok(outcome) => {
                    log::debug!(
                        "Run {} on page {}: '{}' -> '{}' via {}{}",
                        outcome.run_id,
                        outcome.page + 1,
                        outcome.original_content,
                        outcome.new_content,
                        outcome.engine,
                        if outcome.font_degraded { " (font degraded)" } else { "" }
                    );
                    self.report.record_resolution(&outcome.resolution, outcome.page);
                    if outcome.font_degraded && !outcome.quality.is_degraded() {
                        self.report
                            .record_degraded_write(&outcome.requested_font, &outcome.result.font_name, outcome.page);
                    }
                    applied.push(outcome);
                },
                Err(err) if err.is_session_fatal() => return Err(err),
                Err(err) => {
                    log::warn!("Run {} on page {} left unchanged: {}", run.id, run.page + 1, err);
                    self.failures.push(RunFailure {
                        run_id: run.id.clone(),
                        page: run.page,
                        error: err.to_string(),
                    });
                },
            }
        }
        log::info!("Edited {} of {} selected run(s)", applied.len(), targets.len());
        self.outcomes.extend(applied.iter().cloned());
        Ok(applied)
    }

    fn select(&self, selector: &Selector) -> Result<Vec<TextRun>> {
        let runs = self.document.extract_text_runs()?;
        let mut selected: Vec<TextRun> = match selector {
            Selector::Id(id) => runs.into_iter().filter(|run| &run.id == id).collect(),
            Selector::Content(text) => runs.into_iter().filter(|run| run.content.contains(text.as_str())).collect(),
        };
        if selected.is_empty() {
            return Err(Error::RunNotFound {
                selector: selector.describe().to_string(),
            });
        }
        if !self.config.all_occurrences {
            selected.truncate(1);
        }
        Ok(selected)
    }

    /// Decide whether the edited document may be kept and write it.
    ///
    /// Strict mode refuses any degraded font. Otherwise degraded output is
    /// kept when `force` is set or `confirm` agrees. The file is written
    /// next to `output` and moved into place, so a refused or failed finish
    /// never touches `output`.
    pub fn finish<F>(&mut self, output: impl AsRef<Path>, confirm: F) -> Result<()>
    where
        F: FnOnce(&FontRequirementReport) -> bool,
    {
        let output = output.as_ref();
        if self.report.should_block(self.config.strict_fonts) {
            let fonts = self.report.degraded_fonts();
            log::warn!("Strict font mode: discarding output for {}", output.display());
            return Err(Error::StrictFontBlock { fonts });
        }
        if self.report.has_degradation() && !self.config.force && !confirm(&self.report) {
            return Err(Error::Cancelled(format!(
                "{} font(s) would be degraded; {} not written",
                self.report.len(),
                output.display()
            )));
        }

        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staged = NamedTempFile::new_in(&dir)?;
        self.document.save(staged.path())?;
        staged.persist(output).map_err(|e| Error::Io(e.error))?;
        log::info!("Wrote {}", output.display());
        self.output = Some(output.to_path_buf());
        Ok(())
    }

    /// Audit record of the session so far.
    pub fn audit(&self) -> Result<SessionAudit> {
        let output_md5 = match &self.output {
            Some(path) => Some(md5_hex(&std::fs::read(path)?)),
            None => None,
        };
        Ok(SessionAudit {
            timestamp: chrono::Local::now().to_rfc3339(),
            input: self.input.as_ref().map(|(path, _)| path.clone()),
            input_md5: self.input.as_ref().map(|(_, digest)| digest.clone()),
            output: self.output.clone(),
            output_md5,
            edits: self.outcomes.clone(),
            failures: self.failures.clone(),
            fonts: self.report.summary(),
        })
    }
}

/// Content a run gets for a request.
fn replacement(run: &TextRun, selector: &Selector, new_content: &str, all_occurrences: bool) -> String {
    match selector {
        Selector::Id(_) => new_content.to_string(),
        Selector::Content(search) if all_occurrences => run.content.replace(search.as_str(), new_content),
        Selector::Content(search) => run.content.replacen(search.as_str(), new_content, 1),
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_replacement_keeps_surroundings() {
        let run = TextRun::new(0, 0.0, 0.0, 10.0, 10.0, "LUIZ EDUARDO ALVES DE ALCANTARA", "ArialMT");
        let selector = Selector::Content("ALCANTARA".to_string());
        assert_eq!(
            replacement(&run, &selector, "ALCÂNTARA", false),
            "LUIZ EDUARDO ALVES DE ALCÂNTARA"
        );
    }

    #[test]
    fn test_replacement_occurrences() {
        let run = TextRun::new(0, 0.0, 0.0, 10.0, 10.0, "a-b-a", "ArialMT");
        let selector = Selector::Content("a".to_string());
        assert_eq!(replacement(&run, &selector, "x", false), "x-b-a");
        assert_eq!(replacement(&run, &selector, "x", true), "x-b-x");
        assert_eq!(replacement(&run, &Selector::Id(run.id.clone()), "whole", false), "whole");
    }

    #[test]
    fn test_md5_hex() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
