//! Document engine boundary.
//!
//! The editor never touches PDF syntax itself; it drives a
//! [`DocumentEngine`]: extract runs and fonts, redact a box, insert or
//! rewrite text, snapshot and restore, save. [`PdfDocument`] is the
//! `lopdf`-backed implementation.

mod content;
mod document;
mod fonts;
pub mod pages;

use std::path::Path;

use lopdf::ObjectId;

use crate::elements::{Color, TextRun};
use crate::error::{Error, Result};
use crate::fonts::{FontDescriptor, FontProgram, FontSource, StandardFont};
use crate::geometry::Rect;

pub use content::{interpret_page, ShownText};
pub use document::{PdfCheckpoint, PdfDocument};
pub use fonts::PageFont;

/// Where and how inserted text is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    /// Baseline origin X in user space
    pub x: f32,
    /// Baseline origin Y in user space
    pub y: f32,
    /// Font size in points
    pub font_size: f32,
    /// Fill colour
    pub color: Color,
    /// Baseline rotation in degrees, counter-clockwise
    pub rotation: f32,
}

impl TextPlacement {
    /// Placement reproducing an extracted run.
    pub fn from_run(run: &TextRun) -> Self {
        Self {
            x: run.x,
            y: run.y,
            font_size: run.font_size,
            color: run.color,
            rotation: run.rotation,
        }
    }
}

/// A loaded font handed to the engine for insertion.
///
/// Insertion always goes through one of these, never through a bare font
/// name the engine could resolve differently.
#[derive(Debug, Clone)]
pub enum FontResource {
    /// A TrueType/OpenType program to embed
    Program {
        /// Name written as `/BaseFont` (before the subset tag)
        base_font: String,
        /// Parsed program
        program: FontProgram,
    },
    /// A base-14 font
    Standard(StandardFont),
    /// An existing font dictionary of the document
    Document {
        /// Normalised `/BaseFont` of the dictionary
        base_font: String,
        /// Font dictionary object
        object_id: ObjectId,
    },
}

impl FontResource {
    /// Load the resource a resolved descriptor points at.
    pub fn from_descriptor(descriptor: &FontDescriptor) -> Result<Self> {
        match &descriptor.source {
            FontSource::Embedded(bytes) => {
                if FontProgram::is_sfnt(bytes) {
                    if let Ok(program) = FontProgram::parse(bytes.clone()) {
                        return Ok(FontResource::Program {
                            base_font: descriptor.normalized_name.clone(),
                            program,
                        });
                    }
                }
                descriptor
                    .object_id
                    .map(|object_id| FontResource::Document {
                        base_font: descriptor.normalized_name.clone(),
                        object_id,
                    })
                    .ok_or_else(|| {
                        Error::Font(format!(
                            "Embedded program of '{}' cannot be re-embedded",
                            descriptor.normalized_name
                        ))
                    })
            },
            FontSource::System(path) => {
                let program = FontProgram::from_file(path)?;
                let base_font = program
                    .name()
                    .map(str::to_string)
                    .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                    .unwrap_or_else(|| descriptor.normalized_name.clone());
                Ok(FontResource::Program { base_font, program })
            },
            FontSource::Standard(font) => Ok(FontResource::Standard(*font)),
            FontSource::Unresolved => Err(Error::FontUnavailable(format!(
                "Font '{}' is not bound to a loadable program",
                descriptor.normalized_name
            ))),
        }
    }

    /// Name the font will carry in the document (without subset tag).
    pub fn base_font(&self) -> &str {
        match self {
            FontResource::Program { base_font, .. } => base_font,
            FontResource::Standard(font) => font.base_font(),
            FontResource::Document { base_font, .. } => base_font,
        }
    }
}

/// Operations the editor needs from a PDF document.
pub trait DocumentEngine {
    /// Whole-document snapshot.
    type Checkpoint: Clone;

    /// Number of pages.
    fn page_count(&self) -> usize;

    /// Text runs of one page (0-based).
    fn extract_page_runs(&self, page: usize) -> Result<Vec<TextRun>>;

    /// Text runs of every page, in page order.
    fn extract_text_runs(&self) -> Result<Vec<TextRun>> {
        let mut runs = Vec::new();
        for page in 0..self.page_count() {
            runs.extend(self.extract_page_runs(page)?);
        }
        Ok(runs)
    }

    /// Every font referenced from a page's resources.
    fn extract_fonts(&self) -> Result<Vec<FontDescriptor>>;

    /// Remove text shown inside `bbox` and paint it with `fill`.
    fn redact(&mut self, page: usize, bbox: Rect, fill: Color) -> Result<()>;

    /// Draw `content` with a loaded font resource.
    fn insert_text(
        &mut self,
        page: usize,
        placement: &TextPlacement,
        content: &str,
        font: &FontResource,
    ) -> Result<()>;

    /// Draw `content` with a font already on the page, found by resource
    /// key or by `/BaseFont`, encoded with that font's own encoding.
    fn rewrite_text(
        &mut self,
        page: usize,
        placement: &TextPlacement,
        content: &str,
        font_name: &str,
    ) -> Result<()>;

    /// Snapshot the document.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Restore a snapshot.
    fn rollback(&mut self, checkpoint: Self::Checkpoint);

    /// Serialize to `path`.
    fn save(&mut self, path: &Path) -> Result<()>;
}
