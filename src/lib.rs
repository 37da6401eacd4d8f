// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! # PDF Fontkeeper
//!
//! Edit text inside existing PDF documents while keeping the fonts the
//! document was drawn with, and say so plainly when that is not possible.
//!
//! ## Core Features
//!
//! - **Font catalogue**: every font a page references, subset prefixes
//!   removed, embedded programs kept
//! - **Font resolution**: embedded program, host font, family variant,
//!   base-14 substitute or last resort, each classified as
//!   `Exact`, `Variant`, `Fallback` or `Missing`
//! - **Redact and reinsert**: old glyphs are removed from the content
//!   stream, new text is written with the resolved font resource
//! - **Verified writes**: the page is re-read after every write; when the
//!   font shown is not the font requested, a second engine rewrites the
//!   text with the page's own font
//! - **Font report**: one entry per degraded font with pages, occurrences
//!   and installation hints; strict mode refuses degraded output
//! - **Page operations**: merge, delete, split, metadata editing
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_fontkeeper::config::EditConfig;
//! use pdf_fontkeeper::editor::{EditRequest, EditSession};
//!
//! let config = EditConfig::new().with_strict_fonts(true);
//! let mut session = EditSession::open("certificate.pdf", config)?;
//! session.apply(&EditRequest::by_content("ALCANTARA", "ALCÂNTARA"))?;
//! if session.report().has_degradation() {
//!     eprintln!("{}", session.report().render());
//! }
//! session.finish("certificate-fixed.pdf", |_| false)?;
//! # Ok::<(), pdf_fontkeeper::Error>(())
//! ```

pub mod config;
pub mod editor;
pub mod elements;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod geometry;

pub use config::{EditConfig, FallbackFont, MatchPolicy};
pub use editor::{EditRequest, EditSession, FontRequirementReport, MutationOutcome, StyleOverrides};
pub use elements::{Color, TextRun};
pub use engine::{DocumentEngine, PdfDocument};
pub use error::{Error, Result};
pub use fonts::{FontDescriptor, MatchQuality};
