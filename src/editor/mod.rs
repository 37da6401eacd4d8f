//! Font-preserving text editing.
//!
//! ## Architecture
//!
//! ```text
//! EditSession (document, font cache, report)
//!     ↓
//! TextMutationOrchestrator
//!     redact → resolve font → write (resource overlay | content stream)
//!     ↓
//! CorrespondenceMatcher (verify the font actually shown)
//!     ↓
//! FontRequirementReport (every non-exact font, once per family)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pdf_fontkeeper::config::EditConfig;
//! use pdf_fontkeeper::editor::{EditRequest, EditSession};
//!
//! let mut session = EditSession::open("in.pdf", EditConfig::default())?;
//! session.apply(&EditRequest::by_content("ALCANTARA", "ALCÂNTARA"))?;
//! println!("{}", session.report().render());
//! session.finish("out.pdf", |_| true)?;
//! ```

mod matcher;
mod mutation;
mod orchestrator;
mod report;
mod session;

pub use matcher::{Correspondence, CorrespondenceMatcher};
pub use mutation::{AttemptOutcome, EngineAttempt, EngineError, MutationEngine, MutationTarget};
pub use orchestrator::{
    average_char_width, pad_text, Alignment, MutationOutcome, StyleOverrides, TextMutationOrchestrator,
};
pub use report::{
    download_url, installation_instructions, variant_description, FontRequirement, FontRequirementReport,
    ReportSummary,
};
pub use session::{EditRequest, EditSession, RunFailure, SessionAudit, Selector};
