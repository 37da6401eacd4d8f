//! Error types for the font-preserving text editor.
//!
//! This module defines all error types that can occur while cataloguing fonts,
//! resolving them and mutating text inside a PDF document.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during an edit session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The selector matched no text run
    #[error("No text run matches '{selector}'")]
    RunNotFound {
        /// Selector as given by the caller (id or search text)
        selector: String,
    },

    /// Redaction of the old glyphs failed; nothing was inserted
    #[error("Redaction failed on page {page} at ({x:.1}, {y:.1}): {reason}")]
    RedactionFailed {
        /// Page index (0-based)
        page: usize,
        /// X of the redacted box origin
        x: f32,
        /// Y of the redacted box origin
        y: f32,
        /// Why the redaction failed
        reason: String,
    },

    /// Not even the last-resort font could be loaded
    #[error("No usable font available: {0}")]
    FontUnavailable(String),

    /// Both mutation engines failed for one run
    #[error("Text mutation failed on page {page} for run {run_id}: {reason}")]
    MutationEngineFailed {
        /// Page index (0-based)
        page: usize,
        /// Id of the run that could not be rewritten
        run_id: String,
        /// Combined reasons of every engine attempt
        reason: String,
    },

    /// Strict mode refused a session with non-exact font resolutions
    #[error("Strict font mode: {} font(s) could not be matched exactly: {}", fonts.len(), fonts.join(", "))]
    StrictFontBlock {
        /// Names of the degraded fonts
        fonts: Vec<String>,
    },

    /// No font resource with this name exists in the document
    #[error("Font '{0}' is not present in the document")]
    FontNotInDocument(String),

    /// A character cannot be expressed in the font's encoding
    #[error("Character '{character}' cannot be encoded with font '{font}'")]
    Unencodable {
        /// Font whose encoding was used
        font: String,
        /// Offending character
        character: char,
    },

    /// A font program has no glyph for a character
    #[error("Font '{font}' has no glyph for '{character}'")]
    MissingGlyph {
        /// Font program name
        font: String,
        /// Character without a glyph
        character: char,
    },

    /// Font program or font dictionary error
    #[error("Font error: {0}")]
    Font(String),

    /// Page index outside the document
    #[error("Invalid page {page}: document has {count} page(s)")]
    InvalidPage {
        /// Requested page index (0-based)
        page: usize,
        /// Number of pages in the document
        count: usize,
    },

    /// Encrypted documents are not supported
    #[error("Encrypted PDF documents are not supported")]
    EncryptedDocument,

    /// Error reported by the PDF object layer
    #[error("PDF error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The user declined to keep a degraded result
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid argument passed to an operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl Error {
    /// Whether this error ends the whole session rather than a single run.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::FontUnavailable(_)
                | Error::StrictFontBlock { .. }
                | Error::EncryptedDocument
                | Error::Io(_)
                | Error::Backend(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_not_found_error() {
        let err = Error::RunNotFound {
            selector: "ALCANTARA".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("No text run"));
        assert!(msg.contains("ALCANTARA"));
    }

    #[test]
    fn test_redaction_failed_error() {
        let err = Error::RedactionFailed {
            page: 2,
            x: 72.0,
            y: 700.25,
            reason: "no text in box".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("page 2"));
        assert!(msg.contains("72.0"));
        assert!(msg.contains("no text in box"));
    }

    #[test]
    fn test_strict_block_lists_fonts() {
        let err = Error::StrictFontBlock {
            fonts: vec!["ArialNarrow-Bold".to_string(), "Calibri".to_string()],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2 font(s)"));
        assert!(msg.contains("ArialNarrow-Bold, Calibri"));
    }

    #[test]
    fn test_session_fatal_classification() {
        assert!(Error::FontUnavailable("x".into()).is_session_fatal());
        assert!(Error::StrictFontBlock { fonts: vec![] }.is_session_fatal());
        assert!(!Error::FontNotInDocument("F1".into()).is_session_fatal());
        assert!(!Error::RunNotFound {
            selector: "x".into()
        }
        .is_session_fatal());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
