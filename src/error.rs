//! Error types for the search and redaction engine.
//!
//! Errors are categorized by the stage that produced them so the calling
//! layer can surface them verbatim: parse failures, unsafe rewrites, unknown
//! documents, and rejected input.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations.
pub type ExpungeResult<T> = Result<T, ExpungeError>;

/// Error type for all engine and store operations.
#[derive(Debug, Error)]
pub enum ExpungeError {
    /// The document is malformed, encrypted, or otherwise unreadable.
    #[error("{}", format_staged("Document parse error", .page, .reason))]
    DocumentParse { reason: String, page: Option<u32> },

    /// The document could not be rewritten safely; no output was produced.
    #[error("{}", format_staged("Redaction failed", .page, .reason))]
    Redaction { reason: String, page: Option<u32> },

    /// The store has no document with this id.
    #[error("Document '{id}' not found")]
    NotFound { id: String },

    /// Invalid configuration or parameters.
    #[error("Invalid input for '{parameter}': {reason}")]
    InvalidInput { parameter: String, reason: String },

    /// Error occurred while reading or writing files.
    #[error("IO error for path '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document store could not complete the request.
    #[error("Document store error: {message}")]
    Store { message: String },

    /// The configuration file could not be loaded.
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

fn format_staged(stage: &str, page: &Option<u32>, reason: &str) -> String {
    match page {
        Some(p) => format!("{} on page {}: {}", stage, p, reason),
        None => format!("{}: {}", stage, reason),
    }
}

impl ExpungeError {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Self::DocumentParse {
            reason: reason.into(),
            page: None,
        }
    }

    pub(crate) fn parse_on_page(page: u32, reason: impl Into<String>) -> Self {
        Self::DocumentParse {
            reason: reason.into(),
            page: Some(page),
        }
    }

    pub(crate) fn redaction(reason: impl Into<String>) -> Self {
        Self::Redaction {
            reason: reason.into(),
            page: None,
        }
    }

    pub(crate) fn redaction_on_page(page: u32, reason: impl Into<String>) -> Self {
        Self::Redaction {
            reason: reason.into(),
            page: Some(page),
        }
    }

    pub(crate) fn invalid_input(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// Re-labels a parse failure met while preparing a rewrite.
    ///
    /// Every other variant passes through unchanged, so `NotFound` from the
    /// store still reaches the caller as `NotFound`.
    pub(crate) fn into_redaction(self) -> Self {
        match self {
            Self::DocumentParse { reason, page } => Self::Redaction {
                reason: format!("source document cannot be rewritten: {}", reason),
                page,
            },
            other => other,
        }
    }

    /// Returns true for errors caused by the document content itself.
    pub fn is_document_error(&self) -> bool {
        matches!(self, Self::DocumentParse { .. } | Self::Redaction { .. })
    }
}

impl From<serde_json::Error> for ExpungeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store {
            message: format!("metadata serialization failed: {}", err),
        }
    }
}
