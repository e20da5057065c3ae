//! Delivery of redacted documents: as a one-off download, or persisted as a
//! new document in the store.

use crate::error::ExpungeResult;
use crate::redaction::RedactionResult;
use crate::store::{DocumentMetadata, DocumentStore, NewDocument};
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A redacted document ready to be sent to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactedDownload {
    pub filename: String,
    pub content_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub total_replacements: usize,
}

/// A redacted document saved as a new store entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedRedaction {
    #[serde(rename = "redacted_pdf")]
    pub new_document: DocumentMetadata,
    #[serde(rename = "totalReplacements")]
    pub total_replacements: usize,
}

/// File name offered for a redacted download: the base name of the
/// original without its `.pdf` extension, suffixed with `_redacted.pdf`.
pub fn redacted_filename(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| original.to_string());
    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => {
            &base[..cut]
        }
        _ => base.as_str(),
    };
    let stem = if stem.is_empty() { "document" } else { stem };
    format!("{}_redacted.pdf", stem)
}

/// Turns redaction results into downloads or stored documents.
pub struct OutputManager<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> OutputManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Packages the redacted bytes for download. Nothing is stored.
    pub fn download(&self, source: &DocumentMetadata, result: RedactionResult) -> RedactedDownload {
        RedactedDownload {
            filename: redacted_filename(&source.original_filename),
            content_type: PDF_CONTENT_TYPE,
            bytes: result.bytes,
            total_replacements: result.total_replacements,
        }
    }

    /// Stores the redacted bytes as a new document derived from `source`.
    ///
    /// Each call creates a new document, even for identical input.
    pub fn persist(
        &self,
        source: &DocumentMetadata,
        result: RedactionResult,
    ) -> ExpungeResult<PersistedRedaction> {
        let draft = NewDocument {
            original_filename: redacted_filename(&source.original_filename),
            page_count: source.page_count,
            redacted: true,
            derived_from: Some(source.id.clone()),
        };
        let mut new_document = self.store.create(&result.bytes, draft)?;
        new_document.public_url = self.store.public_url(&new_document.id)?;
        info!(
            source = %source.id,
            derived = %new_document.id,
            replacements = result.total_replacements,
            "redacted copy stored"
        );
        Ok(PersistedRedaction {
            new_document,
            total_replacements: result.total_replacements,
        })
    }
}
