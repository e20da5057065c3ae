//! Positioned text extraction.
//!
//! - [`geometry`]: matrices, rectangles and page display space
//! - [`font`]: widths and Unicode mapping of font resources
//! - [`content`]: content stream operators, inline images kept intact
//! - [`extract`]: content stream interpretation into glyphs
//! - [`layout`]: glyphs to [`TextRun`]s and searchable page text

pub mod cmap;
pub mod content;
pub mod encoding;
pub mod extract;
pub mod font;
pub mod geometry;
pub mod layout;

pub use geometry::{PageGeometry, Rect};
pub use layout::{PageText, TextRun};

use crate::error::ExpungeResult;
use extract::PageScan;
use lopdf::Document;
use tracing::debug;

/// A parsed document together with the text layout of every page.
pub struct ExtractedDocument {
    document: Document,
    scans: Vec<PageScan>,
    pages: Vec<PageText>,
}

impl ExtractedDocument {
    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn into_parts(self) -> (Document, Vec<PageScan>) {
        (self.document, self.scans)
    }

    /// All runs of the document in page order.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.pages.iter().flat_map(|p| p.runs.iter())
    }

    /// Plain text of the document, pages separated by form feeds.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\u{c}\n")
    }
}

/// Entry point for turning PDF bytes into positioned text.
pub struct TextExtractor;

impl TextExtractor {
    /// Parses `bytes` and lays out the text of every page.
    ///
    /// # Errors
    ///
    /// `DocumentParse` when the bytes are not a readable, unencrypted PDF
    /// or a page's content stream cannot be decoded.
    pub fn extract(bytes: &[u8]) -> ExpungeResult<ExtractedDocument> {
        let document = extract::load_document(bytes)?;
        let scans = extract::scan_document(&document)?;
        let pages: Vec<PageText> = scans.iter().map(PageText::from_scan).collect();
        debug!(
            pages = pages.len(),
            runs = pages.iter().map(|p| p.runs.len()).sum::<usize>(),
            "text extracted"
        );
        Ok(ExtractedDocument {
            document,
            scans,
            pages,
        })
    }

    /// Counts pages without interpreting content.
    pub fn page_count(bytes: &[u8]) -> ExpungeResult<usize> {
        Ok(extract::load_document(bytes)?.get_pages().len())
    }
}
