//! Custom assertions for redaction testing.
//!
//! Redacted output is checked two ways: with the crate's own extractor, and
//! independently with pdf-extract plus a raw scan of every decoded stream.

use expunge::TextExtractor;

use super::pdf_helpers::{decoded_streams, independent_text};

/// Asserts that `pattern` can no longer be recovered from `bytes`.
///
/// # Panics
/// Panics if the pattern is found by either extractor or appears inside
/// any decoded stream.
pub fn assert_redacted(bytes: &[u8], pattern: &str) {
    let own = TextExtractor::extract(bytes)
        .expect("redacted output should be readable")
        .text();
    assert!(
        !own.contains(pattern),
        "Pattern '{}' should be redacted but the extractor still finds it:\n{}",
        pattern,
        own
    );

    if let Some(text) = independent_text(bytes) {
        assert!(
            !text.contains(pattern),
            "Pattern '{}' should be redacted but pdf-extract recovers it",
            pattern
        );
    }

    for (id, data) in decoded_streams(bytes) {
        let raw = String::from_utf8_lossy(&data);
        assert!(
            !raw.contains(&format!("({})", pattern)),
            "Pattern '{}' survives as a string literal in object {:?}",
            pattern,
            id
        );
    }
}

/// Asserts that `pattern` is still present in `bytes`.
///
/// # Panics
/// Panics if the extractor no longer finds the pattern.
pub fn assert_preserved(bytes: &[u8], pattern: &str) {
    let text = TextExtractor::extract(bytes)
        .expect("document should be readable")
        .text();
    assert!(
        text.contains(pattern),
        "Pattern '{}' should be preserved but was not found in:\n{}",
        pattern,
        text
    );
}

/// Asserts that `bytes` is a loadable PDF with `pages` pages.
pub fn assert_valid_pdf(bytes: &[u8], pages: usize) {
    let doc = lopdf::Document::load_mem(bytes).expect("output should load");
    assert_eq!(doc.get_pages().len(), pages, "page count changed");
}
