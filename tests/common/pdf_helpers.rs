//! PDF inspection helpers.

use lopdf::{Document, Object, ObjectId};
use std::panic;

/// Text as recovered by pdf-extract, or `None` if it cannot read the file.
///
/// pdf-extract panics on some inputs; that counts as "cannot read".
pub fn independent_text(bytes: &[u8]) -> Option<String> {
    let owned = bytes.to_vec();
    panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned).ok())
        .ok()
        .flatten()
}

/// Every stream in the file, decompressed where possible.
pub fn decoded_streams(bytes: &[u8]) -> Vec<(ObjectId, Vec<u8>)> {
    let doc = Document::load_mem(bytes).expect("document should load");
    doc.objects
        .iter()
        .filter_map(|(id, object)| match object {
            Object::Stream(stream) => Some((
                *id,
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone()),
            )),
            _ => None,
        })
        .collect()
}

/// Decoded content of page `number` (1-based).
pub fn page_content(bytes: &[u8], number: u32) -> Vec<u8> {
    let doc = Document::load_mem(bytes).expect("document should load");
    let id = doc.get_pages()[&number];
    doc.get_page_content(id).expect("page content should decode")
}
