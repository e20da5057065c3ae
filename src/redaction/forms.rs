//! Glyph removal across a page and the form XObjects it draws.
//!
//! A form that shows removed glyphs, directly or through a nested form, is
//! replaced for this page by a fresh copy carrying the rewritten operators.
//! The `Do` that drew it is pointed at the copy under a new `XForm{n}`
//! name. Shared originals are never edited in place.

use super::resources::{add_resource, effective_copy};
use super::rewrite;
use crate::error::{ExpungeError, ExpungeResult};
use crate::text::content;
use crate::text::extract::{GlyphRef, PageScan};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of rewriting one page.
#[derive(Debug, Default)]
pub(crate) struct RewrittenPage {
    /// New operators of the page's own content.
    pub operations: Vec<Operation>,
    /// Forms replaced by a copy at every place this page draws them.
    pub replaced: BTreeSet<ObjectId>,
    /// Forms this page still draws unchanged.
    pub kept: BTreeSet<ObjectId>,
}

/// Removes `removed` from the page content and its forms.
///
/// `resources` is the page's own resource dictionary; XObject entries for
/// form copies are added to it.
pub(crate) fn rewrite_page(
    doc: &mut Document,
    scan: &PageScan,
    removed: &BTreeSet<GlyphRef>,
    resources: &mut Dictionary,
) -> ExpungeResult<RewrittenPage> {
    let mut by_stream: BTreeMap<usize, BTreeSet<GlyphRef>> = BTreeMap::new();
    for glyph in removed {
        by_stream.entry(glyph.stream).or_default().insert(*glyph);
    }

    // forms always follow the stream that draws them, so one backward pass
    // marks every ancestor
    let mut dirty = vec![false; scan.streams.len()];
    for index in (0..scan.streams.len()).rev() {
        dirty[index] |= by_stream.contains_key(&index);
        if let (true, Some(call)) = (dirty[index], scan.streams[index].form.as_ref()) {
            dirty[call.parent] = true;
        }
    }

    let mut page = RewrittenPage::default();
    let mut copies: HashMap<usize, ObjectId> = HashMap::new();
    let empty = BTreeSet::new();

    for index in (0..scan.streams.len()).rev() {
        let stream = &scan.streams[index];
        let call = stream.form.as_ref();
        if !dirty[index] {
            if let Some(call) = call {
                page.kept.insert(call.id);
            }
            continue;
        }

        let mut own = match call {
            Some(_) => effective_copy(doc, scan, index),
            None => std::mem::take(resources),
        };
        let mut operations = stream.operations.clone();
        for (child, child_call) in scan
            .streams
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.form.as_ref().map(|c| (i, c)))
            .filter(|(i, c)| c.parent == index && dirty[*i])
        {
            let name = add_resource(doc, &mut own, "XObject", "XForm", copies[&child]);
            if let Some(op) = operations.get_mut(child_call.op) {
                op.operands = vec![Object::Name(name.into_bytes())];
            }
        }

        let rewritten = rewrite::remove_glyphs(
            scan.number,
            &operations,
            &stream.shows,
            by_stream.get(&index).unwrap_or(&empty),
        )?;

        match call {
            Some(call) => {
                let copy = copy_form(doc, scan.number, call.id, own, &rewritten)?;
                copies.insert(index, copy);
                page.replaced.insert(call.id);
            }
            None => {
                *resources = own;
                page.operations = rewritten;
            }
        }
    }
    Ok(page)
}

/// A new form object with the original's dictionary, the given resources
/// and `operations` as its content.
fn copy_form(
    doc: &mut Document,
    page: u32,
    original: ObjectId,
    resources: Dictionary,
    operations: &[Operation],
) -> ExpungeResult<ObjectId> {
    let mut dict = doc
        .get_object(original)
        .and_then(Object::as_stream)
        .map(|form| form.dict.clone())
        .map_err(|e| ExpungeError::redaction_on_page(page, format!("form {:?}: {}", original, e)))?;
    for key in ["Filter", "DecodeParms", "Length"] {
        dict.remove(key.as_bytes());
    }
    dict.set("Resources", Object::Dictionary(resources));
    let data = content::encode(operations).map_err(|e| {
        ExpungeError::redaction_on_page(page, format!("form {:?} encoding: {}", original, e))
    })?;
    Ok(doc.add_object(Stream::new(dict, data)))
}
