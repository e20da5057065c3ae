//! Glyph removal from show-text operators.
//!
//! A removed glyph is replaced by a `TJ` positioning number equal to its
//! advance, so every glyph after it is drawn exactly where it was before.

use crate::error::{ExpungeError, ExpungeResult};
use crate::text::extract::{GlyphRef, ShowOp};
use crate::text::geometry::number;
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::collections::{BTreeSet, HashMap};

/// Rewrites `operations` with the glyphs in `removed` deleted.
///
/// Operators that show no removed glyph are cloned unchanged.
pub(crate) fn remove_glyphs(
    page: u32,
    operations: &[Operation],
    shows: &HashMap<usize, ShowOp>,
    removed: &BTreeSet<GlyphRef>,
) -> ExpungeResult<Vec<Operation>> {
    let mut by_op: HashMap<usize, BTreeSet<usize>> = HashMap::new();
    for r in removed {
        by_op.entry(r.op).or_default().insert(r.glyph);
    }

    let mut out = Vec::with_capacity(operations.len() + by_op.len() * 3);
    for (index, op) in operations.iter().enumerate() {
        let Some(glyphs) = by_op.get(&index) else {
            out.push(op.clone());
            continue;
        };
        let show = shows.get(&index).ok_or_else(|| {
            ExpungeError::redaction_on_page(page, format!("operator {} shows no text", index))
        })?;
        let malformed = || {
            ExpungeError::redaction_on_page(
                page,
                format!("unexpected operands for '{}'", op.operator),
            )
        };

        let items: Vec<Object> = match op.operator.as_str() {
            "Tj" | "'" => vec![op.operands.first().cloned().ok_or_else(malformed)?],
            "\"" => vec![op.operands.get(2).cloned().ok_or_else(malformed)?],
            "TJ" => op
                .operands
                .first()
                .and_then(|o| o.as_array().ok())
                .cloned()
                .ok_or_else(malformed)?,
            _ => return Err(malformed()),
        };
        let array = strip(&items, show, glyphs);

        match op.operator.as_str() {
            "'" => out.push(Operation::new("T*", vec![])),
            "\"" => {
                out.push(Operation::new("Tw", vec![op.operands[0].clone()]));
                out.push(Operation::new("Tc", vec![op.operands[1].clone()]));
                out.push(Operation::new("T*", vec![]));
            }
            _ => {}
        }
        out.push(Operation::new("TJ", vec![Object::Array(array)]));
    }
    Ok(out)
}

/// Builds a `TJ` array from shown items with the given glyph ordinals removed.
fn strip(items: &[Object], show: &ShowOp, removed: &BTreeSet<usize>) -> Vec<Object> {
    let mut out = Vec::new();
    let mut shift = 0.0;
    let mut ordinal = 0;

    let flush_shift = |out: &mut Vec<Object>, shift: &mut f64| {
        if *shift != 0.0 {
            out.push(Object::Real(*shift as f32));
            *shift = 0.0;
        }
    };

    for item in items {
        match item {
            Object::String(bytes, format) => {
                let mut kept = Vec::new();
                for code in bytes.chunks(show.code_len.max(1)) {
                    if removed.contains(&ordinal) {
                        if !kept.is_empty() {
                            out.push(Object::String(std::mem::take(&mut kept), format.clone()));
                        }
                        shift += show.adjustments.get(ordinal).copied().flatten().unwrap_or(0.0);
                    } else {
                        flush_shift(&mut out, &mut shift);
                        kept.extend_from_slice(code);
                    }
                    ordinal += 1;
                }
                if !kept.is_empty() {
                    out.push(Object::String(kept, format.clone()));
                }
            }
            other => {
                if let Some(n) = number(other) {
                    shift += n;
                }
            }
        }
    }
    flush_shift(&mut out, &mut shift);
    out
}

/// Nesting depth of `q` left open at the end of `operations`.
pub(crate) fn open_saves(operations: &[Operation]) -> usize {
    operations.iter().fold(0usize, |depth, op| match op.operator.as_str() {
        "q" => depth + 1,
        "Q" => depth.saturating_sub(1),
        _ => depth,
    })
}

pub(crate) fn literal(bytes: Vec<u8>) -> Object {
    Object::String(bytes, StringFormat::Literal)
}
