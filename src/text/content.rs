//! Content stream decoding and encoding around lopdf's operator parser.
//!
//! lopdf stops at bytes it cannot tokenize and returns the operators read
//! so far, which happens with the binary data of inline images. Streams are
//! therefore split at `BI … ID … EI` before parsing: each image is kept as a
//! single opaque [`INLINE_IMAGE`] operation holding its raw bytes, and every
//! other segment is parsed by lopdf and its operator count checked against
//! a token-level count of the same bytes.

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};
use std::ops::Range;

/// Operator name of an inline image placeholder. Its only operand is the
/// raw `BI … EI` span.
pub const INLINE_IMAGE: &str = "BI";

enum Segment {
    Operators { range: Range<usize>, count: usize },
    InlineImage(Range<usize>),
}

/// Parses a decoded content stream.
///
/// Fails when any part of the stream cannot be read, rather than returning
/// the operators before the unreadable part.
pub fn decode(data: &[u8]) -> Result<Vec<Operation>, String> {
    let (segments, clean) = split(data)?;
    let mut operations = Vec::new();
    for segment in segments {
        match segment {
            Segment::Operators { count: 0, .. } => {}
            Segment::Operators { range, count } => {
                let start = range.start;
                let content = Content::decode(&clean[range])
                    .map_err(|e| format!("operators at byte {}: {}", start, e))?;
                if content.operations.len() != count {
                    return Err(format!(
                        "only {} of {} operators readable after byte {}",
                        content.operations.len(),
                        count,
                        start
                    ));
                }
                operations.extend(content.operations);
            }
            Segment::InlineImage(range) => operations.push(Operation::new(
                INLINE_IMAGE,
                vec![Object::String(data[range].to_vec(), StringFormat::Literal)],
            )),
        }
    }
    Ok(operations)
}

/// Serializes operations produced by [`decode`], writing inline images back
/// byte for byte.
pub fn encode(operations: &[Operation]) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    let mut pending: Vec<Operation> = Vec::new();
    for op in operations {
        match (op.operator.as_str(), op.operands.first()) {
            (INLINE_IMAGE, Some(Object::String(raw, _))) => {
                flush(&mut pending, &mut out)?;
                out.extend_from_slice(raw);
                out.push(b'\n');
            }
            _ => pending.push(op.clone()),
        }
    }
    flush(&mut pending, &mut out)?;
    Ok(out)
}

fn flush(pending: &mut Vec<Operation>, out: &mut Vec<u8>) -> Result<(), String> {
    if pending.is_empty() {
        return Ok(());
    }
    let encoded = Content {
        operations: std::mem::take(pending),
    }
    .encode()
    .map_err(|e| e.to_string())?;
    out.extend_from_slice(&encoded);
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    Ok(())
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | 9 | 10 | 12 | 13 | 32)
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Splits `data` into operator segments and inline images. Also returns a
/// copy of `data` with comments blanked out.
fn split(data: &[u8]) -> Result<(Vec<Segment>, Vec<u8>), String> {
    let mut clean = data.to_vec();
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut count = 0;
    let mut in_image_dict = false;
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if is_whitespace(b) {
            i += 1;
            continue;
        }
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    clean[i] = b' ';
                    i += 1;
                }
            }
            b'(' => i = skip_literal(data, i)?,
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'<' => {
                let close = data[i..]
                    .iter()
                    .position(|&c| c == b'>')
                    .ok_or_else(|| format!("unterminated hex string at byte {}", i))?;
                i += close + 1;
            }
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'>' | b')' => return Err(format!("unexpected '{}' at byte {}", b as char, i)),
            b'[' | b']' | b'{' | b'}' => i += 1,
            b'/' => {
                i += 1;
                while i < data.len() && is_regular(data[i]) {
                    i += 1;
                }
            }
            _ => {
                let start = i;
                while i < data.len() && is_regular(data[i]) {
                    i += 1;
                }
                let token = &data[start..i];
                if token[0].is_ascii_digit() || matches!(token[0], b'+' | b'-' | b'.') {
                    continue;
                }
                if matches!(token, b"true" | b"false" | b"null") {
                    continue;
                }
                if in_image_dict {
                    if token == b"ID" {
                        let end = image_end(data, i)?;
                        segments.push(Segment::InlineImage(segment_start..end));
                        segment_start = end;
                        in_image_dict = false;
                        i = end;
                    }
                    continue;
                }
                if token == b"BI" {
                    segments.push(Segment::Operators {
                        range: segment_start..start,
                        count,
                    });
                    segment_start = start;
                    count = 0;
                    in_image_dict = true;
                    continue;
                }
                count += 1;
            }
        }
    }

    if in_image_dict {
        return Err("inline image without image data".to_string());
    }
    segments.push(Segment::Operators {
        range: segment_start..data.len(),
        count,
    });
    Ok((segments, clean))
}

/// Index just past the closing `)` of the literal string opening at `start`.
fn skip_literal(data: &[u8], start: usize) -> Result<usize, String> {
    let mut depth = 0usize;
    let mut i = start;
    while i < data.len() {
        match data[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(format!("unterminated string at byte {}", start))
}

/// Index just past the `EI` that ends image data. `after_id` points right
/// behind the `ID` keyword.
fn image_end(data: &[u8], after_id: usize) -> Result<usize, String> {
    // a single whitespace byte separates ID from the data
    let data_start = (after_id + 1).min(data.len());
    let mut j = data_start;
    while j + 1 < data.len() {
        let ends_here = data[j] == b'E'
            && data[j + 1] == b'I'
            && (j == data_start || is_whitespace(data[j - 1]))
            && data.get(j + 2).map_or(true, |&c| is_whitespace(c) || is_delimiter(c));
        if ends_here {
            return Ok(j + 2);
        }
        j += 1;
    }
    Err(format!("inline image at byte {} has no EI", after_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|o| o.operator.as_str()).collect()
    }

    #[test]
    fn test_plain_stream_decodes_fully() {
        let ops = decode(b"BT /F1 12 Tf 72 700 Td (a \\) b) Tj [(x) -20 (y)] TJ ET").unwrap();
        assert_eq!(operators(&ops), vec!["BT", "Tf", "Td", "Tj", "TJ", "ET"]);
    }

    #[test]
    fn test_binary_inline_image_is_kept_opaque() {
        let data = b"q BI /W 1 /H 1 /BPC 8 /CS /G ID \x7f\x00\xff EI Q BT /F1 12 Tf (after) Tj ET";
        let ops = decode(data).unwrap();
        assert_eq!(
            operators(&ops),
            vec!["q", INLINE_IMAGE, "Q", "BT", "Tf", "Tj", "ET"]
        );
        match &ops[1].operands[0] {
            Object::String(raw, _) => {
                assert!(raw.starts_with(b"BI"));
                assert!(raw.ends_with(b"EI"));
            }
            other => panic!("unexpected operand {:?}", other),
        }

        let encoded = encode(&ops).unwrap();
        assert!(encoded
            .windows(3)
            .any(|w| w == b"\x7f\x00\xff"));
        assert_eq!(operators(&decode(&encoded).unwrap()), operators(&ops));
    }

    #[test]
    fn test_comments_are_ignored() {
        let ops = decode(b"% leading note\nq 1 0 0 1 0 0 cm % trailing\nQ").unwrap();
        assert_eq!(operators(&ops), vec!["q", "cm", "Q"]);
    }

    #[test]
    fn test_unreadable_content_is_an_error() {
        assert!(decode(b"BT (unterminated Tj ET").is_err());
        assert!(decode(b"q BI /W 1 /H 1 ID \x00\x01").is_err());
        assert!(decode(b"BT ) Tj ET").is_err());
    }

    #[test]
    fn test_empty_stream() {
        assert!(decode(b"").unwrap().is_empty());
        assert!(decode(b"  \n % only a comment").unwrap().is_empty());
    }
}
