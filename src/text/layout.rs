//! Coalescing positioned glyphs into runs and searchable page text.
//!
//! Consecutive glyphs (in drawing order) are compared using the offset from
//! the end of the previous glyph, measured along and across the previous
//! glyph's baseline, in units of the rendered font height `h`:
//!
//! | condition | result |
//! | --- | --- |
//! | `abs(across) > 0.5h`, `along < -0.5h`, `along > 3h`, or a new baseline direction | line break: new run, `\n` in page text |
//! | font resource or size changed | new run, joined with the space rule |
//! | `along > 0.25h`, neither side whitespace | synthetic space |
//! | otherwise | contiguous |
//!
//! Synthetic characters carry no glyph reference and are never removed by
//! redaction.

use super::extract::{Glyph, GlyphRef, PageScan};
use super::geometry::{PageGeometry, Rect};
use serde::{Deserialize, Serialize};

const BREAK_ACROSS: f64 = 0.5;
const BREAK_BACKWARD: f64 = 0.5;
const BREAK_FORWARD: f64 = 3.0;
const WORD_GAP: f64 = 0.25;
const SAME_DIRECTION: f64 = 0.99;

/// A contiguous stretch of text sharing a baseline, font and size.
///
/// Coordinates are PDF user space of the page (origin bottom-left).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub page: u32,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font: String,
    pub font_size: f64,
}

/// One character of page text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageChar {
    pub ch: char,
    /// Index into [`PageText::runs`]; joiners belong to the preceding run.
    pub run: usize,
    /// Source glyph, `None` for synthetic spaces and line breaks.
    pub glyph: Option<GlyphRef>,
    pub bbox: Option<Rect>,
    /// Baseline start of the source glyph in user space.
    pub origin: Option<(f64, f64)>,
}

/// Searchable text of one page.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    pub geometry: PageGeometry,
    pub runs: Vec<TextRun>,
    pub text: String,
    pub(crate) chars: Vec<PageChar>,
}

enum Join {
    Contiguous,
    Space,
    NewRun { space: bool },
    Break,
}

fn classify(prev: &Glyph, next: &Glyph) -> Join {
    let h = prev.size.max(next.size).max(f64::EPSILON);
    let (ux, uy) = prev.direction;
    let dx = next.origin.0 - prev.end.0;
    let dy = next.origin.1 - prev.end.1;
    let along = dx * ux + dy * uy;
    let across = dy * ux - dx * uy;
    let turned = ux * next.direction.0 + uy * next.direction.1 < SAME_DIRECTION;

    if turned
        || across.abs() > BREAK_ACROSS * h
        || along < -BREAK_BACKWARD * h
        || along > BREAK_FORWARD * h
    {
        return Join::Break;
    }

    let space = along > WORD_GAP * h && !ends_with_space(prev) && !starts_with_space(next);
    let restyled = prev.font != next.font || (prev.font_size - next.font_size).abs() > 1e-6;
    match (restyled, space) {
        (true, space) => Join::NewRun { space },
        (false, true) => Join::Space,
        (false, false) => Join::Contiguous,
    }
}

fn ends_with_space(glyph: &Glyph) -> bool {
    glyph.text.chars().last().map_or(false, char::is_whitespace)
}

fn starts_with_space(glyph: &Glyph) -> bool {
    glyph.text.chars().next().map_or(false, char::is_whitespace)
}

struct RunBuilder {
    text: String,
    bbox: Option<Rect>,
    font: String,
    font_size: f64,
}

impl RunBuilder {
    fn finish(self, page: u32) -> TextRun {
        let bbox = self.bbox.unwrap_or_default();
        TextRun {
            page,
            text: self.text,
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            font: self.font,
            font_size: self.font_size,
        }
    }
}

impl PageText {
    /// Lays out the glyphs of an interpreted page.
    pub(crate) fn from_scan(scan: &PageScan) -> Self {
        let mut runs = Vec::new();
        let mut chars: Vec<PageChar> = Vec::new();
        let mut current: Option<RunBuilder> = None;
        let mut prev: Option<&Glyph> = None;

        for glyph in scan.glyphs.iter().filter(|g| !g.text.is_empty()) {
            let join = prev.map_or(Join::NewRun { space: false }, |p| classify(p, glyph));
            let joiner = match join {
                Join::Break => Some('\n'),
                Join::Space | Join::NewRun { space: true } => Some(' '),
                _ => None,
            };
            if let Some(ch) = joiner {
                chars.push(PageChar {
                    ch,
                    run: runs.len(),
                    glyph: None,
                    bbox: None,
                    origin: None,
                });
                if let (Join::Space, Some(run)) = (&join, current.as_mut()) {
                    run.text.push(' ');
                }
            }
            if matches!(join, Join::Break | Join::NewRun { .. }) {
                if let Some(done) = current.take() {
                    runs.push(done.finish(scan.number));
                }
                current = Some(RunBuilder {
                    text: String::new(),
                    bbox: None,
                    font: scan.font_names.get(glyph.font).cloned().unwrap_or_default(),
                    font_size: glyph.font_size,
                });
            }

            if let Some(run) = current.as_mut() {
                run.text.push_str(&glyph.text);
                run.bbox = Some(run.bbox.map_or(glyph.bbox, |b| b.union(&glyph.bbox)));
            }
            for ch in glyph.text.chars() {
                chars.push(PageChar {
                    ch,
                    run: runs.len(),
                    glyph: Some(glyph.source),
                    bbox: Some(glyph.bbox),
                    origin: Some(glyph.origin),
                });
            }
            prev = Some(glyph);
        }
        if let Some(done) = current.take() {
            runs.push(done.finish(scan.number));
        }

        let text = chars.iter().map(|c| c.ch).collect();
        Self {
            number: scan.number,
            geometry: scan.geometry,
            runs,
            text,
            chars,
        }
    }
}
