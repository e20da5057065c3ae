//! Literal search over extracted page text.

use crate::text::extract::GlyphRef;
use crate::text::layout::PageText;
use crate::text::Rect;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Default number of characters of context on each side of a match.
pub const DEFAULT_CONTEXT_CHARS: usize = 20;

const POSITION_TOLERANCE: f64 = 1e-3;

/// Baselines closer than this fraction of the smaller match height are on
/// the same line.
const SAME_LINE: f64 = 0.5;

/// One occurrence of the query.
///
/// `x`/`y` give the top-left corner of the bounding box in display space:
/// origin at the top-left of the visible page after rotation, y downward.
/// Matches are ordered by line (baseline), not by `y`, so a larger font on
/// the same line does not jump ahead of smaller text to its left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
    pub context: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,

    #[serde(skip)]
    pub(crate) glyphs: Vec<GlyphRef>,
    /// One user-space rectangle per run the match spans.
    #[serde(skip)]
    pub(crate) segments: Vec<Rect>,
    /// Display-space y of the first glyph's baseline.
    #[serde(skip)]
    pub(crate) baseline: f64,
}

impl PartialEq for Match {
    fn eq(&self, other: &Self) -> bool {
        self.page == other.page
            && self.text == other.text
            && self.context == other.context
            && self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
    }
}

impl Match {
    /// True when both describe the same occurrence, allowing for float
    /// noise picked up in serialization.
    pub fn same_occurrence(&self, other: &Match) -> bool {
        let near = |a: f64, b: f64| (a - b).abs() <= POSITION_TOLERANCE;
        self.page == other.page
            && self.text == other.text
            && near(self.x, other.x)
            && near(self.y, other.y)
            && near(self.width, other.width)
            && near(self.height, other.height)
    }

    /// Whether this match carries the glyph references needed to redact it.
    pub fn is_resolved(&self) -> bool {
        !self.glyphs.is_empty()
    }
}

/// Search behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub context_chars: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }
}

/// Finds literal, non-overlapping occurrences of a query.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    options: MatchOptions,
}

impl Matcher {
    pub fn new(options: MatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Returns every match on `pages`, ordered by page, then line from top
    /// to bottom, then x.
    ///
    /// An empty query matches nothing.
    pub fn find(&self, pages: &[PageText], query: &str) -> Vec<Match> {
        if query.is_empty() {
            return Vec::new();
        }
        let needle = self.fold(query);
        let matches: Vec<Match> = pages
            .iter()
            .flat_map(|page| self.find_on_page(page, &needle))
            .collect();
        in_reading_order(matches)
    }

    /// Whether `haystack` contains `query` under these options.
    pub fn contains(&self, haystack: &str, query: &str) -> bool {
        !query.is_empty() && self.fold(haystack).contains(&self.fold(query))
    }

    fn fold(&self, text: &str) -> String {
        if self.options.case_sensitive {
            return text.to_string();
        }
        // one char in, one char out, so char offsets line up with the page text
        text.chars()
            .map(|c| {
                let mut lower = c.to_lowercase();
                match (lower.next(), lower.next()) {
                    (Some(l), None) => l,
                    _ => c,
                }
            })
            .collect()
    }

    fn find_on_page(&self, page: &PageText, needle: &str) -> Vec<Match> {
        let haystack = self.fold(&page.text);
        let byte_to_char: BTreeMap<usize, usize> = haystack
            .char_indices()
            .enumerate()
            .map(|(i, (b, _))| (b, i))
            .collect();
        let needle_chars = needle.chars().count();

        haystack
            .match_indices(needle)
            .filter_map(|(start_byte, _)| {
                let start = *byte_to_char.get(&start_byte)?;
                self.build(page, start, start + needle_chars)
            })
            .collect()
    }

    fn build(&self, page: &PageText, start: usize, end: usize) -> Option<Match> {
        let chars = &page.chars[start..end];
        let mut glyphs: Vec<GlyphRef> = chars.iter().filter_map(|c| c.glyph).collect();
        if glyphs.is_empty() {
            return None;
        }
        glyphs.dedup();

        let mut by_run: BTreeMap<usize, Rect> = BTreeMap::new();
        for c in chars {
            if let Some(bbox) = c.bbox {
                by_run
                    .entry(c.run)
                    .and_modify(|r| *r = r.union(&bbox))
                    .or_insert(bbox);
            }
        }
        let segments: Vec<Rect> = by_run.into_values().collect();
        let bounds = segments
            .iter()
            .skip(1)
            .fold(segments[0], |acc, r| acc.union(r));
        let display = page.geometry.rect_to_display(&bounds);

        let baseline = chars
            .iter()
            .find_map(|c| c.origin)
            .map_or(display.max_y(), |(x, y)| page.geometry.to_display(x, y).1);

        Some(Match {
            page: page.number,
            text: chars.iter().map(|c| c.ch).collect(),
            context: self.context(page, start, end),
            x: display.x,
            y: display.y,
            width: display.width,
            height: display.height,
            glyphs,
            segments,
            baseline,
        })
    }

    fn context(&self, page: &PageText, start: usize, end: usize) -> String {
        let from = start.saturating_sub(self.options.context_chars);
        let to = (end + self.options.context_chars).min(page.chars.len());
        let raw: String = page.chars[from..to].iter().map(|c| c.ch).collect();
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Sorts by baseline, groups baselines into lines, then orders each line
/// left to right.
fn in_reading_order(mut matches: Vec<Match>) -> Vec<Match> {
    let by = |a: f64, b: f64| a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    matches.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then_with(|| by(a.baseline, b.baseline))
            .then_with(|| by(a.x, b.x))
    });

    let mut line = 0usize;
    let mut anchor: Option<(u32, f64, f64)> = None;
    let mut keyed: Vec<(usize, Match)> = Vec::with_capacity(matches.len());
    for m in matches {
        let same_line = anchor.map_or(false, |(page, baseline, height)| {
            page == m.page && (m.baseline - baseline).abs() <= SAME_LINE * height.min(m.height)
        });
        if !same_line {
            line += 1;
            anchor = Some((m.page, m.baseline, m.height));
        }
        keyed.push((line, m));
    }
    keyed.sort_by(|(la, a), (lb, b)| la.cmp(lb).then_with(|| by(a.x, b.x)));
    keyed.into_iter().map(|(_, m)| m).collect()
}

/// Searches with default options.
pub fn find_matches(pages: &[PageText], query: &str) -> Vec<Match> {
    Matcher::default().find(pages, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::extract::{Glyph, PageScan, StreamScan};
    use crate::text::PageGeometry;

    /// Lays out `lines` at 14pt leading with 6pt per character.
    fn page(number: u32, lines: &[&str]) -> PageText {
        let mut glyphs = Vec::new();
        for (row, line) in lines.iter().enumerate() {
            let y = 700.0 - 14.0 * row as f64;
            for (col, ch) in line.chars().enumerate() {
                let x = 72.0 + 6.0 * col as f64;
                glyphs.push(Glyph {
                    text: ch.to_string(),
                    bbox: Rect::new(x, y - 2.0, 6.0, 10.0),
                    origin: (x, y),
                    end: (x + 6.0, y),
                    direction: (1.0, 0.0),
                    size: 10.0,
                    font: 0,
                    font_size: 10.0,
                    source: GlyphRef {
                        stream: 0,
                        op: row,
                        glyph: col,
                    },
                });
            }
        }
        PageText::from_scan(&PageScan {
            number,
            id: (number, 0),
            geometry: PageGeometry::default(),
            streams: vec![StreamScan::default()],
            glyphs,
            font_names: vec!["F1".to_string()],
        })
    }

    #[test]
    fn test_repeated_value_is_found_twice() {
        let pages = [page(1, &["Account: 12345, Contact: 12345"])];
        let matches = find_matches(&pages, "12345");
        assert_eq!(matches.len(), 2);
        assert!(matches[0].x < matches[1].x);
        assert_eq!(matches[0].text, "12345");
        assert_eq!(matches[0].glyphs.len(), 5);
    }

    #[test]
    fn test_display_coordinates_and_order() {
        let pages = [
            page(1, &["zz top", "top zz"]),
            page(2, &["top"]),
        ];
        let matches = find_matches(&pages, "top");
        let order: Vec<(u32, f64)> = matches.iter().map(|m| (m.page, m.y)).collect();
        assert_eq!(matches.len(), 3);
        assert_eq!(order[0].0, 1);
        assert!(order[0].1 < order[1].1);
        assert_eq!(order[2].0, 2);
        // top of a glyph box at user y 708 is 84pt below the page top
        assert!((matches[0].y - 84.0).abs() < 1e-9);
        assert!((matches[0].x - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_overlapping_tiling() {
        let pages = [page(1, &["aaaa"])];
        assert_eq!(find_matches(&pages, "aa").len(), 2);
        assert_eq!(find_matches(&pages, "aaa").len(), 1);
    }

    #[test]
    fn test_empty_and_absent_queries() {
        let pages = [page(1, &["hello"])];
        assert!(find_matches(&pages, "").is_empty());
        assert!(find_matches(&pages, "absent").is_empty());
    }

    #[test]
    fn test_case_insensitive_option() {
        let pages = [page(1, &["Secret SECRET secret"])];
        assert_eq!(find_matches(&pages, "secret").len(), 1);
        let matcher = Matcher::new(MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        });
        let matches = matcher.find(&pages, "SeCrEt");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[1].text, "SECRET");
    }

    #[test]
    fn test_match_across_lines_spans_two_segments() {
        let pages = [page(1, &["first half", "second"])];
        let matches = find_matches(&pages, "half\nsecond");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].segments.len(), 2);
    }

    #[test]
    fn test_context_collapses_whitespace() {
        let pages = [page(1, &["the quick brown fox", "jumps over"])];
        let matcher = Matcher::new(MatchOptions {
            context_chars: 6,
            ..MatchOptions::default()
        });
        let m = &matcher.find(&pages, "fox")[0];
        assert_eq!(m.context, "brown fox jumps");
    }

    #[test]
    fn test_serialized_shape_omits_internals() {
        let pages = [page(1, &["id 42"])];
        let m = &find_matches(&pages, "42")[0];
        let value = serde_json::to_value(m).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 7);
        for key in ["page", "text", "context", "x", "y", "width", "height"] {
            assert!(keys.contains(&key));
        }

        let back: Match = serde_json::from_value(value).unwrap();
        assert_eq!(&back, m);
        assert!(back.same_occurrence(m));
        assert!(!back.is_resolved());
    }

    #[test]
    fn test_larger_font_on_the_same_line_keeps_left_to_right_order() {
        // three "key"s on one baseline, the middle one at triple size
        let mut glyphs = Vec::new();
        let mut x = 72.0;
        for (i, size) in [10.0, 30.0, 10.0].into_iter().enumerate() {
            for (j, ch) in "key ".chars().enumerate() {
                glyphs.push(Glyph {
                    text: ch.to_string(),
                    bbox: Rect::new(x, 700.0 - 0.2 * size, 0.5 * size, size),
                    origin: (x, 700.0),
                    end: (x + 0.5 * size, 700.0),
                    direction: (1.0, 0.0),
                    size,
                    font: 0,
                    font_size: size,
                    source: GlyphRef {
                        stream: 0,
                        op: i,
                        glyph: j,
                    },
                });
                x += 0.5 * size;
            }
        }
        let page = PageText::from_scan(&PageScan {
            number: 1,
            id: (1, 0),
            geometry: PageGeometry::default(),
            streams: vec![StreamScan::default()],
            glyphs,
            font_names: vec!["F1".to_string()],
        });
        let matches = find_matches(&[page], "key");
        assert_eq!(matches.len(), 3);
        assert!(matches[1].y < matches[0].y);
        assert!(matches[0].x < matches[1].x && matches[1].x < matches[2].x);
        assert!((matches[1].height - 30.0).abs() < 1e-9);
    }
}
