//! Font resources: code splitting, glyph widths and Unicode mapping.

use super::cmap::ToUnicodeCMap;
use super::encoding::{glyph_name_to_char, helvetica_width, BaseEncoding, StandardMetrics};
use super::geometry::{number, resolve};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// Width used when a font gives no usable metrics, in 1/1000 em.
const UNIFORM_WIDTH: f64 = 500.0;
const DEFAULT_ASCENT: f64 = 800.0;
const DEFAULT_DESCENT: f64 = -200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    Simple,
    Composite,
    Type3,
}

#[derive(Debug, Clone)]
enum WidthSource {
    Table { first_char: u32, widths: Vec<f64> },
    Cid { widths: HashMap<u32, f64> },
    Standard(StandardMetrics),
    Uniform,
}

/// A font as needed for text extraction and glyph removal.
#[derive(Debug, Clone)]
pub struct Font {
    pub base_font: String,
    pub kind: FontKind,
    code_len: usize,
    widths: WidthSource,
    default_width: f64,
    /// Fallback metrics for codes outside a width table.
    standard: Option<StandardMetrics>,
    encoding: Box<[Option<char>; 256]>,
    to_unicode: Option<ToUnicodeCMap>,
    /// Multiplier from width units into 1/1000 text space (Type3 FontMatrix).
    width_scale: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl Font {
    /// Helvetica with WinAnsi encoding, used for missing font resources.
    pub fn fallback() -> Self {
        Self {
            base_font: "Helvetica".to_string(),
            kind: FontKind::Simple,
            code_len: 1,
            widths: WidthSource::Standard(StandardMetrics::Helvetica),
            default_width: UNIFORM_WIDTH,
            standard: Some(StandardMetrics::Helvetica),
            encoding: base_table(BaseEncoding::WinAnsi),
            to_unicode: None,
            width_scale: 1.0,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }

    pub fn load(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = name_of(doc, dict, b"Subtype").unwrap_or_default();
        let base_font = name_of(doc, dict, b"BaseFont")
            .map(|n| strip_subset_prefix(&n).to_string())
            .unwrap_or_default();
        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o).as_stream().ok())
            .and_then(|s| s.decompressed_content().ok().or_else(|| Some(s.content.clone())))
            .map(|data| ToUnicodeCMap::parse(&data))
            .filter(|cmap| !cmap.is_empty());

        match subtype.as_str() {
            "Type0" => Self::load_composite(doc, dict, base_font, to_unicode),
            _ => Self::load_simple(doc, dict, &subtype, base_font, to_unicode),
        }
    }

    fn load_simple(
        doc: &Document,
        dict: &Dictionary,
        subtype: &str,
        base_font: String,
        to_unicode: Option<ToUnicodeCMap>,
    ) -> Self {
        let kind = if subtype == "Type3" {
            FontKind::Type3
        } else {
            FontKind::Simple
        };
        let descriptor = dict_of(doc, dict, b"FontDescriptor");
        let standard = StandardMetrics::for_base_font(&base_font);

        let width_scale = if kind == FontKind::Type3 {
            dict.get(b"FontMatrix")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|m| m.first().and_then(|v| number(resolve(doc, v))))
                .map(|a| a * 1000.0)
                .unwrap_or(1.0)
        } else {
            1.0
        };

        let widths = match dict
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
        {
            Some(array) => WidthSource::Table {
                first_char: dict
                    .get(b"FirstChar")
                    .ok()
                    .and_then(|o| number(resolve(doc, o)))
                    .unwrap_or(0.0) as u32,
                widths: array
                    .iter()
                    .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                    .collect(),
            },
            None => match standard {
                Some(metrics) => WidthSource::Standard(metrics),
                None => WidthSource::Uniform,
            },
        };

        let default_width = descriptor
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(|o| number(resolve(doc, o)))
            .filter(|w| *w > 0.0)
            .unwrap_or(UNIFORM_WIDTH);

        let (ascent, descent) = vertical_metrics(doc, descriptor);

        Self {
            base_font,
            kind,
            code_len: 1,
            widths,
            default_width,
            standard,
            encoding: simple_encoding(doc, dict),
            to_unicode,
            width_scale,
            ascent: if kind == FontKind::Type3 { DEFAULT_ASCENT } else { ascent },
            descent: if kind == FontKind::Type3 { DEFAULT_DESCENT } else { descent },
        }
    }

    fn load_composite(
        doc: &Document,
        dict: &Dictionary,
        base_font: String,
        to_unicode: Option<ToUnicodeCMap>,
    ) -> Self {
        let descendant = dict
            .get(b"DescendantFonts")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .and_then(|a| a.first())
            .and_then(|o| resolve(doc, o).as_dict().ok());

        let default_width = descendant
            .and_then(|d| d.get(b"DW").ok())
            .and_then(|o| number(resolve(doc, o)))
            .unwrap_or(1000.0);
        let widths = descendant
            .and_then(|d| d.get(b"W").ok())
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|w| cid_widths(doc, w))
            .unwrap_or_default();
        let descriptor = descendant.and_then(|d| dict_of(doc, d, b"FontDescriptor"));
        let (ascent, descent) = vertical_metrics(doc, descriptor);
        let code_len = to_unicode
            .as_ref()
            .and_then(|c| c.code_len())
            .filter(|len| *len <= 2)
            .unwrap_or(2);

        Self {
            base_font,
            kind: FontKind::Composite,
            code_len,
            widths: WidthSource::Cid { widths },
            default_width,
            standard: None,
            encoding: Box::new([None; 256]),
            to_unicode,
            width_scale: 1.0,
            ascent,
            descent,
        }
    }

    /// Number of bytes per character code.
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    /// Splits a shown string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks(self.code_len)
            .map(|chunk| chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
            .collect()
    }

    /// Horizontal advance of `code` in 1/1000 text space units.
    pub fn width(&self, code: u32) -> f64 {
        let raw = match &self.widths {
            WidthSource::Table { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize).copied())
                .or_else(|| self.standard.map(|m| m.width(self.char_for(code))))
                .unwrap_or(self.default_width),
            WidthSource::Cid { widths } => widths.get(&code).copied().unwrap_or(self.default_width),
            WidthSource::Standard(metrics) => metrics.width(self.char_for(code)),
            WidthSource::Uniform => self.default_width,
        };
        raw * self.width_scale
    }

    /// True when widths come from the uniform estimate rather than metrics.
    pub fn has_approximate_widths(&self) -> bool {
        matches!(self.widths, WidthSource::Uniform)
    }

    /// Unicode text for a character code.
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.lookup(code)) {
            return text.to_string();
        }
        match self.kind {
            // CIDs carry no Unicode meaning without a ToUnicode map
            FontKind::Composite => '\u{FFFD}'.to_string(),
            _ => self.encoding[(code & 0xFF) as usize]
                .unwrap_or('\u{FFFD}')
                .to_string(),
        }
    }

    /// Word spacing (`Tw`) applies to the single-byte code 32 only.
    pub fn is_word_space(&self, code: u32) -> bool {
        self.code_len == 1 && code == 32
    }

    fn char_for(&self, code: u32) -> char {
        self.encoding[(code & 0xFF) as usize].unwrap_or('\u{FFFD}')
    }
}

fn name_of(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve(doc, o).as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

fn dict_of<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
}

fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((prefix, rest)) if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

fn vertical_metrics(doc: &Document, descriptor: Option<&Dictionary>) -> (f64, f64) {
    let read = |key: &[u8]| {
        descriptor
            .and_then(|d| d.get(key).ok())
            .and_then(|o| number(resolve(doc, o)))
    };
    let ascent = read(b"Ascent")
        .filter(|a| *a > 0.0 && *a <= 2000.0)
        .unwrap_or(DEFAULT_ASCENT);
    let descent = read(b"Descent")
        .filter(|d| *d <= 0.0 && *d >= -1000.0)
        .unwrap_or(DEFAULT_DESCENT);
    (ascent, descent)
}

fn base_table(base: BaseEncoding) -> Box<[Option<char>; 256]> {
    let mut table = Box::new([None; 256]);
    for (code, slot) in table.iter_mut().enumerate() {
        *slot = base.decode(code as u8);
    }
    table
}

fn simple_encoding(doc: &Document, dict: &Dictionary) -> Box<[Option<char>; 256]> {
    let encoding = dict.get(b"Encoding").ok().map(|o| resolve(doc, o));
    let (base, differences) = match encoding {
        Some(Object::Name(name)) => (BaseEncoding::from_name(name), None),
        Some(Object::Dictionary(enc)) => (
            enc.get(b"BaseEncoding")
                .ok()
                .and_then(|o| resolve(doc, o).as_name().ok())
                .and_then(BaseEncoding::from_name),
            enc.get(b"Differences")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok()),
        ),
        _ => (None, None),
    };

    let mut table = base_table(base.unwrap_or(BaseEncoding::WinAnsi));
    if let Some(differences) = differences {
        let mut code: usize = 0;
        for item in differences {
            match resolve(doc, item) {
                Object::Integer(start) => code = (*start).clamp(0, 255) as usize,
                Object::Name(name) => {
                    if code < 256 {
                        if let Some(c) = glyph_name_to_char(&String::from_utf8_lossy(name)) {
                            table[code] = Some(c);
                        }
                    }
                    code += 1;
                }
                _ => {}
            }
        }
    }
    table
}

fn cid_widths(doc: &Document, array: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let items: Vec<&Object> = array.iter().map(|o| resolve(doc, o)).collect();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(items[i]) else {
            i += 1;
            continue;
        };
        match items.get(i + 1) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(first as u32 + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = number(last).unwrap_or(first);
                let w = items.get(i + 2).and_then(|o| number(o)).unwrap_or(0.0);
                let span = (last - first).clamp(0.0, 65535.0) as u32;
                for offset in 0..=span {
                    widths.insert(first as u32 + offset, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Approximate width of `text` in Helvetica at `size`, in text space.
pub fn helvetica_text_width(text: &str, size: f64) -> f64 {
    text.chars().map(helvetica_width).sum::<f64>() / 1000.0 * size
}
