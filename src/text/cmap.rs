//! `/ToUnicode` CMap parsing.
//!
//! Only the parts that matter for text extraction are read: the code space
//! (for the code byte length) and the `bfchar` / `bfrange` mappings.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Upper bound on codes expanded from a single `bfrange` entry.
const MAX_RANGE_SPAN: u32 = 0x1_0000;

/// Character code → Unicode mapping read from a ToUnicode stream.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeCMap {
    map: HashMap<u32, String>,
    code_len: Option<usize>,
}

struct CMapPatterns;

impl CMapPatterns {
    fn codespace_block() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?s)begincodespacerange(.*?)endcodespacerange").expect("Valid regex pattern")
        });
        &PATTERN
    }

    fn bfchar_block() -> &'static Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").expect("Valid regex pattern"));
        &PATTERN
    }

    fn bfrange_block() -> &'static Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").expect("Valid regex pattern"));
        &PATTERN
    }

    fn hex_pair() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>").expect("Valid regex pattern")
        });
        &PATTERN
    }

    fn range_entry() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"<([0-9A-Fa-f\s]+)>\s*<([0-9A-Fa-f\s]+)>\s*(?:<([0-9A-Fa-f\s]*)>|\[([^\]]*)\])",
            )
            .expect("Valid regex pattern")
        });
        &PATTERN
    }

    fn hex_token() -> &'static Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"<([0-9A-Fa-f\s]*)>").expect("Valid regex pattern"));
        &PATTERN
    }
}

impl ToUnicodeCMap {
    /// Parses a decoded ToUnicode stream. Unreadable entries are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut cmap = Self::default();

        if let Some(block) = CMapPatterns::codespace_block().captures(&text) {
            cmap.code_len = CMapPatterns::hex_token()
                .captures(&block[1])
                .map(|c| hex_bytes(&c[1]).len())
                .filter(|len| (1..=4).contains(len));
        }

        for block in CMapPatterns::bfchar_block().captures_iter(&text) {
            for pair in CMapPatterns::hex_pair().captures_iter(&block[1]) {
                let src = hex_bytes(&pair[1]);
                cmap.note_len(src.len());
                let dst = utf16be(&hex_bytes(&pair[2]));
                cmap.map.insert(code_value(&src), dst);
            }
        }

        for block in CMapPatterns::bfrange_block().captures_iter(&text) {
            for entry in CMapPatterns::range_entry().captures_iter(&block[1]) {
                let lo_bytes = hex_bytes(&entry[1]);
                cmap.note_len(lo_bytes.len());
                let lo = code_value(&lo_bytes);
                let hi = code_value(&hex_bytes(&entry[2]));
                if hi < lo || hi - lo >= MAX_RANGE_SPAN {
                    continue;
                }

                if let Some(dst) = entry.get(3) {
                    let base = utf16_units(&hex_bytes(dst.as_str()));
                    if base.is_empty() {
                        continue;
                    }
                    for offset in 0..=(hi - lo) {
                        let mut units = base.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(offset as u16);
                        }
                        cmap.map.insert(lo + offset, String::from_utf16_lossy(&units));
                    }
                } else if let Some(list) = entry.get(4) {
                    for (offset, token) in CMapPatterns::hex_token()
                        .captures_iter(list.as_str())
                        .enumerate()
                    {
                        let code = lo + offset as u32;
                        if code > hi {
                            break;
                        }
                        cmap.map.insert(code, utf16be(&hex_bytes(&token[1])));
                    }
                }
            }
        }

        cmap
    }

    fn note_len(&mut self, len: usize) {
        if self.code_len.is_none() && (1..=4).contains(&len) {
            self.code_len = Some(len);
        }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// Code byte length declared by the code space, if any.
    pub fn code_len(&self) -> Option<usize> {
        self.code_len
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter(|b| b.is_ascii_hexdigit())
        .map(|b| match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            _ => b - b'A' + 10,
        })
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| {
            if pair.len() == 2 {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                pair[0] as u16
            }
        })
        .collect()
}

fn utf16be(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}
