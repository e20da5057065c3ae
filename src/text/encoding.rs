//! Built-in encodings, glyph names and standard font metrics.

/// Base encoding of a simple font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    WinAnsi,
    Standard,
    /// MacRoman shares the ASCII range with WinAnsi; the upper half is
    /// approximated by WinAnsi.
    MacRoman,
}

impl BaseEncoding {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"WinAnsiEncoding" => Some(Self::WinAnsi),
            b"StandardEncoding" => Some(Self::Standard),
            b"MacRomanEncoding" => Some(Self::MacRoman),
            _ => None,
        }
    }

    pub fn decode(self, code: u8) -> Option<char> {
        match (self, code) {
            (Self::Standard, 0x27) => Some('\u{2019}'),
            (Self::Standard, 0x60) => Some('\u{2018}'),
            _ => win_ansi(code),
        }
    }
}

const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

fn win_ansi(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        _ => None,
    }
}

/// Encodes printable ASCII for a WinAnsi font; other characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c as u8 } else { b'?' })
        .collect()
}

/// Resolves a glyph name from a `/Differences` array.
pub fn glyph_name_to_char(name: &str) -> Option<char> {
    if name.chars().count() == 1 {
        return name.chars().next().filter(|c| c.is_ascii_alphabetic());
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 {
            return u32::from_str_radix(&hex[..4], 16).ok().and_then(char::from_u32);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Ok(value) = u32::from_str_radix(hex, 16) {
                return char::from_u32(value);
            }
        }
    }
    let c = match name {
        "space" | "nbspace" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "quoteright" => '\u{2019}',
        "quoteleft" => '\u{2018}',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "asciicircum" => '^',
        "underscore" => '_',
        "grave" => '`',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "asciitilde" => '~',
        "bullet" => '\u{2022}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "ellipsis" => '\u{2026}',
        "fi" => '\u{FB01}',
        "fl" => '\u{FB02}',
        "copyright" => '\u{00A9}',
        "registered" => '\u{00AE}',
        "trademark" => '\u{2122}',
        "degree" => '\u{00B0}',
        "section" => '\u{00A7}',
        "paragraph" => '\u{00B6}',
        "eacute" => '\u{00E9}',
        "egrave" => '\u{00E8}',
        "aacute" => '\u{00E1}',
        "agrave" => '\u{00E0}',
        "odieresis" => '\u{00F6}',
        "udieresis" => '\u{00FC}',
        "adieresis" => '\u{00E4}',
        "germandbls" => '\u{00DF}',
        "ccedilla" => '\u{00E7}',
        "ntilde" => '\u{00F1}',
        "Euro" => '\u{20AC}',
        _ => return None,
    };
    Some(c)
}

/// Helvetica advance widths for U+0020..=U+007E, in 1/1000 em.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Metrics family of a standard-14 font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardMetrics {
    Helvetica,
    Monospace,
}

impl StandardMetrics {
    /// Matches a `/BaseFont` (subset prefix already stripped).
    ///
    /// Times and Arial share the Helvetica table: close enough for
    /// positioning, not exact.
    pub fn for_base_font(base_font: &str) -> Option<Self> {
        if base_font.starts_with("Courier") {
            Some(Self::Monospace)
        } else if base_font.starts_with("Helvetica")
            || base_font.starts_with("Arial")
            || base_font.starts_with("Times")
        {
            Some(Self::Helvetica)
        } else {
            None
        }
    }

    pub fn width(self, c: char) -> f64 {
        match self {
            Self::Monospace => 600.0,
            Self::Helvetica => helvetica_width(c),
        }
    }
}

pub fn helvetica_width(c: char) -> f64 {
    match c {
        ' '..='~' => HELVETICA_ASCII[(c as usize) - 0x20] as f64,
        _ => 556.0,
    }
}
