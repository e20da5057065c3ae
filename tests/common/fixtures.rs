//! Test fixtures and PDF builders.
//!
//! Documents are assembled object by object with lopdf so each test controls
//! exactly how its text is split across show-text operators, streams and
//! pages.

use anyhow::Result;
use lopdf::{dictionary, Document, Object, Stream};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::io::BufWriter;

/// One page of a fixture document.
#[derive(Debug, Clone)]
struct FixturePage {
    fragments: Vec<String>,
    rotate: Option<i64>,
    media_box: [i64; 4],
}

/// ToUnicode CMap for the `/F3` fixture font: two-byte codes equal to the
/// printable ASCII code points.
const IDENTITY_ASCII_CMAP: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Fixture-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0020> <007E> <0020>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

/// A form XObject registered on the page tree.
#[derive(Debug, Clone)]
struct FixtureForm {
    content: String,
    matrix: [f64; 6],
}

/// Builder for creating test PDFs with custom content streams.
///
/// Pages share a resource dictionary on the page tree root with
/// `/F1` = Helvetica and `/F2` = Courier, both WinAnsi, and `/F3`, a Type0
/// font with Identity-H encoding, 2-byte codes and a ToUnicode CMap. Forms
/// added with [`PdfFixture::with_form`] are `/Fm0`, `/Fm1`, … in the same
/// dictionary and take their fonts from it.
///
/// ```no_run
/// let bytes = PdfFixture::new()
///     .with_page(&text_line(72.0, 720.0, 12.0, "Account: 12345"))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PdfFixture {
    pages: Vec<FixturePage>,
    forms: Vec<FixtureForm>,
    compress: bool,
    encrypted: bool,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Letter page with a single content stream.
    pub fn with_page(self, content: &str) -> Self {
        self.with_fragmented_page(&[content])
    }

    /// Adds a page whose `/Contents` is an array of streams.
    pub fn with_fragmented_page(mut self, fragments: &[&str]) -> Self {
        self.pages.push(FixturePage {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            rotate: None,
            media_box: [0, 0, 612, 792],
        });
        self
    }

    /// Adds a page displayed with the given `/Rotate`.
    pub fn with_rotated_page(mut self, rotate: i64, content: &str) -> Self {
        self.pages.push(FixturePage {
            fragments: vec![content.to_string()],
            rotate: Some(rotate),
            media_box: [0, 0, 612, 792],
        });
        self
    }

    /// Registers the next `/Fm{n}` form XObject, shared by all pages.
    pub fn with_form(self, content: &str) -> Self {
        self.with_form_matrix(content, [1.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }

    /// Like [`PdfFixture::with_form`] with a form `/Matrix`.
    pub fn with_form_matrix(mut self, content: &str, matrix: [f64; 6]) -> Self {
        self.forms.push(FixtureForm {
            content: content.to_string(),
            matrix,
        });
        self
    }

    /// Flate-compresses every content stream.
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Marks the document as encrypted in the trailer.
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.try_build().expect("fixture document builds")
    }

    fn try_build(&self) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let helvetica = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let courier = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });

        let to_unicode = doc.add_object(Stream::new(
            dictionary! {},
            IDENTITY_ASCII_CMAP.as_bytes().to_vec(),
        ));
        let composite = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "FixtureSans",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType2",
                "BaseFont" => "FixtureSans",
                "CIDSystemInfo" => dictionary! {
                    "Registry" => Object::string_literal("Adobe"),
                    "Ordering" => Object::string_literal("Identity"),
                    "Supplement" => 0,
                },
                "DW" => 600,
            })],
            "ToUnicode" => to_unicode,
        });

        let mut xobjects = lopdf::Dictionary::new();
        for (n, form) in self.forms.iter().enumerate() {
            let mut stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Matrix" => form.matrix.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
                },
                form.content.as_bytes().to_vec(),
            );
            if self.compress {
                stream.compress()?;
            }
            xobjects.set(format!("Fm{}", n), Object::Reference(doc.add_object(stream)));
        }

        let mut kids = Vec::new();
        for page in &self.pages {
            let mut contents = Vec::new();
            for fragment in &page.fragments {
                let mut stream = Stream::new(dictionary! {}, fragment.as_bytes().to_vec());
                if self.compress {
                    stream.compress()?;
                }
                contents.push(Object::Reference(doc.add_object(stream)));
            }
            let contents = if contents.len() == 1 {
                contents.remove(0)
            } else {
                Object::Array(contents)
            };

            let mut dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => page.media_box.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
                "Contents" => contents,
            };
            if let Some(rotate) = page.rotate {
                dict.set("Rotate", rotate);
            }
            kids.push(Object::Reference(doc.add_object(dict)));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => helvetica, "F2" => courier, "F3" => composite },
                    "XObject" => xobjects,
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if self.encrypted {
            doc.trailer.set(
                "Encrypt",
                dictionary! { "Filter" => "Standard", "V" => 1, "R" => 2 },
            );
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// A `BT … ET` block showing `text` with `/F1` at (`x`, `y`).
pub fn text_line(x: f64, y: f64, size: f64, text: &str) -> String {
    format!("BT /F1 {} Tf {} {} Td ({}) Tj ET\n", size, x, y, escape(text))
}

/// Shows each piece with its own `Tj`, continuing on the same line.
pub fn split_line(x: f64, y: f64, size: f64, pieces: &[&str]) -> String {
    let shows: String = pieces
        .iter()
        .map(|p| format!("({}) Tj ", escape(p)))
        .collect();
    format!("BT /F1 {} Tf {} {} Td {}ET\n", size, x, y, shows)
}

/// A `BT … ET` block showing `text` with the Type0 font `/F3`, as one hex
/// string of 2-byte codes.
pub fn type0_line(x: f64, y: f64, size: f64, text: &str) -> String {
    let hex: String = text.chars().map(|c| format!("{:04X}", c as u32)).collect();
    format!("BT /F3 {} Tf {} {} Td <{}> Tj ET\n", size, x, y, hex)
}

/// Escapes a literal string for a content stream.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// A one-page document with `lines` at 14pt leading from the top margin.
pub fn letter_with_lines(lines: &[&str]) -> Vec<u8> {
    let content: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| text_line(72.0, 720.0 - 14.0 * i as f64, 11.0, line))
        .collect();
    PdfFixture::new().with_page(&content).build()
}

/// A document produced by printpdf rather than hand-written operators.
pub fn printpdf_document(text: &str) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new("Fixture", Mm(210.0), Mm(297.0), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    doc.get_page(page)
        .get_layer(layer)
        .use_text(text, 12.0, Mm(20.0), Mm(270.0), &font);
    let mut bytes = Vec::new();
    doc.save(&mut BufWriter::new(&mut bytes))?;
    Ok(bytes)
}
