//! Content stream interpretation.
//!
//! Walks a page's decoded operators, tracking the graphics and text state,
//! and records one [`Glyph`] per shown character code together with the
//! positioning data the rewriter needs to delete that glyph later. Form
//! XObjects drawn with `Do` are interpreted in place, each invocation as its
//! own [`StreamScan`].

use super::content;
use super::font::Font;
use super::geometry::{inherited, number, resolve, Matrix, PageGeometry, Rect};
use crate::error::{ExpungeError, ExpungeResult};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Nesting limit for form XObjects drawing other forms.
const MAX_FORM_DEPTH: usize = 16;

/// Position of one glyph: the stream it is drawn from (index into
/// [`PageScan::streams`]), the operator index within that stream, and the
/// glyph ordinal within the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphRef {
    pub stream: usize,
    pub op: usize,
    pub glyph: usize,
}

/// One shown character code, positioned in user space.
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Unicode text of the code; empty when the font maps it to nothing.
    pub text: String,
    pub bbox: Rect,
    /// Baseline start and end (after advance) in user space.
    pub origin: (f64, f64),
    pub end: (f64, f64),
    /// Unit baseline direction in user space.
    pub direction: (f64, f64),
    /// Rendered font height in user space.
    pub size: f64,
    pub font: usize,
    pub font_size: f64,
    pub source: GlyphRef,
}

/// Per-operator data for glyph removal.
#[derive(Debug, Clone)]
pub struct ShowOp {
    pub code_len: usize,
    /// For each glyph, the `TJ` adjustment that reproduces its advance, or
    /// `None` when the font size is zero.
    pub adjustments: Vec<Option<f64>>,
}

/// A form XObject drawn by a `Do` operator.
#[derive(Debug, Clone, PartialEq)]
pub struct FormCall {
    /// Stream holding the `Do`.
    pub parent: usize,
    /// Index of the `Do` within the parent's operations.
    pub op: usize,
    /// XObject resource name used by the `Do`.
    pub name: Vec<u8>,
    pub id: ObjectId,
}

/// Decoded operators of the page content or of one form invocation.
#[derive(Debug, Clone, Default)]
pub struct StreamScan {
    pub operations: Vec<Operation>,
    pub shows: HashMap<usize, ShowOp>,
    /// `None` for the page's own content.
    pub form: Option<FormCall>,
}

/// Everything known about one page after interpretation.
#[derive(Debug, Clone)]
pub struct PageScan {
    /// 1-based page number.
    pub number: u32,
    pub id: ObjectId,
    pub geometry: PageGeometry,
    /// Page content first, then form invocations in drawing order. A form
    /// always comes after the stream that draws it.
    pub streams: Vec<StreamScan>,
    pub glyphs: Vec<Glyph>,
    /// Resource names of the fonts referenced by `Glyph::font`.
    pub font_names: Vec<String>,
}

/// Parses document bytes, rejecting encrypted files.
pub fn load_document(bytes: &[u8]) -> ExpungeResult<Document> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ExpungeError::parse(format!("unreadable PDF structure: {}", e)))?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ExpungeError::parse("encrypted documents are not supported"));
    }
    Ok(doc)
}

/// Interprets every page of `doc` in page order.
pub fn scan_document(doc: &Document) -> ExpungeResult<Vec<PageScan>> {
    doc.get_pages()
        .into_iter()
        .map(|(number, id)| scan_page(doc, number, id))
        .collect()
}

/// Interprets a single page.
pub fn scan_page(doc: &Document, number: u32, id: ObjectId) -> ExpungeResult<PageScan> {
    let data = doc
        .get_page_content(id)
        .map_err(|e| ExpungeError::parse_on_page(number, format!("content stream: {}", e)))?;
    let operations = content::decode(&data)
        .map_err(|e| ExpungeError::parse_on_page(number, format!("content operators: {}", e)))?;

    let mut interpreter = Interpreter::new(doc, number);
    interpreter.streams.push(StreamScan::default());
    interpreter.run(0, &operations, Scope::new(0, page_resources(doc, id)))?;
    interpreter.streams[0].operations = operations;
    trace!(
        page = number,
        glyphs = interpreter.glyphs.len(),
        forms = interpreter.streams.len() - 1,
        "page interpreted"
    );

    Ok(PageScan {
        number,
        id,
        geometry: PageGeometry::resolve(doc, id),
        streams: interpreter.streams,
        glyphs: interpreter.glyphs,
        font_names: interpreter.font_names,
    })
}

/// The page resource dictionary, following inheritance.
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    resolve(doc, inherited(doc, page_id, b"Resources")?)
        .as_dict()
        .ok()
}

/// Decoded bytes of a stream that may or may not be filtered.
pub(crate) fn stream_data(stream: &Stream) -> Result<Vec<u8>, String> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().map_err(|e| e.to_string())
    } else {
        Ok(stream.content.clone())
    }
}

/// A resource dictionary in effect, with the index of the stream that owns
/// it. Font names are only meaningful within one scope.
#[derive(Debug, Clone, Copy)]
struct Scope<'a> {
    owner: usize,
    resources: Option<&'a Dictionary>,
}

impl<'a> Scope<'a> {
    fn new(owner: usize, resources: Option<&'a Dictionary>) -> Self {
        Self { owner, resources }
    }

    fn category(&self, doc: &'a Document, key: &[u8]) -> Option<&'a Dictionary> {
        resolve(doc, self.resources?.get(key).ok()?).as_dict().ok()
    }
}

#[derive(Debug, Clone)]
struct TextState {
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    font: Option<usize>,
    font_size: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

struct Interpreter<'a> {
    doc: &'a Document,
    page: u32,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    fonts: Vec<Font>,
    font_names: Vec<String>,
    font_index: HashMap<(usize, Vec<u8>), usize>,
    glyphs: Vec<Glyph>,
    streams: Vec<StreamScan>,
    /// Forms currently being interpreted, outermost first.
    active: Vec<ObjectId>,
}

enum Shown<'o> {
    Str(&'o [u8]),
    Adjust(f64),
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, page: u32) -> Self {
        Self {
            doc,
            page,
            state: GraphicsState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            fonts: Vec::new(),
            font_names: Vec::new(),
            font_index: HashMap::new(),
            glyphs: Vec::new(),
            streams: Vec::new(),
            active: Vec::new(),
        }
    }

    fn run(&mut self, stream: usize, operations: &[Operation], scope: Scope<'a>) -> ExpungeResult<()> {
        for (index, op) in operations.iter().enumerate() {
            self.step(stream, index, op, scope)?;
        }
        Ok(())
    }

    fn step(&mut self, stream: usize, index: usize, op: &Operation, scope: Scope<'a>) -> ExpungeResult<()> {
        let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" if nums.len() >= 6 => {
                let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                self.state.ctm = m.then(&self.state.ctm);
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tm" if nums.len() >= 6 => {
                self.tm = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                self.tlm = self.tm;
            }
            "Td" if nums.len() >= 2 => self.next_line(nums[0], nums[1]),
            "TD" if nums.len() >= 2 => {
                self.state.text.leading = -nums[1];
                self.next_line(nums[0], nums[1]);
            }
            "T*" => self.next_line(0.0, -self.state.text.leading),
            "Tc" if !nums.is_empty() => self.state.text.char_spacing = nums[0],
            "Tw" if !nums.is_empty() => self.state.text.word_spacing = nums[0],
            "Tz" if !nums.is_empty() => self.state.text.h_scale = nums[0] / 100.0,
            "TL" if !nums.is_empty() => self.state.text.leading = nums[0],
            "Ts" if !nums.is_empty() => self.state.text.rise = nums[0],
            "Tf" if op.operands.len() >= 2 => {
                if let Ok(name) = op.operands[0].as_name() {
                    let font = self.font(scope, name);
                    self.state.text.font = Some(font);
                }
                if let Some(size) = number(&op.operands[1]) {
                    self.state.text.font_size = size;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(stream, index, scope, &[Shown::Str(bytes)]);
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.text.leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(stream, index, scope, &[Shown::Str(bytes)]);
                }
            }
            "\"" if op.operands.len() >= 3 => {
                if let Some(aw) = number(&op.operands[0]) {
                    self.state.text.word_spacing = aw;
                }
                if let Some(ac) = number(&op.operands[1]) {
                    self.state.text.char_spacing = ac;
                }
                self.next_line(0.0, -self.state.text.leading);
                if let Object::String(bytes, _) = &op.operands[2] {
                    self.show(stream, index, scope, &[Shown::Str(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let parts: Vec<Shown> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(Shown::Str(bytes)),
                            other => number(other).map(Shown::Adjust),
                        })
                        .collect();
                    self.show(stream, index, scope, &parts);
                }
            }
            "Do" => {
                if let Some(Ok(name)) = op.operands.first().map(Object::as_name) {
                    self.draw_form(stream, index, name, scope)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Interprets the form XObject `name` if it is one. Images and unknown
    /// names are skipped.
    fn draw_form(
        &mut self,
        stream: usize,
        index: usize,
        name: &[u8],
        scope: Scope<'a>,
    ) -> ExpungeResult<()> {
        let doc = self.doc;
        let Some(id) = scope
            .category(doc, b"XObject")
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|o| o.as_reference().ok())
        else {
            debug!(xobject = %String::from_utf8_lossy(name), "external object not found");
            return Ok(());
        };
        let Ok(form) = doc.get_object(id).and_then(Object::as_stream) else {
            return Ok(());
        };
        if form.dict.get(b"Subtype").and_then(Object::as_name).ok() != Some(b"Form".as_slice()) {
            return Ok(());
        }
        if self.active.contains(&id) || self.active.len() >= MAX_FORM_DEPTH {
            debug!(form = ?id, depth = self.active.len(), "form not entered: recursive or too deep");
            return Ok(());
        }

        let data = stream_data(form).map_err(|e| {
            ExpungeError::parse_on_page(self.page, format!("form {:?} content: {}", id, e))
        })?;
        let operations = content::decode(&data).map_err(|e| {
            ExpungeError::parse_on_page(self.page, format!("form {:?} operators: {}", id, e))
        })?;
        let matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|a| a.iter().filter_map(|o| number(resolve(doc, o))).collect::<Vec<_>>())
            .filter(|n| n.len() == 6)
            .map_or(Matrix::IDENTITY, |n| Matrix::new(n[0], n[1], n[2], n[3], n[4], n[5]));

        let own = self.streams.len();
        self.streams.push(StreamScan {
            form: Some(FormCall {
                parent: stream,
                op: index,
                name: name.to_vec(),
                id,
            }),
            ..StreamScan::default()
        });
        let inner = match form.dict.get(b"Resources").ok().map(|o| resolve(doc, o).as_dict()) {
            Some(Ok(resources)) => Scope::new(own, Some(resources)),
            _ => scope,
        };

        // the form runs inside an implicit q/Q; text matrices are restored after it
        let (state, depth, tm, tlm) = (self.state.clone(), self.stack.len(), self.tm, self.tlm);
        self.state.ctm = matrix.then(&self.state.ctm);
        self.active.push(id);
        let result = self.run(own, &operations, inner);
        self.active.pop();
        self.stack.truncate(depth);
        self.state = state;
        self.tm = tm;
        self.tlm = tlm;
        result?;

        self.streams[own].operations = operations;
        Ok(())
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn font(&mut self, scope: Scope<'a>, name: &[u8]) -> usize {
        let key = (scope.owner, name.to_vec());
        if let Some(&index) = self.font_index.get(&key) {
            return index;
        }
        let doc = self.doc;
        let loaded = scope
            .category(doc, b"Font")
            .and_then(|fonts| fonts.get(name).ok())
            .and_then(|o| resolve(doc, o).as_dict().ok())
            .map(|dict| Font::load(doc, dict));
        let font = loaded.unwrap_or_else(|| {
            debug!(font = %String::from_utf8_lossy(name), "font resource missing, using Helvetica metrics");
            Font::fallback()
        });
        if font.has_approximate_widths() {
            debug!(font = %font.base_font, "no glyph widths, positions are interpolated");
        }
        let index = self.fonts.len();
        self.fonts.push(font);
        self.font_names
            .push(String::from_utf8_lossy(name).into_owned());
        self.font_index.insert(key, index);
        index
    }

    fn show(&mut self, stream: usize, index: usize, scope: Scope<'a>, parts: &[Shown]) {
        let font_id = match self.state.text.font {
            Some(id) => id,
            None => {
                let id = self.font(scope, b"");
                self.state.text.font = Some(id);
                id
            }
        };
        let ts = self.state.text.clone();
        let font = &self.fonts[font_id];
        let size = ts.font_size;
        let mut adjustments = Vec::new();
        let mut ordinal = 0;

        for part in parts {
            match part {
                Shown::Adjust(n) => {
                    let shift = -n / 1000.0 * size * ts.h_scale;
                    self.tm = Matrix::translate(shift, 0.0).then(&self.tm);
                }
                Shown::Str(bytes) => {
                    for code in font.codes(bytes) {
                        let w0 = font.width(code);
                        let spacing = ts.char_spacing
                            + if font.is_word_space(code) {
                                ts.word_spacing
                            } else {
                                0.0
                            };
                        let advance = (w0 / 1000.0 * size + spacing) * ts.h_scale;

                        let trm = Matrix::new(size * ts.h_scale, 0.0, 0.0, size, 0.0, ts.rise)
                            .then(&self.tm)
                            .then(&self.state.ctm);
                        let glyph_box = Rect::new(
                            0.0,
                            font.descent / 1000.0,
                            w0 / 1000.0,
                            (font.ascent - font.descent) / 1000.0,
                        )
                        .transform(&trm);
                        let next_tm = Matrix::translate(advance, 0.0).then(&self.tm);
                        let end = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, ts.rise)
                            .then(&next_tm)
                            .then(&self.state.ctm)
                            .apply(0.0, 0.0);
                        let (dx, dy) = trm.apply_vector(1.0, 0.0);
                        let length = dx.hypot(dy);
                        let direction = if length > f64::EPSILON {
                            (dx / length, dy / length)
                        } else {
                            (1.0, 0.0)
                        };
                        let (hx, hy) = trm.apply_vector(0.0, 1.0);

                        self.glyphs.push(Glyph {
                            text: font.decode(code),
                            bbox: glyph_box,
                            origin: trm.apply(0.0, 0.0),
                            end,
                            direction,
                            size: hx.hypot(hy),
                            font: font_id,
                            font_size: size,
                            source: GlyphRef {
                                stream,
                                op: index,
                                glyph: ordinal,
                            },
                        });
                        adjustments.push(if size.abs() > f64::EPSILON {
                            Some(-(w0 + spacing * 1000.0 / size))
                        } else {
                            None
                        });
                        self.tm = next_tm;
                        ordinal += 1;
                    }
                }
            }
        }

        self.streams[stream].shows.insert(
            index,
            ShowOp {
                code_len: font.code_len(),
                adjustments,
            },
        );
    }
}
