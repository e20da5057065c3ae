//! Coordinate primitives: affine matrices, rectangles and page geometry.
//!
//! PDF user space has its origin at the bottom-left with y growing upward.
//! Display space is what a viewer shows: origin at the top-left of the
//! visible box after `/Rotate` is applied, y growing downward.

use lopdf::{Document, Object, ObjectId};

/// Affine transform in PDF row-vector convention: `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Returns `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Applies only the linear part (no translation).
    pub fn apply_vector(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y, self.b * x + self.d * y)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned rectangle with `x`/`y` at the minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_points(points: &[(f64, f64)]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.max_x().max(other.max_x()) - x,
            self.max_y().max(other.max_y()) - y,
        )
    }

    pub fn pad(&self, amount: f64) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Bounds of this rectangle after transformation by `m`.
    pub fn transform(&self, m: &Matrix) -> Rect {
        let corners = [
            m.apply(self.x, self.y),
            m.apply(self.max_x(), self.y),
            m.apply(self.max_x(), self.max_y()),
            m.apply(self.x, self.max_y()),
        ];
        Rect::from_points(&corners)
    }
}

/// Visible box and rotation of a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Crop box, falling back to the media box, in user space.
    pub visible: Rect,
    /// Clockwise display rotation, one of 0, 90, 180, 270.
    pub rotation: u16,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            visible: Rect::new(0.0, 0.0, 612.0, 792.0),
            rotation: 0,
        }
    }
}

impl PageGeometry {
    pub fn resolve(doc: &Document, page_id: ObjectId) -> Self {
        let visible = inherited(doc, page_id, b"CropBox")
            .and_then(|o| rect_from_array(doc, o))
            .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(|o| rect_from_array(doc, o)))
            .unwrap_or(PageGeometry::default().visible);

        let rotation = inherited(doc, page_id, b"Rotate")
            .and_then(|o| resolve(doc, o).as_i64().ok())
            .map(|r| (r.rem_euclid(360) / 90 * 90) as u16)
            .unwrap_or(0);

        Self { visible, rotation }
    }

    /// Maps a user-space point into display space.
    pub fn to_display(&self, x: f64, y: f64) -> (f64, f64) {
        let px = x - self.visible.x;
        let py = self.visible.max_y() - y;
        let (w, h) = (self.visible.width, self.visible.height);
        match self.rotation {
            90 => (h - py, px),
            180 => (w - px, h - py),
            270 => (py, w - px),
            _ => (px, py),
        }
    }

    /// Inverse of [`PageGeometry::to_display`].
    pub fn from_display(&self, dx: f64, dy: f64) -> (f64, f64) {
        let (w, h) = (self.visible.width, self.visible.height);
        let (px, py) = match self.rotation {
            90 => (dy, h - dx),
            180 => (w - dx, h - dy),
            270 => (w - dy, dx),
            _ => (dx, dy),
        };
        (px + self.visible.x, self.visible.max_y() - py)
    }

    pub fn rect_to_display(&self, rect: &Rect) -> Rect {
        let corners = [
            self.to_display(rect.x, rect.y),
            self.to_display(rect.max_x(), rect.y),
            self.to_display(rect.max_x(), rect.max_y()),
            self.to_display(rect.x, rect.max_y()),
        ];
        Rect::from_points(&corners)
    }
}

/// Reads a number operand (integer or real).
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Follows a reference chain to the direct object.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..32 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Looks up a page attribute, walking up `/Parent` for inheritable keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn rect_from_array(doc: &Document, obj: &Object) -> Option<Rect> {
    let values: Vec<f64> = resolve(doc, obj)
        .as_array()
        .ok()?
        .iter()
        .filter_map(|o| number(resolve(doc, o)))
        .collect();
    if values.len() != 4 {
        return None;
    }
    let (x0, x1) = (values[0].min(values[2]), values[0].max(values[2]));
    let (y0, y1) = (values[1].min(values[3]), values[1].max(values[3]));
    Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
}
