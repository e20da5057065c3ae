//! Opaque marker boxes and labels drawn over removed text.

use crate::config::EngineConfig;
use crate::text::encoding::encode_win_ansi;
use crate::text::font::helvetica_text_width;
use crate::text::geometry::{PageGeometry, Rect};
use lopdf::content::Operation;
use lopdf::{dictionary, Dictionary, Document, Object};

use super::resources::add_resource;
use super::rewrite::literal;

/// Label cap height relative to the font size, used for vertical centering.
const CAP_HEIGHT: f64 = 0.7;
const LABEL_HEIGHT_FILL: f64 = 0.7;
const LABEL_WIDTH_FILL: f64 = 0.9;

/// Drawing operations for the marker of every match on a page.
///
/// `matches` holds the user-space segments of each match. The operations
/// assume the default coordinate system and leave the graphics state as
/// they found it.
pub(crate) fn marker_operations(
    matches: &[Vec<Rect>],
    geometry: &PageGeometry,
    label: Option<(&str, &str)>,
    config: &EngineConfig,
) -> Vec<Operation> {
    let mut ops = vec![Operation::new("q", vec![])];
    ops.push(color_op("rg", config.fill_color));
    for rect in matches.iter().flatten().map(|r| r.pad(config.padding)) {
        ops.push(Operation::new(
            "re",
            vec![
                real(rect.x),
                real(rect.y),
                real(rect.width),
                real(rect.height),
            ],
        ));
    }
    ops.push(Operation::new("f", vec![]));

    if let Some((text, font_name)) = label {
        for segments in matches {
            let largest = segments
                .iter()
                .map(|r| r.pad(config.padding))
                .max_by(|a, b| a.area().total_cmp(&b.area()));
            if let Some(rect) = largest {
                ops.extend(label_operations(&rect, geometry, text, font_name, config));
            }
        }
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Operations that draw `text` centered in `rect`, upright on screen.
fn label_operations(
    rect: &Rect,
    geometry: &PageGeometry,
    text: &str,
    font_name: &str,
    config: &EngineConfig,
) -> Vec<Operation> {
    let shown = geometry.rect_to_display(rect);
    let (along, across) = (shown.width, shown.height);
    let unit_width = helvetica_text_width(text, 1.0);
    if unit_width <= 0.0 {
        return Vec::new();
    }
    let size = (LABEL_HEIGHT_FILL * across).min(LABEL_WIDTH_FILL * along / unit_width);
    if size < config.min_label_size {
        return Vec::new();
    }

    // rotate counter-clockwise by the page rotation so the viewer's turn cancels it
    let theta = (geometry.rotation as f64).to_radians();
    let (sin, cos) = (theta.sin().round(), theta.cos().round());
    // start of the baseline, placed on screen and mapped back to user space
    let half = unit_width * size / 2.0;
    let drop = CAP_HEIGHT * size / 2.0;
    let (ox, oy) = geometry.from_display(
        shown.x + shown.width / 2.0 - half,
        shown.y + shown.height / 2.0 + drop,
    );

    vec![
        Operation::new("BT", vec![]),
        color_op("rg", config.label_color),
        Operation::new("Tf", vec![Object::Name(font_name.as_bytes().to_vec()), real(size)]),
        Operation::new(
            "Tm",
            vec![real(cos), real(sin), real(-sin), real(cos), real(ox), real(oy)],
        ),
        Operation::new("Tj", vec![literal(encode_win_ansi(text))]),
        Operation::new("ET", vec![]),
    ]
}

/// Adds a Helvetica font for labels to `resources` and returns its
/// resource name.
pub(crate) fn install_label_font(doc: &mut Document, resources: &mut Dictionary) -> String {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    add_resource(doc, resources, "Font", "XLabel", font_id)
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn color_op(operator: &str, rgb: [f64; 3]) -> Operation {
    Operation::new(operator, rgb.iter().map(|c| real(*c)).collect())
}
