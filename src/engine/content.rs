//! Content stream interpretation.
//!
//! Tracks the graphics and text state through a page's operators and
//! reports every text-showing operator with its user-space position.
//! Consecutive pieces of one text object are then grouped into
//! [`TextRun`]s.

use std::collections::HashMap;

use lopdf::content::Operation;
use lopdf::Object;

use super::fonts::{number, PageFont};
use crate::elements::{compute_run_id, Color, TextRun};
use crate::geometry::{Matrix, Point};

/// TJ adjustments more negative than this (1/1000 em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -250.0;

/// One text-showing operator as rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ShownText {
    /// Index of the operator in the page's operation list
    pub op_index: usize,
    /// Operator (`Tj`, `TJ`, `'` or `"`)
    pub operator: String,
    /// Decoded text
    pub text: String,
    /// Baseline origin in user space
    pub origin: Point,
    /// Advance along the baseline in user space
    pub advance: f32,
    /// Rendered font size
    pub font_size: f32,
    /// Baseline rotation in degrees
    pub rotation: f32,
    /// Font resource key
    pub font_resource: String,
    /// Font name, subset prefix removed
    pub font_name: String,
    /// Fill colour
    pub color: Color,
    /// Counter of the enclosing `BT`
    pub text_object: usize,
    /// Single TJ adjustment that advances exactly as far as this operator
    pub blank_kern: Option<f32>,
}

impl ShownText {
    /// End of the baseline segment.
    pub fn end(&self) -> Point {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        Point::new(self.origin.x + self.advance * cos, self.origin.y + self.advance * sin)
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    font: Option<String>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            fill: Color::black(),
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    fonts: &'a HashMap<String, PageFont>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    text_object: usize,
    shown: Vec<ShownText>,
}

/// Every text-showing operator of a page, in content order.
pub fn interpret_page(operations: &[Operation], fonts: &HashMap<String, PageFont>) -> Vec<ShownText> {
    let mut interpreter = Interpreter {
        fonts,
        state: GraphicsState::default(),
        stack: Vec::new(),
        text_matrix: Matrix::identity(),
        line_matrix: Matrix::identity(),
        text_object: 0,
        shown: Vec::new(),
    };
    for (index, op) in operations.iter().enumerate() {
        interpreter.apply(index, op);
    }
    interpreter.shown
}

fn operands(op: &Operation) -> Vec<f32> {
    op.operands.iter().filter_map(number).collect()
}

impl<'a> Interpreter<'a> {
    fn apply(&mut self, index: usize, op: &Operation) {
        let nums = operands(op);
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            },
            "cm" if nums.len() == 6 => {
                let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                self.state.ctm = m.multiply(&self.state.ctm);
            },
            "g" if nums.len() == 1 => self.state.fill = Color::gray(nums[0]),
            "rg" if nums.len() == 3 => self.state.fill = Color::new(nums[0], nums[1], nums[2]),
            "k" if nums.len() == 4 => {
                self.state.fill = Color::from_cmyk(nums[0], nums[1], nums[2], nums[3])
            },
            "sc" | "scn" => match nums.len() {
                1 => self.state.fill = Color::gray(nums[0]),
                3 => self.state.fill = Color::new(nums[0], nums[1], nums[2]),
                4 => self.state.fill = Color::from_cmyk(nums[0], nums[1], nums[2], nums[3]),
                _ => {},
            },
            "BT" => {
                self.text_matrix = Matrix::identity();
                self.line_matrix = Matrix::identity();
                self.text_object += 1;
            },
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    self.state.font = Some(String::from_utf8_lossy(name).into_owned());
                }
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            },
            "Tc" if nums.len() == 1 => self.state.char_spacing = nums[0],
            "Tw" if nums.len() == 1 => self.state.word_spacing = nums[0],
            "Tz" if nums.len() == 1 => self.state.horizontal_scaling = nums[0] / 100.0,
            "TL" if nums.len() == 1 => self.state.leading = nums[0],
            "Ts" if nums.len() == 1 => self.state.rise = nums[0],
            "Td" if nums.len() == 2 => self.move_line(nums[0], nums[1]),
            "TD" if nums.len() == 2 => {
                self.state.leading = -nums[1];
                self.move_line(nums[0], nums[1]);
            },
            "Tm" if nums.len() == 6 => {
                self.line_matrix = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                self.text_matrix = self.line_matrix;
            },
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(string @ Object::String(..)) = op.operands.first() {
                    self.show(index, "Tj", std::slice::from_ref(string));
                }
            },
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    self.show(index, "TJ", items);
                }
            },
            "'" => {
                self.next_line();
                if let Some(string @ Object::String(..)) = op.operands.first() {
                    self.show(index, "'", std::slice::from_ref(string));
                }
            },
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line();
                if let Some(string @ Object::String(..)) = op.operands.get(2) {
                    self.show(index, "\"", std::slice::from_ref(string));
                }
            },
            _ => {},
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, index: usize, operator: &str, items: &[Object]) {
        let fonts = self.fonts;
        let key = self.state.font.clone().unwrap_or_default();
        let unknown;
        let font = match fonts.get(&key) {
            Some(font) => font,
            None => {
                unknown = PageFont::unknown(&key);
                &unknown
            },
        };
        let size = self.state.font_size;
        let h_scale = self.state.horizontal_scaling;
        let to_user = self.text_matrix.multiply(&self.state.ctm);
        let origin = to_user.transform_point(0.0, self.state.rise);
        let rendered_size = size * to_user.vertical_scale();
        let rotation = to_user.rotation_degrees();

        let mut text = String::new();
        let mut total = 0.0f32;
        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for glyph in font.decode(bytes) {
                        let mut tx = glyph.width / 1000.0 * size + self.state.char_spacing;
                        if glyph.is_space {
                            tx += self.state.word_spacing;
                        }
                        total += tx * h_scale;
                        text.push_str(&glyph.text);
                    }
                },
                other => {
                    if let Some(adjust) = number(other) {
                        total -= adjust / 1000.0 * size * h_scale;
                        if adjust < TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                            text.push(' ');
                        }
                    }
                },
            }
        }

        self.text_matrix = Matrix::translation(total, 0.0).multiply(&self.text_matrix);
        let end = self.text_matrix.multiply(&self.state.ctm).transform_point(0.0, self.state.rise);
        let advance = ((end.x - origin.x).powi(2) + (end.y - origin.y).powi(2)).sqrt();
        let unit = size * h_scale;
        let blank_kern = if unit.abs() > f32::EPSILON {
            Some(-total * 1000.0 / unit)
        } else {
            None
        };

        self.shown.push(ShownText {
            op_index: index,
            operator: operator.to_string(),
            text,
            origin,
            advance,
            font_size: rendered_size,
            rotation,
            font_resource: key,
            font_name: font.base_font.clone(),
            color: self.state.fill,
            text_object: self.text_object,
            blank_kern,
        });
    }
}

/// Operators that replace `op` with an invisible one moving the text
/// position by the same amount.
pub fn blank_operation(op: &Operation, blank_kern: Option<f32>) -> Vec<Operation> {
    let kern = || {
        blank_kern
            .map(|k| Operation::new("TJ", vec![Object::Array(vec![Object::Real(k)])]))
            .into_iter()
    };
    match op.operator.as_str() {
        "'" => std::iter::once(Operation::new("T*", vec![])).chain(kern()).collect(),
        "\"" => {
            let mut ops = Vec::new();
            if let (Some(aw), Some(ac)) = (op.operands.first(), op.operands.get(1)) {
                ops.push(Operation::new("Tw", vec![aw.clone()]));
                ops.push(Operation::new("Tc", vec![ac.clone()]));
            }
            ops.push(Operation::new("T*", vec![]));
            ops.extend(kern());
            ops
        },
        _ => kern().collect(),
    }
}

fn same_line(run: &TextRun, last: &ShownText, next: &ShownText) -> bool {
    if next.text_object != last.text_object
        || next.font_resource != last.font_resource
        || (next.font_size - last.font_size).abs() > 0.01
        || (next.rotation - last.rotation).abs() > 0.5
    {
        return false;
    }
    let (sin, cos) = run.rotation.to_radians().sin_cos();
    let dx = next.origin.x - run.x;
    let dy = next.origin.y - run.y;
    let perpendicular = -dx * sin + dy * cos;
    perpendicular.abs() < 0.1 * run.font_size.max(1.0)
}

/// Append `piece` to `run` unless the gap from `prev` is too wide.
fn extend_run(run: &mut TextRun, prev: &ShownText, piece: &ShownText) -> bool {
    let end = prev.end();
    let (sin, cos) = run.rotation.to_radians().sin_cos();
    let gap = (piece.origin.x - end.x) * cos + (piece.origin.y - end.y) * sin;
    if gap > 2.0 * run.font_size || gap < -0.5 * run.font_size {
        return false;
    }
    if gap > 0.25 * run.font_size && !run.content.ends_with(' ') && !piece.text.starts_with(' ') {
        run.content.push(' ');
    }
    run.content.push_str(&piece.text);
    let piece_end = piece.end();
    run.width = (piece_end.x - run.x) * cos + (piece_end.y - run.y) * sin;
    true
}

/// Group shown text into runs.
///
/// Pieces of one text object that continue the same baseline with the
/// same font and size form one run; a visible gap between them becomes a
/// space and a gap wider than two ems starts a new run.
pub fn group_runs(page: usize, shown: &[ShownText]) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    let mut last: Option<&ShownText> = None;

    for piece in shown.iter().filter(|piece| !piece.text.is_empty()) {
        let continues = match (runs.last(), last) {
            (Some(run), Some(prev)) => same_line(run, prev, piece),
            _ => false,
        };
        let merged = match (runs.last_mut(), last) {
            (Some(run), Some(prev)) if continues => extend_run(run, prev, piece),
            _ => false,
        };
        if !merged {
            runs.push(
                TextRun::new(
                    page,
                    piece.origin.x,
                    piece.origin.y,
                    piece.advance,
                    piece.font_size,
                    piece.text.clone(),
                    piece.font_name.clone(),
                )
                .with_color(piece.color)
                .with_rotation(piece.rotation)
                .with_font_resource(piece.font_resource.clone()),
            );
        }
        last = Some(piece);
    }

    runs.retain(|run| !run.content.trim().is_empty());
    for run in &mut runs {
        run.id = compute_run_id(page, &run.content, run.x, run.y, run.font_size);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Content;
    use lopdf::{dictionary, Document, StringFormat};

    fn helvetica() -> HashMap<String, PageFont> {
        let doc = Document::with_version("1.5");
        let font = PageFont::load(
            &doc,
            "F1",
            &Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            }),
        )
        .unwrap();
        HashMap::from([("F1".to_string(), font)])
    }

    fn ops(source: &str) -> Vec<Operation> {
        Content::decode(source.as_bytes()).unwrap().operations
    }

    #[test]
    fn test_tj_position_and_advance() {
        let shown = interpret_page(&ops("BT /F1 10 Tf 72 700 Td (Hello) Tj ET"), &helvetica());
        assert_eq!(shown.len(), 1);
        let piece = &shown[0];
        assert_eq!(piece.text, "Hello");
        assert_eq!((piece.origin.x, piece.origin.y), (72.0, 700.0));
        // H 722 + e 556 + l 222 + l 222 + o 556 = 2278
        assert!((piece.advance - 22.78).abs() < 1e-3);
        assert_eq!(piece.font_size, 10.0);
        assert_eq!(piece.font_name, "Helvetica");
        assert!((piece.blank_kern.unwrap() + 2278.0).abs() < 0.1);
    }

    #[test]
    fn test_ctm_scales_size_and_position() {
        let shown = interpret_page(
            &ops("q 2 0 0 2 10 20 cm 1 0 0 rg BT /F1 6 Tf 5 5 Td (A) Tj ET Q"),
            &helvetica(),
        );
        let piece = &shown[0];
        assert_eq!((piece.origin.x, piece.origin.y), (20.0, 30.0));
        assert_eq!(piece.font_size, 12.0);
        assert_eq!(piece.color, Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_rotated_text_matrix() {
        let shown = interpret_page(&ops("BT /F1 10 Tf 0 1 -1 0 100 100 Tm (A) Tj ET"), &helvetica());
        assert!((shown[0].rotation - 90.0).abs() < 1e-3);
        let end = shown[0].end();
        assert!((end.x - 100.0).abs() < 1e-3);
        assert!((end.y - 106.67).abs() < 1e-2);
    }

    #[test]
    fn test_tj_kerning_inserts_space() {
        let shown = interpret_page(&ops("BT /F1 10 Tf 0 0 Td [(LUIZ) -300 (EDUARDO) 20 (X)] TJ ET"), &helvetica());
        assert_eq!(shown[0].text, "LUIZ EDUARDOX");
    }

    #[test]
    fn test_quote_operators_move_to_next_line() {
        let shown = interpret_page(&ops("BT /F1 10 Tf 12 TL 0 100 Td (a) Tj (b) ' 1 0 (c) \" ET"), &helvetica());
        assert_eq!(shown.len(), 3);
        assert_eq!(shown[1].origin.y, 88.0);
        assert_eq!(shown[2].origin.y, 76.0);
        assert_eq!(shown[2].operator, "\"");
    }

    #[test]
    fn test_group_runs_merges_pieces_of_one_line() {
        let shown = interpret_page(
            &ops("BT /F1 10 Tf 72 700 Td (LUIZ) Tj 30 0 Td (EDUARDO) Tj ET BT /F1 10 Tf 72 600 Td (Other) Tj ET"),
            &helvetica(),
        );
        let runs = group_runs(0, &shown);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].content, "LUIZ EDUARDO");
        assert_eq!(runs[0].font_resource, "F1");
        assert!(runs[0].width > 30.0);
        assert_eq!(runs[1].content, "Other");
        assert_eq!(runs[1].id, compute_run_id(0, "Other", 72.0, 600.0, 10.0));
    }

    #[test]
    fn test_group_runs_splits_wide_gaps() {
        let shown = interpret_page(&ops("BT /F1 10 Tf 0 0 Td (Left) Tj 200 0 Td (Right) Tj ET"), &helvetica());
        let runs = group_runs(0, &shown);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_blank_operation_preserves_advance() {
        let op = Operation::new(
            "\"",
            vec![Object::Integer(1), Object::Integer(0), Object::String(b"x".to_vec(), StringFormat::Literal)],
        );
        let blank = blank_operation(&op, Some(-500.0));
        let names: Vec<&str> = blank.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(names, vec!["Tw", "Tc", "T*", "TJ"]);

        let tj = Operation::new("Tj", vec![Object::String(b"x".to_vec(), StringFormat::Literal)]);
        assert!(blank_operation(&tj, None).is_empty());
    }
}
