//! Text runs extracted from page content.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Matrix, Rect};

/// Fraction of the font size that lies below the baseline.
const DESCENT_RATIO: f32 = 0.2;

/// An RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red component
    pub r: f32,
    /// Green component
    pub g: f32,
    /// Blue component
    pub b: f32,
}

impl Color {
    /// Create a colour from components.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Black.
    pub fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// White.
    pub fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Grey level, as set by the `g` operator.
    pub fn gray(level: f32) -> Self {
        Self::new(level, level, level)
    }

    /// Convert CMYK (the `k` operator) to RGB.
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self::new((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
    }

    /// Parse a `#rrggbb` (or `rrggbb`) hex string.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_fontkeeper::elements::Color;
    ///
    /// let red = Color::from_hex("#ff0000").unwrap();
    /// assert_eq!(red, Color::new(1.0, 0.0, 0.0));
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidArgument(format!("Invalid colour '{}', expected #rrggbb", hex)));
        }
        let channel = |range: std::ops::Range<usize>| -> Result<f32> {
            u8::from_str_radix(&digits[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|e| Error::InvalidArgument(format!("Invalid colour '{}': {}", hex, e)))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Render as `#rrggbb`.
    pub fn to_hex(&self) -> String {
        let to_byte = |v: f32| (v * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", to_byte(self.r), to_byte(self.g), to_byte(self.b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// A run of text shown with one font, size and baseline.
///
/// Runs are read-only snapshots of the page content. Editing a run produces
/// a new page state from which new runs are extracted; nothing here is ever
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Stable identifier derived from page, content, position and size
    pub id: String,
    /// Page index (0-based)
    pub page: usize,
    /// Baseline origin X in user space
    pub x: f32,
    /// Baseline origin Y in user space
    pub y: f32,
    /// Advance width of the run
    pub width: f32,
    /// Height of the run (rendered font size)
    pub height: f32,
    /// Decoded Unicode content
    pub content: String,
    /// Font name, subset prefix removed
    pub font_name: String,
    /// Rendered font size in points
    pub font_size: f32,
    /// Fill colour
    pub color: Color,
    /// Baseline rotation in degrees, counter-clockwise
    pub rotation: f32,
    /// Name of the font in the page's `/Resources /Font` dictionary
    pub font_resource: String,
}

impl TextRun {
    /// Build a run and derive its id.
    pub fn new(
        page: usize,
        x: f32,
        y: f32,
        width: f32,
        font_size: f32,
        content: impl Into<String>,
        font_name: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let id = compute_run_id(page, &content, x, y, font_size);
        Self {
            id,
            page,
            x,
            y,
            width,
            height: font_size,
            content,
            font_name: font_name.into(),
            font_size,
            color: Color::black(),
            rotation: 0.0,
            font_resource: String::new(),
        }
    }

    /// Set the fill colour.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Set the rotation.
    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the page resource name of the font.
    pub fn with_font_resource(mut self, name: impl Into<String>) -> Self {
        self.font_resource = name.into();
        self
    }

    /// Number of characters in the run.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Axis-aligned box covering the glyphs, descenders included.
    pub fn bbox(&self) -> Rect {
        text_box(self.x, self.y, self.width, self.height, self.rotation)
    }
}

/// Axis-aligned box of text starting at baseline origin `(x, y)`.
///
/// `width` runs along the baseline, which is rotated by `rotation` degrees;
/// the box reaches `DESCENT_RATIO * height` below the baseline.
pub fn text_box(x: f32, y: f32, width: f32, height: f32, rotation: f32) -> Rect {
    let descent = height * DESCENT_RATIO;
    let place = Matrix::rotation(rotation).multiply(&Matrix::translation(x, y));
    let corners = [
        place.transform_point(0.0, -descent),
        place.transform_point(width, -descent),
        place.transform_point(0.0, height - descent),
        place.transform_point(width, height - descent),
    ];
    let mut rect = Rect::from_points(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
    for corner in &corners[1..] {
        rect = rect.union(&Rect::from_points(corner.x, corner.y, corner.x, corner.y));
    }
    rect
}

/// Derive the stable id of a run.
///
/// Equal inputs always give the same id, so a run re-extracted from an
/// unchanged page keeps its identifier.
pub fn compute_run_id(page: usize, content: &str, x: f32, y: f32, size: f32) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{}|{}|{:.2}|{:.2}|{:.2}", page, content, x, y, size).as_bytes());
    let digest = hasher.finalize();
    digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_roundtrip() {
        let color = Color::from_hex("#336699").unwrap();
        assert_eq!(color.to_hex(), "#336699");
        assert_eq!(Color::from_hex("ffffff").unwrap(), Color::white());
    }

    #[test]
    fn test_color_hex_rejects_garbage() {
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn test_color_from_cmyk() {
        assert_eq!(Color::from_cmyk(0.0, 0.0, 0.0, 1.0), Color::black());
        assert_eq!(Color::from_cmyk(0.0, 0.0, 0.0, 0.0), Color::white());
    }

    #[test]
    fn test_run_id_is_stable() {
        let a = TextRun::new(0, 72.0, 700.0, 100.0, 12.0, "Hello", "ArialMT");
        let b = TextRun::new(0, 72.0, 700.0, 100.0, 12.0, "Hello", "ArialMT");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 12);

        let moved = TextRun::new(0, 73.0, 700.0, 100.0, 12.0, "Hello", "ArialMT");
        assert_ne!(a.id, moved.id);
        let other_page = TextRun::new(1, 72.0, 700.0, 100.0, 12.0, "Hello", "ArialMT");
        assert_ne!(a.id, other_page.id);
    }

    #[test]
    fn test_bbox_includes_descent() {
        let run = TextRun::new(0, 100.0, 500.0, 50.0, 10.0, "Text", "Helvetica");
        let bbox = run.bbox();
        assert!((bbox.x - 100.0).abs() < 1e-4);
        assert!((bbox.y - 498.0).abs() < 1e-4);
        assert!((bbox.width - 50.0).abs() < 1e-4);
        assert!((bbox.height - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_bbox_rotated_run() {
        let run = TextRun::new(0, 100.0, 100.0, 50.0, 10.0, "Up", "Helvetica").with_rotation(90.0);
        let bbox = run.bbox();
        // Rotated runs grow upwards from the origin
        assert!((bbox.top() - 150.0).abs() < 1e-3);
        assert!(bbox.width < 11.0);
    }
}
