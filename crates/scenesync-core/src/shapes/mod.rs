//! Shape records stored in a canvas document.

mod circle;
mod freehand;
mod rectangle;
mod text;

pub use circle::Circle;
pub use freehand::Freehand;
pub use rectangle::Rectangle;
pub use text::{FontWeight, Text};

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

fn default_stroke_width() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

/// Visual attributes shared by every shape.
///
/// Colors are kept as the CSS strings the editor produced them with
/// (`#ff6b6b`, `transparent`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeStyle {
    /// Fill color (None = no fill).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    /// Stroke color (None = no outline).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    /// Stroke width in pixels.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl ShapeStyle {
    /// Style with a fill and an outline.
    pub fn filled(fill: &str, stroke: &str, stroke_width: f64) -> Self {
        Self {
            fill: Some(fill.to_string()),
            stroke: Some(stroke.to_string()),
            stroke_width,
            opacity: 1.0,
        }
    }

    /// Style for an unfilled stroke.
    pub fn stroked(stroke: &str, stroke_width: f64) -> Self {
        Self {
            fill: None,
            stroke: Some(stroke.to_string()),
            stroke_width,
            opacity: 1.0,
        }
    }

    /// Whether the fill paints anything hit-testable.
    pub fn has_fill(&self) -> bool {
        self.fill
            .as_deref()
            .map(|f| !f.is_empty() && f != "transparent")
            .unwrap_or(false)
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: Some("#000000".to_string()),
            stroke_width: default_stroke_width(),
            opacity: default_opacity(),
        }
    }
}

/// Parse a `#rgb`, `#rrggbb` or `#rrggbbaa` color into RGBA8.
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let mut out = [0, 0, 0, 255];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([channel(0)?, channel(2)?, channel(4)?, 255]),
        8 => Some([channel(0)?, channel(2)?, channel(4)?, channel(6)?]),
        _ => None,
    }
}

/// Whether a color string is accepted by the properties panel.
pub fn is_valid_color(s: &str) -> bool {
    s == "transparent" || parse_hex_color(s).is_some()
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => (point - *only).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Common behavior of all shapes.
pub trait ShapeTrait {
    /// Axis-aligned bounding box in canvas coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point (in canvas coordinates) hits this shape.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Get the style.
    fn style(&self) -> &ShapeStyle;

    /// Get mutable style.
    fn style_mut(&mut self) -> &mut ShapeStyle;

    /// Move the shape by a delta.
    fn translate(&mut self, delta: Vec2);
}

/// A persisted shape record, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    #[serde(rename = "rect")]
    Rectangle(Rectangle),
    #[serde(rename = "circle")]
    Circle(Circle),
    #[serde(rename = "i-text")]
    Text(Text),
    #[serde(rename = "path")]
    Freehand(Freehand),
}

impl Shape {
    /// The type discriminator as written in documents.
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Rectangle(_) => "rect",
            Shape::Circle(_) => "circle",
            Shape::Text(_) => "i-text",
            Shape::Freehand(_) => "path",
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Rectangle(s) => s.bounds(),
            Shape::Circle(s) => s.bounds(),
            Shape::Text(s) => s.bounds(),
            Shape::Freehand(s) => s.bounds(),
        }
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match self {
            Shape::Rectangle(s) => s.hit_test(point, tolerance),
            Shape::Circle(s) => s.hit_test(point, tolerance),
            Shape::Text(s) => s.hit_test(point, tolerance),
            Shape::Freehand(s) => s.hit_test(point, tolerance),
        }
    }

    pub fn style(&self) -> &ShapeStyle {
        match self {
            Shape::Rectangle(s) => s.style(),
            Shape::Circle(s) => s.style(),
            Shape::Text(s) => s.style(),
            Shape::Freehand(s) => s.style(),
        }
    }

    pub fn style_mut(&mut self) -> &mut ShapeStyle {
        match self {
            Shape::Rectangle(s) => s.style_mut(),
            Shape::Circle(s) => s.style_mut(),
            Shape::Text(s) => s.style_mut(),
            Shape::Freehand(s) => s.style_mut(),
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Shape::Rectangle(s) => s.translate(delta),
            Shape::Circle(s) => s.translate(delta),
            Shape::Text(s) => s.translate(delta),
            Shape::Freehand(s) => s.translate(delta),
        }
    }

    /// Get the text if this shape is a text box.
    pub fn as_text_mut(&mut self) -> Option<&mut Text> {
        match self {
            Shape::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Whether the properties panel offers a fill control (paths have none).
    pub fn supports_fill(&self) -> bool {
        !matches!(self, Shape::Freehand(_))
    }
}
