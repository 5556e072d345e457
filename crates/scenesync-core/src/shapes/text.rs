//! Editable text shape.

use super::{ShapeStyle, ShapeTrait};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Font weight options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

fn default_font_family() -> String {
    Text::DEFAULT_FONT_FAMILY.to_string()
}

fn default_font_size() -> f64 {
    Text::DEFAULT_FONT_SIZE
}

/// A single- or multi-line text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    /// Left edge of the text box.
    pub left: f64,
    /// Top edge of the text box.
    pub top: f64,
    /// The text content.
    pub text: String,
    /// Font size in pixels.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// CSS font family.
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Font weight.
    #[serde(default)]
    pub font_weight: FontWeight,
    /// Rotation in degrees.
    #[serde(default)]
    pub angle: f64,
    /// Style properties.
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Text {
    /// Default font size.
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;
    /// Default font family.
    pub const DEFAULT_FONT_FAMILY: &'static str = "Arial";
    /// Line height as a multiple of the font size.
    pub const LINE_HEIGHT: f64 = 1.16;
    /// Smallest font size the properties panel allows.
    pub const MIN_FONT_SIZE: f64 = 10.0;
    /// Largest font size the properties panel allows.
    pub const MAX_FONT_SIZE: f64 = 72.0;

    /// Create a new text box.
    pub fn new(left: f64, top: f64, text: impl Into<String>) -> Self {
        Self {
            left,
            top,
            text: text.into(),
            font_size: Self::DEFAULT_FONT_SIZE,
            font_family: default_font_family(),
            font_weight: FontWeight::default(),
            angle: 0.0,
            style: ShapeStyle {
                fill: Some("#000000".to_string()),
                stroke: None,
                ..ShapeStyle::default()
            },
        }
    }

    /// Replace the style.
    pub fn with_style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    /// Approximate layout size without a font engine.
    pub fn approximate_size(&self) -> (f64, f64) {
        let lines: Vec<&str> = self.text.split('\n').collect();
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = (longest as f64 * self.font_size * 0.6).max(self.font_size * 0.5);
        let height = lines.len() as f64 * self.font_size * Self::LINE_HEIGHT;
        (width, height)
    }
}

impl ShapeTrait for Text {
    fn bounds(&self) -> Rect {
        let (w, h) = self.approximate_size();
        Rect::new(self.left, self.top, self.left + w, self.top + h)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn translate(&mut self, delta: Vec2) {
        self.left += delta.x;
        self.top += delta.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_defaults() {
        let text = Text::new(10.0, 10.0, "Hello");
        assert_eq!(text.font_size, 20.0);
        assert_eq!(text.font_family, "Arial");
        assert_eq!(text.font_weight, FontWeight::Normal);
    }

    #[test]
    fn test_multiline_bounds() {
        let text = Text::new(0.0, 0.0, "ab\nabcd");
        let (w, h) = text.approximate_size();
        assert!((w - 4.0 * 20.0 * 0.6).abs() < 1e-9);
        assert!((h - 2.0 * 20.0 * Text::LINE_HEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_font_fields_serialize_camel_case() {
        let text = Text::new(0.0, 0.0, "x");
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["fontSize"], 20.0);
        assert_eq!(json["fontFamily"], "Arial");
        assert_eq!(json["fontWeight"], "normal");
    }
}
