//! Rectangle shape.

use super::{ShapeStyle, ShapeTrait};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle positioned by its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rectangle {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
    /// Rotation in degrees around the top-left corner.
    #[serde(default)]
    pub angle: f64,
    /// Style properties.
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Rectangle {
    /// Create a new rectangle.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
            angle: 0.0,
            style: ShapeStyle::default(),
        }
    }

    /// Replace the style.
    pub fn with_style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    /// Create a rectangle from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let rect = Rect::from_points(p1, p2);
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }

    /// Get the rectangle as a kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }
}

impl ShapeTrait for Rectangle {
    fn bounds(&self) -> Rect {
        // Rotation is ignored for bounds and hit-testing.
        self.as_rect()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let rect = self.as_rect();
        if self.style.has_fill() {
            rect.inflate(tolerance, tolerance).contains(point)
        } else {
            let band = tolerance + self.style.stroke_width / 2.0;
            let outer = rect.inflate(band, band);
            let inner = rect.inflate(-band, -band);
            outer.contains(point) && !inner.contains(point)
        }
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
