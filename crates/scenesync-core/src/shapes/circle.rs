//! Circle shape.

use super::{ShapeStyle, ShapeTrait};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A circle positioned by the top-left corner of its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    /// Left edge of the bounding box.
    pub left: f64,
    /// Top edge of the bounding box.
    pub top: f64,
    /// Radius.
    pub radius: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub angle: f64,
    /// Style properties.
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Circle {
    /// Create a new circle.
    pub fn new(left: f64, top: f64, radius: f64) -> Self {
        Self {
            left,
            top,
            radius,
            angle: 0.0,
            style: ShapeStyle::default(),
        }
    }

    /// Replace the style.
    pub fn with_style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new(self.left + self.radius, self.top + self.radius)
    }
}

impl ShapeTrait for Circle {
    fn bounds(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.radius * 2.0,
            self.top + self.radius * 2.0,
        )
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let half_sw = self.style.stroke_width / 2.0;
        let dist = (point - self.center()).hypot();
        if dist > self.radius + tolerance + half_sw {
            return false;
        }
        if self.style.has_fill() {
            return true;
        }
        // Outline only: reject points well inside the ring
        let inner = (self.radius - tolerance - half_sw).max(0.0);
        inner < f64::EPSILON || dist >= inner
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
    fn test_circle_bounds() {
        let circle = Circle::new(100.0, 100.0, 50.0);
        let b = circle.bounds();
        assert_eq!((b.x0, b.y0, b.x1, b.y1), (100.0, 100.0, 200.0, 200.0));
        assert_eq!(circle.center(), Point::new(150.0, 150.0));
    }

    #[test]
    fn test_circle_hit_test() {
        let filled = Circle::new(0.0, 0.0, 50.0)
            .with_style(ShapeStyle::filled("#4ecdc4", "#00b894", 2.0));
        assert!(filled.hit_test(Point::new(50.0, 50.0), 0.0));
        assert!(!filled.hit_test(Point::new(0.0, 0.0), 0.0));

        let ring = Circle::new(0.0, 0.0, 50.0);
        assert!(!ring.hit_test(Point::new(50.0, 50.0), 1.0));
        assert!(ring.hit_test(Point::new(100.0, 50.0), 1.0));
    }
}
