//! Freehand pen stroke.

use super::{ShapeStyle, ShapeTrait, point_to_polyline_dist};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A freehand stroke (series of points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freehand {
    /// Points along the stroke.
    pub points: Vec<Point>,
    /// Style properties.
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Freehand {
    /// Create a new empty stroke with the given brush.
    pub fn new(style: ShapeStyle) -> Self {
        Self {
            points: Vec::new(),
            style,
        }
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Point>, style: ShapeStyle) -> Self {
        Self { points, style }
    }

    /// Add a point to the stroke.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Simplify the stroke by removing redundant points.
    pub fn simplify(&mut self, tolerance: f64) {
        if self.points.len() < 3 {
            return;
        }
        self.points = rdp_simplify(&self.points, tolerance);
    }
}

/// Ramer-Douglas-Peucker line simplification.
fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;
    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = rdp_simplify(&points[..=max_index], tolerance);
        let right = rdp_simplify(&points[max_index..], tolerance);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

fn perpendicular_distance(point: Point, line_start: Point, line_end: Point) -> f64 {
    let d = line_end - line_start;
    let len_sq = d.hypot2();
    if len_sq < f64::EPSILON {
        return (point - line_start).hypot();
    }
    (point - line_start).cross(d).abs() / len_sq.sqrt()
}

impl ShapeTrait for Freehand {
    fn bounds(&self) -> Rect {
        let mut iter = self.points.iter();
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        let rect = iter.fold(Rect::from_points(*first, *first), |acc, p| {
            acc.union_pt(*p)
        });
        let pad = self.style.stroke_width / 2.0;
        rect.inflate(pad, pad)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, &self.points) <= tolerance + self.style.stroke_width / 2.0
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn translate(&mut self, delta: Vec2) {
        for p in &mut self.points {
            *p += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_collinear() {
        let mut stroke = Freehand::from_points(
            (0..10).map(|i| Point::new(i as f64, 0.0)).collect(),
            ShapeStyle::stroked("#2d3436", 3.0),
        );
        stroke.simplify(0.5);
        assert_eq!(stroke.points, vec![Point::new(0.0, 0.0), Point::new(9.0, 0.0)]);
    }

    #[test]
    fn test_simplify_keeps_corner() {
        let mut stroke = Freehand::from_points(
            vec![
                Point::new(0.0, 0.0),
                Point::new(5.0, 0.1),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ],
            ShapeStyle::stroked("#2d3436", 3.0),
        );
        stroke.simplify(1.0);
        assert_eq!(stroke.len(), 3);
        assert!(stroke.points.contains(&Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_hit_test_and_bounds() {
        let stroke = Freehand::from_points(
            vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
            ShapeStyle::stroked("#2d3436", 4.0),
        );
        assert!(stroke.hit_test(Point::new(50.0, 3.0), 1.0));
        assert!(!stroke.hit_test(Point::new(50.0, 10.0), 1.0));
        let b = stroke.bounds();
        assert_eq!((b.x0, b.y0, b.x1, b.y1), (-2.0, -2.0, 102.0, 2.0));
    }

    #[test]
    fn test_empty_bounds() {
        let stroke = Freehand::new(ShapeStyle::default());
        assert_eq!(stroke.bounds(), Rect::ZERO);
        assert!(stroke.is_empty());
    }
}
