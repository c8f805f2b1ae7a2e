//! Polygon type for closed contours.
//!
//! Perimeter loops handed to the seam placer are polygons in scaled integer
//! coordinates. The last point connects back to the first.

use super::{Point, Polyline};
use crate::{unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, Index};

/// A closed polygon defined by a sequence of points.
///
/// Points are ordered counter-clockwise for outer contours (positive area)
/// and clockwise for holes (negative area).
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Signed area (shoelace), in scaled units squared.
    /// Positive for counter-clockwise, negative for clockwise.
    pub fn signed_area(&self) -> CoordF {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut sum: i128 = 0;
        for i in 0..self.points.len() {
            let j = (i + 1) % self.points.len();
            sum += self.points[i].x as i128 * self.points[j].y as i128;
            sum -= self.points[j].x as i128 * self.points[i].y as i128;
        }

        sum as CoordF / 2.0
    }

    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    #[inline]
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Ensure the polygon is counter-clockwise.
    /// Returns true if the points had to be reversed.
    pub fn make_counter_clockwise(&mut self) -> bool {
        if self.is_clockwise() {
            self.reverse();
            true
        } else {
            false
        }
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Total edge length in mm, including the closing edge.
    pub fn length(&self) -> CoordF {
        if self.points.len() < 2 {
            return 0.0;
        }
        let n = self.points.len();
        (0..n)
            .map(|i| unscale(1) * self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Closest point on the boundary to `p`.
    pub fn closest_point(&self, p: &Point) -> Point {
        match self.points.len() {
            0 => return Point::zero(),
            1 => return self.points[0],
            _ => {}
        }

        let n = self.points.len();
        let mut closest = self.points[0];
        let mut min_dist = i128::MAX;
        for i in 0..n {
            let proj = p.project_onto_segment(self.points[i], self.points[(i + 1) % n]);
            let dist = p.distance_squared(&proj);
            if dist < min_dist {
                min_dist = dist;
                closest = proj;
            }
        }
        closest
    }

    /// Distance from a point to the polygon boundary, in scaled units.
    pub fn distance_to_point(&self, p: &Point) -> CoordF {
        p.distance(&self.closest_point(p))
    }

    pub fn translate(&mut self, v: Point) {
        for p in &mut self.points {
            *p = *p + v;
        }
    }

    /// Open the polygon at its first point. The first point is repeated at the end.
    pub fn to_closed_polyline(&self) -> Polyline {
        let mut points = self.points.clone();
        if let Some(&first) = self.points.first() {
            points.push(first);
        }
        Polyline::from_points(points)
    }

    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::from_points(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    /// Axis-aligned square centered at a point.
    pub fn square(center: Point, half_size: Coord) -> Self {
        Self::rectangle(
            Point::new(center.x - half_size, center.y - half_size),
            Point::new(center.x + half_size, center.y + half_size),
        )
    }

    /// Regular polygon with n sides, centered at the origin.
    pub fn regular(n: usize, radius: Coord) -> Self {
        if n < 3 {
            return Self::new();
        }

        let points = (0..n)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as CoordF / n as CoordF;
                Point::new(
                    (radius as CoordF * angle.cos()).round() as Coord,
                    (radius as CoordF * angle.sin()).round() as Coord,
                )
            })
            .collect();

        Self::from_points(points)
    }

    pub fn circle(center: Point, radius: Coord, segments: usize) -> Self {
        let mut poly = Self::regular(segments, radius);
        poly.translate(center);
        poly
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polygon({} points)", self.points.len())
    }
}

impl Deref for Polygon {
    type Target = [Point];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl Index<usize> for Polygon {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a Polygon {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

/// Type alias for a collection of polygons.
pub type Polygons = Vec<Polygon>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn make_square(size: f64) -> Polygon {
        Polygon::rectangle(Point::new(0, 0), Point::new(scale(size), scale(size)))
    }

    #[test]
    fn test_polygon_orientation() {
        let mut square = make_square(10.0);
        assert!(square.is_counter_clockwise());
        assert!(!square.make_counter_clockwise());

        square.reverse();
        assert!(square.is_clockwise());
        assert!(square.make_counter_clockwise());
        assert!(square.is_counter_clockwise());
    }

    #[test]
    fn test_polygon_length_mm() {
        let square = make_square(10.0);
        assert!((square.length() - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_closest_point() {
        let square = make_square(10.0);
        let p = Point::new_scale(5.0, -3.0);
        assert_eq!(square.closest_point(&p), Point::new_scale(5.0, 0.0));
        assert!((square.distance_to_point(&p) - scale(3.0) as f64).abs() < 1.0);
    }

    #[test]
    fn test_closed_polyline_repeats_first_point() {
        let square = make_square(1.0);
        let polyline = square.to_closed_polyline();
        assert_eq!(polyline.len(), 5);
        assert_eq!(polyline.first_point(), polyline.last_point());
    }

    #[test]
    fn test_polygon_regular() {
        let hexagon = Polygon::regular(6, scale(2.0));
        assert_eq!(hexagon.len(), 6);
        assert!(hexagon.is_counter_clockwise());
        assert!(Polygon::regular(2, scale(2.0)).is_empty());
    }
}
