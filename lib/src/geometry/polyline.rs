//! Open polylines, used as the point storage of extrusion paths.

use super::Point;
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// An open sequence of points.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
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
    pub fn points_mut(&mut self) -> &mut Vec<Point> {
        &mut self.points
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
    pub fn first_point(&self) -> Option<Point> {
        self.points.first().copied()
    }

    #[inline]
    pub fn last_point(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Length in scaled units.
    pub fn length(&self) -> CoordF {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Index of the segment closest to `p` and the projection of `p` onto it.
    /// Returns `None` for polylines with fewer than two points.
    pub fn closest_segment(&self, p: &Point) -> Option<(usize, Point)> {
        let mut best: Option<(usize, Point, i128)> = None;
        for (i, w) in self.points.windows(2).enumerate() {
            let proj = p.project_onto_segment(w[0], w[1]);
            let dist = p.distance_squared(&proj);
            if best.map_or(true, |(_, _, d)| dist < d) {
                best = Some((i, proj, dist));
            }
        }
        best.map(|(i, proj, _)| (i, proj))
    }
}

impl std::fmt::Debug for Polyline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Polyline({} points)", self.points.len())
    }
}

impl Deref for Polyline {
    type Target = [Point];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl From<Vec<Point>> for Polyline {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_segment() {
        let polyline = Polyline::from_points(vec![
            Point::new_scale(0.0, 0.0),
            Point::new_scale(10.0, 0.0),
            Point::new_scale(10.0, 10.0),
        ]);

        let (idx, proj) = polyline
            .closest_segment(&Point::new_scale(12.0, 4.0))
            .unwrap();
        assert_eq!(idx, 1);
        assert_eq!(proj, Point::new_scale(10.0, 4.0));

        assert!(Polyline::from_points(vec![Point::zero()])
            .closest_segment(&Point::zero())
            .is_none());
    }
}
