//! Extrusion loops as handed to the seam placer.
//!
//! A loop is a closed chain of [`ExtrusionPath`]s: every path ends where the
//! next one starts and the last path ends on the first point of the first one.
//! Placing a seam means rotating that chain so it starts at the chosen point.

use crate::geometry::{Point, Polygon, Polyline};
use crate::{Coord, CoordF};

/// Type of extrusion for a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtrusionRole {
    /// External (outer) perimeter.
    #[default]
    ExternalPerimeter,
    /// Internal perimeter.
    Perimeter,
    /// External perimeter printed over air.
    OverhangPerimeter,
    /// Skirt/brim.
    Skirt,
}

impl ExtrusionRole {
    pub fn is_perimeter(&self) -> bool {
        matches!(
            self,
            ExtrusionRole::ExternalPerimeter
                | ExtrusionRole::Perimeter
                | ExtrusionRole::OverhangPerimeter
        )
    }

    pub fn is_external_perimeter(&self) -> bool {
        matches!(
            self,
            ExtrusionRole::ExternalPerimeter | ExtrusionRole::OverhangPerimeter
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtrusionRole::ExternalPerimeter => "external perimeter",
            ExtrusionRole::Perimeter => "perimeter",
            ExtrusionRole::OverhangPerimeter => "overhang perimeter",
            ExtrusionRole::Skirt => "skirt",
        }
    }
}

/// A single open extrusion path.
#[derive(Debug, Clone)]
pub struct ExtrusionPath {
    /// The path points (in scaled coordinates).
    pub polyline: Polyline,
    pub role: ExtrusionRole,
    /// Extrusion width (mm).
    pub width: CoordF,
    /// Layer height (mm).
    pub height: CoordF,
}

impl ExtrusionPath {
    pub fn new(polyline: Polyline, role: ExtrusionRole) -> Self {
        Self {
            polyline,
            role,
            width: 0.45,
            height: 0.2,
        }
    }

    pub fn with_width(mut self, width: CoordF) -> Self {
        self.width = width;
        self
    }

    pub fn with_height(mut self, height: CoordF) -> Self {
        self.height = height;
        self
    }

    pub fn first_point(&self) -> Option<Point> {
        self.polyline.first_point()
    }

    /// Same extrusion settings over other points.
    fn sub_path(&self, points: &[Point]) -> Self {
        Self {
            polyline: Polyline::from_points(points.to_vec()),
            role: self.role,
            width: self.width,
            height: self.height,
        }
    }
}

/// A closed extrusion loop.
#[derive(Debug, Clone)]
pub struct ExtrusionLoop {
    pub paths: Vec<ExtrusionPath>,
    role: ExtrusionRole,
}

impl ExtrusionLoop {
    pub fn new(paths: Vec<ExtrusionPath>, role: ExtrusionRole) -> Self {
        Self { paths, role }
    }

    /// A loop made of one path running around `polygon` and back to its start.
    pub fn from_polygon(polygon: &Polygon, role: ExtrusionRole) -> Self {
        let polyline = polygon.to_closed_polyline();
        Self::new(vec![ExtrusionPath::new(polyline, role)], role)
    }

    pub fn role(&self) -> ExtrusionRole {
        self.role
    }

    pub fn first_point(&self) -> Option<Point> {
        self.paths.first().and_then(|p| p.first_point())
    }

    pub fn is_empty(&self) -> bool {
        self.paths.iter().all(|p| p.polyline.is_empty())
    }

    /// Length in mm.
    pub fn length(&self) -> CoordF {
        self.paths
            .iter()
            .map(|p| crate::unscale(1) * p.polyline.length())
            .sum()
    }

    /// The loop as a polygon, without the closing duplicate points.
    pub fn polygon(&self) -> Polygon {
        let mut polygon = Polygon::new();
        for path in &self.paths {
            let points = path.polyline.points();
            if let Some((_, head)) = points.split_last() {
                for &p in head {
                    polygon.push(p);
                }
            }
        }
        polygon
    }

    /// Rotate the loop so it starts at the vertex coinciding with `point`
    /// within `tolerance`. Returns false if no vertex matches.
    pub fn split_at_vertex(&mut self, point: &Point, tolerance: Coord) -> bool {
        let found = self.paths.iter().enumerate().find_map(|(path_idx, path)| {
            path.polyline
                .points()
                .iter()
                .position(|p| p.coincides_with(point, tolerance))
                .map(|point_idx| (path_idx, point_idx))
        });

        let (path_idx, point_idx) = match found {
            Some(f) => f,
            None => return false,
        };

        let path_len = self.paths[path_idx].polyline.len();
        if point_idx == 0 {
            self.paths.rotate_left(path_idx);
        } else if point_idx + 1 == path_len {
            let next = (path_idx + 1) % self.paths.len();
            self.paths.rotate_left(next);
        } else {
            let path = self.paths.remove(path_idx);
            let points = path.polyline.points();
            let head = path.sub_path(&points[..=point_idx]);
            let tail = path.sub_path(&points[point_idx..]);

            let mut paths = Vec::with_capacity(self.paths.len() + 2);
            paths.push(tail);
            paths.extend(self.paths.drain(path_idx..));
            paths.append(&mut self.paths);
            paths.push(head);
            self.paths = paths;
        }
        true
    }

    /// Rotate the loop so it starts at the point of the loop closest to
    /// `point`, inserting that point if it is not a vertex yet.
    pub fn split_at(&mut self, point: &Point) {
        if self.split_at_vertex(point, 0) {
            return;
        }

        let closest = self
            .paths
            .iter()
            .enumerate()
            .filter_map(|(path_idx, path)| {
                path.polyline
                    .closest_segment(point)
                    .map(|(seg, proj)| (path_idx, seg, proj, point.distance_squared(&proj)))
            })
            .min_by_key(|&(_, _, _, d)| d);

        let (path_idx, seg, proj) = match closest {
            Some((path_idx, seg, proj, _)) => (path_idx, seg, proj),
            None => return,
        };

        let points = self.paths[path_idx].polyline.points_mut();
        if proj != points[seg] && proj != points[seg + 1] {
            points.insert(seg + 1, proj);
        }
        self.split_at_vertex(&proj, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn square_loop() -> ExtrusionLoop {
        let s = scale(10.0);
        let polygon = Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(s, 0),
            Point::new(s, s),
            Point::new(0, s),
        ]);
        ExtrusionLoop::from_polygon(&polygon, ExtrusionRole::ExternalPerimeter)
    }

    fn is_closed_chain(l: &ExtrusionLoop) -> bool {
        let n = l.paths.len();
        (0..n).all(|i| {
            l.paths[i].polyline.last_point() == l.paths[(i + 1) % n].polyline.first_point()
        })
    }

    #[test]
    fn test_from_polygon() {
        let l = square_loop();
        assert_eq!(l.paths.len(), 1);
        assert_eq!(l.paths[0].polyline.len(), 5);
        assert_eq!(l.polygon().len(), 4);
        assert!((l.length() - 40.0).abs() < 1e-9);
        assert!(l.role().is_external_perimeter());
    }

    #[test]
    fn test_split_at_vertex() {
        let mut l = square_loop();
        let target = Point::new(scale(10.0), scale(10.0));
        assert!(l.split_at_vertex(&target, 0));
        assert_eq!(l.first_point(), Some(target));
        assert!(is_closed_chain(&l));
        assert_eq!(l.polygon().len(), 4);
        assert!((l.length() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_at_vertex_tolerance() {
        let mut l = square_loop();
        let near = Point::new(scale(10.0) + 100, 50);
        assert!(!l.split_at_vertex(&near, 10));
        assert!(l.split_at_vertex(&near, 200));
        assert_eq!(l.first_point(), Some(Point::new(scale(10.0), 0)));
    }

    #[test]
    fn test_split_at_inserts_projection() {
        let mut l = square_loop();
        let off_edge = Point::new(scale(5.0), -scale(1.0));
        l.split_at(&off_edge);

        let expected = Point::new(scale(5.0), 0);
        assert_eq!(l.first_point(), Some(expected));
        assert_eq!(l.polygon().len(), 5);
        assert!(is_closed_chain(&l));
        assert!((l.length() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_multi_path_loop() {
        let s = scale(10.0);
        let a = ExtrusionPath::new(
            Polyline::from_points(vec![Point::new(0, 0), Point::new(s, 0), Point::new(s, s)]),
            ExtrusionRole::ExternalPerimeter,
        );
        let b = ExtrusionPath::new(
            Polyline::from_points(vec![Point::new(s, s), Point::new(0, s), Point::new(0, 0)]),
            ExtrusionRole::OverhangPerimeter,
        );
        let mut l = ExtrusionLoop::new(vec![a, b], ExtrusionRole::ExternalPerimeter);

        assert!(l.split_at_vertex(&Point::new(0, s), 0));
        assert_eq!(l.first_point(), Some(Point::new(0, s)));
        assert_eq!(l.paths.len(), 3);
        assert_eq!(l.paths[0].role, ExtrusionRole::OverhangPerimeter);
        assert!(is_closed_chain(&l));

        // end point of a path resolves to the start of the next one
        let mut l2 = l.clone();
        assert!(l2.split_at_vertex(&Point::new(s, s), 0));
        assert_eq!(l2.first_point(), Some(Point::new(s, s)));
        assert!(is_closed_chain(&l2));
    }

    #[test]
    fn test_split_empty_loop() {
        let mut l = ExtrusionLoop::new(Vec::new(), ExtrusionRole::Perimeter);
        assert!(l.is_empty());
        assert!(!l.split_at_vertex(&Point::zero(), 10));
        l.split_at(&Point::zero());
        assert_eq!(l.first_point(), None);
    }
}
