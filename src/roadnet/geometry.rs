use itertools::Itertools;

use crate::vector::PlanarVector;

/// Physical shape of a road segment: an ordered polyline of ≥ 2 points.
///
/// Every polyline edge length is rounded down to an even millimeter, so
/// junction-to-junction distances are always even and a closed loop's
/// halfway point falls on a whole millimeter. The rounded lengths are used
/// uniformly by every distance and interpolation computation.
#[derive(Clone, Debug)]
pub struct SegmentGeometry {
    points: Vec<PlanarVector>,
}

impl SegmentGeometry {
    /// Creates a geometry from its polyline.
    pub fn new(points: Vec<PlanarVector>) -> Self {
        debug_assert!(points.len() >= 2, "a polyline has at least two points");
        Self { points }
    }

    /// A straight segment between two endpoints.
    pub fn line(from: PlanarVector, to: PlanarVector) -> Self {
        Self::new(vec![from, to])
    }

    /// The polyline points.
    pub fn points(&self) -> &[PlanarVector] {
        &self.points
    }

    /// Location of the segment's source end.
    pub fn first_location(&self) -> PlanarVector {
        self.points[0]
    }

    /// Location of the segment's target end.
    pub fn last_location(&self) -> PlanarVector {
        self.points[self.points.len() - 1]
    }

    /// Total length of the segment in mm. Always even.
    pub fn total_length(&self) -> i32 {
        self.distance_between_points(0, self.points.len())
    }

    /// Polyline distance from `points[start]` to `points[end - 1]` in mm.
    pub fn distance_between_points(&self, start: usize, end: usize) -> i32 {
        self.points[start..end]
            .iter()
            .tuple_windows()
            .map(|(a, b)| Self::edge_length(*a, *b))
            .sum()
    }

    /// Location at the given progress from the start of the polyline.
    pub fn location_at(&self, progress: i32) -> PlanarVector {
        let (i, length) = self.walk_to(progress);
        let mut location = self.points[i];
        if length > progress {
            // back off along the last edge by the overshoot
            let back = self.points[i].vector_to(self.points[i - 1]);
            let edge = Self::edge_length(self.points[i - 1], self.points[i]);
            location += back.scaled((length - progress) as f64 / edge as f64);
        }
        location
    }

    /// Tangent at the given progress, pointing toward the segment's target
    /// end and scaled to 1 km (10⁶ mm).
    pub fn tangent_at(&self, progress: i32) -> PlanarVector {
        let (i, length) = self.walk_to(progress);
        let tangent = if length > progress || i == self.points.len() - 1 {
            self.points[i - 1].vector_to(self.points[i])
        } else {
            self.points[i].vector_to(self.points[i + 1])
        };
        tangent.with_magnitude(1_000_000)
    }

    /// Progress of the polyline vertex nearest to the given point.
    pub fn location_progress(&self, location: PlanarVector) -> i32 {
        let nearest = self
            .points
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| location.vector_to(**p).magnitude())
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.distance_between_points(0, nearest + 1)
    }

    /// Walks edges until `progress` is covered; returns the index of the
    /// point reached and the rounded length walked so far.
    fn walk_to(&self, progress: i32) -> (usize, i32) {
        let mut length = 0;
        let mut i = 0;
        while length < progress && i + 1 < self.points.len() {
            length += Self::edge_length(self.points[i], self.points[i + 1]);
            i += 1;
        }
        (i, length)
    }

    fn edge_length(a: PlanarVector, b: PlanarVector) -> i32 {
        (a.vector_to(b).magnitude() as i32) & !1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_lengths_are_even() {
        // a 5 mm edge rounds down to 4 mm
        let geometry = SegmentGeometry::line(PlanarVector::new(0, 0), PlanarVector::new(0, 5));
        assert_eq!(geometry.total_length(), 4);

        let geometry = SegmentGeometry::new(vec![
            PlanarVector::new(0, 0),
            PlanarVector::new(3, 0),
            PlanarVector::new(3, 7),
        ]);
        assert_eq!(geometry.total_length(), 2 + 6);
        assert_eq!(geometry.total_length() % 2, 0);
    }

    #[test]
    fn location_interpolates_along_edges() {
        let geometry = SegmentGeometry::new(vec![
            PlanarVector::new(0, 0),
            PlanarVector::new(1000, 0),
            PlanarVector::new(1000, 1000),
        ]);
        assert_eq!(geometry.location_at(0), PlanarVector::new(0, 0));
        assert_eq!(geometry.location_at(500), PlanarVector::new(500, 0));
        assert_eq!(geometry.location_at(1000), PlanarVector::new(1000, 0));
        assert_eq!(geometry.location_at(1500), PlanarVector::new(1000, 500));
        assert_eq!(geometry.location_at(2000), PlanarVector::new(1000, 1000));
    }

    #[test]
    fn tangent_follows_the_containing_edge() {
        let geometry = SegmentGeometry::new(vec![
            PlanarVector::new(0, 0),
            PlanarVector::new(1000, 0),
            PlanarVector::new(1000, 1000),
        ]);
        assert_eq!(geometry.tangent_at(0), PlanarVector::new(1_000_000, 0));
        assert_eq!(geometry.tangent_at(500), PlanarVector::new(1_000_000, 0));
        assert_eq!(geometry.tangent_at(1500), PlanarVector::new(0, 1_000_000));
        // at the very end the tangent is the last edge's direction
        assert_eq!(geometry.tangent_at(2000), PlanarVector::new(0, 1_000_000));
    }

    #[test]
    fn nearest_vertex_progress() {
        let geometry = SegmentGeometry::new(vec![
            PlanarVector::new(0, 0),
            PlanarVector::new(1000, 0),
            PlanarVector::new(2000, 0),
        ]);
        assert_eq!(geometry.location_progress(PlanarVector::new(10, 50)), 0);
        assert_eq!(geometry.location_progress(PlanarVector::new(990, 50)), 1000);
        assert_eq!(geometry.location_progress(PlanarVector::new(2100, 0)), 2000);
    }
}
