use cgmath::Rad;
use smallvec::SmallVec;

use crate::{JunctionId, SegmentId};

/// An entry of a junction's clockwise-reachable list.
#[derive(Clone, Copy, Debug)]
struct ReachableSegment {
    segment: SegmentId,
    /// Angle of the segment's tangent leaving the junction.
    theta: Rad<f64>,
}

/// A node of the road network where segments meet.
#[derive(Clone, Debug)]
pub struct Junction {
    /// The junction ID.
    id: JunctionId,
    /// Segments originating at this junction.
    out_segments: SmallVec<[SegmentId; 2]>,
    /// Segments terminating at this junction.
    in_segments: SmallVec<[SegmentId; 2]>,
    /// Segments enterable by traffic from this junction, ordered clockwise
    /// by departing tangent angle. Undirected loops are listed twice;
    /// directed terminating segments are not listed.
    reachable: Vec<ReachableSegment>,
}

impl Junction {
    pub(crate) fn new(id: JunctionId) -> Self {
        Self {
            id,
            out_segments: SmallVec::new(),
            in_segments: SmallVec::new(),
            reachable: Vec::new(),
        }
    }

    /// The junction ID.
    pub fn id(&self) -> JunctionId {
        self.id
    }

    /// Number of terminating segments.
    pub fn in_degree(&self) -> usize {
        self.in_segments.len()
    }

    /// Number of originating segments.
    pub fn out_degree(&self) -> usize {
        self.out_segments.len()
    }

    /// Total number of incident segment ends.
    pub fn degree(&self) -> usize {
        self.in_degree() + self.out_degree()
    }

    /// Segments originating at this junction.
    pub fn out_segments(&self) -> &[SegmentId] {
        &self.out_segments
    }

    /// Segments terminating at this junction.
    pub fn in_segments(&self) -> &[SegmentId] {
        &self.in_segments
    }

    /// Segments traffic can enter from this junction, in clockwise order.
    pub fn reachable_segments(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.reachable.iter().map(|entry| entry.segment)
    }

    /// All incident segments. A loop segment is incident twice and appears
    /// twice only when `repeat_loops` is set.
    pub fn all_segments(&self, repeat_loops: bool) -> Vec<SegmentId> {
        let mut segments: Vec<SegmentId> = self.in_segments.to_vec();
        segments.extend(
            self.out_segments
                .iter()
                .filter(|id| repeat_loops || !self.in_segments.contains(id))
                .copied(),
        );
        segments
    }

    pub(crate) fn attach_originating(&mut self, segment: SegmentId, theta: Rad<f64>) {
        self.out_segments.push(segment);
        self.insert_reachable(segment, theta);
    }

    /// Attaches a terminating segment; `theta` is present only for
    /// undirected segments, which traffic may also enter from this end.
    pub(crate) fn attach_terminating(&mut self, segment: SegmentId, theta: Option<Rad<f64>>) {
        self.in_segments.push(segment);
        if let Some(theta) = theta {
            self.insert_reachable(segment, theta);
        }
    }

    /// Detaches every occurrence of the segment, undoing the attach calls.
    pub(crate) fn detach(&mut self, segment: SegmentId) {
        self.out_segments.retain(|id| *id != segment);
        self.in_segments.retain(|id| *id != segment);
        self.reachable.retain(|entry| entry.segment != segment);
    }

    /// Sorted insert keeping the reachable list in descending-angle
    /// (clockwise) order.
    fn insert_reachable(&mut self, segment: SegmentId, theta: Rad<f64>) {
        let idx = self
            .reachable
            .iter()
            .position(|entry| entry.theta <= theta)
            .unwrap_or(self.reachable.len());
        self.reachable.insert(idx, ReachableSegment { segment, theta });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachable_list_is_clockwise() {
        let mut junction = Junction::new(JunctionId(7));
        junction.attach_originating(SegmentId(1), Rad(0.5));
        junction.attach_originating(SegmentId(2), Rad(3.0));
        junction.attach_terminating(SegmentId(3), Some(Rad(1.5)));
        junction.attach_terminating(SegmentId(4), None); // directed, not enterable

        let order: Vec<SegmentId> = junction.reachable_segments().collect();
        assert_eq!(order, vec![SegmentId(2), SegmentId(3), SegmentId(1)]);
        assert_eq!(junction.degree(), 4);
        assert_eq!(junction.in_degree(), 2);
    }

    #[test]
    fn detach_removes_every_occurrence() {
        let mut junction = Junction::new(JunctionId(7));
        // an undirected loop is attached at both ends of the same junction
        junction.attach_originating(SegmentId(9), Rad(0.25));
        junction.attach_terminating(SegmentId(9), Some(Rad(2.0)));
        assert_eq!(junction.reachable_segments().count(), 2);

        junction.detach(SegmentId(9));
        assert_eq!(junction.degree(), 0);
        assert_eq!(junction.reachable_segments().count(), 0);
    }
}
