use crate::roadnet::geometry::SegmentGeometry;
use crate::vector::{PlanarVector, RoadPosition};
use crate::{JunctionId, PartitionId, SegmentId};

/// A directed-or-undirected edge of the road network, with physical
/// geometry and a speed limit.
#[derive(Clone, Debug)]
pub struct Segment {
    /// The segment ID.
    id: SegmentId,
    /// Junction at the start of the segment.
    source: JunctionId,
    /// Junction at the end of the segment.
    target: JunctionId,
    /// Whether traffic may only travel from source to target.
    directed: bool,
    /// The segment's polyline.
    geometry: SegmentGeometry,
    /// Speed limit in mm/s.
    speed_limit: i32,
    /// Cached length in mm.
    length: i32,
    /// The partition that claimed this segment, once partitioned.
    partition: Option<PartitionId>,
}

impl Segment {
    /// Creates a new segment. The length is computed from the geometry and
    /// cached; a segment with `source == target` is a loop.
    pub fn new(
        id: SegmentId,
        source: JunctionId,
        target: JunctionId,
        directed: bool,
        geometry: SegmentGeometry,
        speed_limit: i32,
    ) -> Self {
        let length = geometry.total_length();
        Self {
            id,
            source,
            target,
            directed,
            geometry,
            speed_limit,
            length,
            partition: None,
        }
    }

    /// The segment ID.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// The junction at the start of the segment.
    pub fn source(&self) -> JunctionId {
        self.source
    }

    /// The junction at the end of the segment.
    pub fn target(&self) -> JunctionId {
        self.target
    }

    /// Whether traffic may only travel from source to target.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// The segment's polyline.
    pub fn geometry(&self) -> &SegmentGeometry {
        &self.geometry
    }

    /// Speed limit in mm/s.
    pub fn speed_limit(&self) -> i32 {
        self.speed_limit
    }

    /// Length in mm.
    pub fn length(&self) -> i32 {
        self.length
    }

    /// The partition that claimed this segment, once partitioned.
    pub fn partition(&self) -> Option<PartitionId> {
        self.partition
    }

    pub(crate) fn set_partition(&mut self, partition: Option<PartitionId>) {
        self.partition = partition;
    }

    /// The junction at the given end (0 = source, 1 = target).
    pub fn end_junction(&self, end: usize) -> JunctionId {
        if end == 0 {
            self.source
        } else {
            self.target
        }
    }

    /// The end junction opposite to the given one.
    /// For a loop segment both ends are the same junction.
    pub fn other_junction(&self, junction: JunctionId) -> JunctionId {
        if self.source == junction {
            self.target
        } else {
            self.source
        }
    }

    /// The end index (0 = source, 1 = target) of the given junction,
    /// or `None` if it is not incident.
    pub fn end_index(&self, junction: JunctionId) -> Option<usize> {
        if self.source == junction {
            Some(0)
        } else if self.target == junction {
            Some(1)
        } else {
            None
        }
    }

    /// Whether this is a loop segment.
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }

    /// Whether traffic can travel this segment from `from` to `to`.
    pub fn is_between(&self, from: JunctionId, to: JunctionId) -> bool {
        (self.source == from && self.target == to)
            || (!self.directed && self.source == to && self.target == from)
    }

    /// The road position of the given end junction.
    pub fn junction_location(&self, junction: JunctionId) -> Option<RoadPosition> {
        let end = self.end_index(junction)?;
        let progress = if end == 0 { 0 } else { self.length };
        Some(RoadPosition::new(self.id, progress))
    }

    /// The road position on this segment nearest to the planar point.
    pub fn road_location(&self, location: PlanarVector) -> RoadPosition {
        RoadPosition::new(self.id, self.geometry.location_progress(location))
    }

    /// Planar location at the given progress.
    pub fn location_at(&self, progress: i32) -> PlanarVector {
        self.geometry.location_at(progress)
    }

    /// Tangent at the given progress, scaled to 1 km.
    pub fn tangent_at(&self, progress: i32) -> PlanarVector {
        self.geometry.tangent_at(progress)
    }
}
