use std::collections::HashMap;
use std::io::{self, Read, Write};

use arrayvec::ArrayVec;

use crate::codec;
use crate::error::DecodeError;
use crate::roadnet::route::Route;
use crate::roadnet::segment::Segment;
use crate::roadnet::RoadNetwork;
use crate::vector::RoadPosition;
use crate::{JunctionId, PartitionId, SegmentId};

/// Distance table sentinel for "no path".
pub(crate) const UNREACHABLE: i32 = i32::MAX;

/// One leg of a precomputed in-partition path: a local segment index and
/// its traversal direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PathLeg {
    segment: u32,
    forward: bool,
}

/// A radius-bounded subgraph of the road network with precomputed
/// all-pairs distances, shortest paths and border junctions.
///
/// Immutable after construction; junctions and segments are addressed by
/// local 0-based indices inside the distance and path tables.
#[derive(Debug, Default)]
pub struct Partition {
    id: PartitionId,
    /// Local index → segment ID.
    segments: Vec<SegmentId>,
    segment_index: HashMap<SegmentId, usize>,
    /// Local index → junction ID.
    junctions: Vec<JunctionId>,
    junction_index: HashMap<JunctionId, usize>,
    /// Border flag per local junction.
    is_border: Vec<bool>,
    /// n×n junction-to-junction distances in the partitioning metric.
    dist: Vec<Vec<i32>>,
    /// n×n shortest paths as composed legs.
    paths: Vec<Vec<Vec<PathLeg>>>,
    /// Cached road positions of the border junctions, on in-partition
    /// segments.
    border_locations: Vec<RoadPosition>,
}

impl Partition {
    pub(crate) fn new(id: PartitionId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// The partition ID.
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Number of segments in the partition.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of junctions touched by the partition's segments.
    pub fn junction_count(&self) -> usize {
        self.junctions.len()
    }

    /// The partition's segments, in local-index order.
    pub fn segment_ids(&self) -> &[SegmentId] {
        &self.segments
    }

    /// The junctions touched by the partition's segments, in local-index
    /// order.
    pub fn junction_ids(&self) -> &[JunctionId] {
        &self.junctions
    }

    /// Whether the segment belongs to this partition.
    pub fn contains_segment(&self, segment: SegmentId) -> bool {
        self.segment_index.contains_key(&segment)
    }

    /// Whether the partition's distance/path tables have been computed.
    /// Connected-component decompositions skip them.
    pub fn has_distance_tables(&self) -> bool {
        self.dist.len() == self.junctions.len() && !self.junctions.is_empty()
    }

    /// Whether the junction is one of the partition's border points.
    pub fn is_border_junction(&self, junction: JunctionId) -> bool {
        self.junction_index
            .get(&junction)
            .map_or(false, |&idx| self.is_border.get(idx).copied().unwrap_or(false))
    }

    /// The partition's border junctions.
    pub fn border_junctions(&self) -> Vec<JunctionId> {
        self.junctions
            .iter()
            .zip(&self.is_border)
            .filter(|(_, border)| **border)
            .map(|(junction, _)| *junction)
            .collect()
    }

    /// Cached road positions of the border junctions.
    pub fn border_locations(&self) -> &[RoadPosition] {
        &self.border_locations
    }

    /// Adds a segment and its end junctions to the local index.
    pub(crate) fn insert_segment(&mut self, segment: &Segment) {
        self.segment_index.insert(segment.id(), self.segments.len());
        self.segments.push(segment.id());
        for end in 0..2 {
            let junction = segment.end_junction(end);
            if !self.junction_index.contains_key(&junction) {
                self.junction_index.insert(junction, self.junctions.len());
                self.junctions.push(junction);
            }
        }
    }

    /// Fixes the border point set and precomputes the all-pairs distance
    /// and path tables over the partition's junctions.
    pub(crate) fn set_border_points(&mut self, borders: &[JunctionId], net: &RoadNetwork) {
        let n = self.junctions.len();
        self.is_border = vec![false; n];
        for border in borders {
            if let Some(&idx) = self.junction_index.get(border) {
                self.is_border[idx] = true;
            }
        }

        self.dist = vec![vec![UNREACHABLE; n]; n];
        self.paths = vec![vec![Vec::new(); n]; n];
        for i in 0..n {
            self.dist[i][i] = 0;
        }
        for (local, segment_id) in self.segments.iter().enumerate() {
            let Some(segment) = net.segment(*segment_id) else {
                continue;
            };
            let (Some(&i0), Some(&i1)) = (
                self.junction_index.get(&segment.end_junction(0)),
                self.junction_index.get(&segment.end_junction(1)),
            ) else {
                continue;
            };
            if segment.length() < self.dist[i0][i1] {
                self.dist[i0][i1] = segment.length();
                self.paths[i0][i1] = vec![PathLeg {
                    segment: local as u32,
                    forward: true,
                }];
            }
            if !segment.is_directed() && segment.length() < self.dist[i1][i0] {
                self.dist[i1][i0] = segment.length();
                self.paths[i1][i0] = vec![PathLeg {
                    segment: local as u32,
                    forward: false,
                }];
            }
        }

        self.floyd_warshall();
        self.border_locations = self.derive_border_locations(net);
    }

    /// Standard triangle relaxation. The saturating add keeps an
    /// unreachable leg from ever looking like an improvement.
    fn floyd_warshall(&mut self) {
        let n = self.junctions.len();
        for k in 0..n {
            for i in 0..n {
                if self.dist[i][k] == UNREACHABLE {
                    continue;
                }
                for j in 0..n {
                    if self.dist[k][j] == UNREACHABLE {
                        continue;
                    }
                    let via = self.dist[i][k].saturating_add(self.dist[k][j]);
                    if via < self.dist[i][j] {
                        self.dist[i][j] = via;
                        let mut path = self.paths[i][k].clone();
                        path.extend_from_slice(&self.paths[k][j]);
                        self.paths[i][j] = path;
                    }
                }
            }
        }
    }

    /// Road positions of the border junctions, expressed on segments that
    /// belong to this partition.
    fn derive_border_locations(&self, net: &RoadNetwork) -> Vec<RoadPosition> {
        let mut locations = Vec::new();
        for (idx, border) in self.is_border.iter().enumerate() {
            if !border {
                continue;
            }
            let junction_id = self.junctions[idx];
            let Some(junction) = net.junction(junction_id) else {
                continue;
            };
            for segment_id in junction.all_segments(false) {
                if !self.segment_index.contains_key(&segment_id) {
                    continue;
                }
                if let Some(location) = net
                    .segment(segment_id)
                    .and_then(|s| s.junction_location(junction_id))
                {
                    locations.push(location);
                }
                break;
            }
        }
        locations
    }

    /// Distance between two junctions in the partitioning metric, using
    /// the precomputed table. `None` when either junction is not local or
    /// no path exists.
    pub fn junction_distance(&self, from: JunctionId, to: JunctionId) -> Option<i32> {
        let &i = self.junction_index.get(&from)?;
        let &j = self.junction_index.get(&to)?;
        match *self.dist.get(i)?.get(j)? {
            UNREACHABLE => None,
            d => Some(d),
        }
    }

    /// Largest finite distance from the given junction to any junction of
    /// the partition.
    pub fn max_junction_distance(&self, from: JunctionId) -> Option<i32> {
        let &i = self.junction_index.get(&from)?;
        self.dist
            .get(i)?
            .iter()
            .filter(|&&d| d != UNREACHABLE)
            .max()
            .copied()
    }

    /// Shortest route between two positions on this partition's segments,
    /// composed from the precomputed tables without a graph search.
    pub fn route(&self, net: &RoadNetwork, source: RoadPosition, target: RoadPosition) -> Option<Route> {
        let source_seg = net.segment(source.segment)?;
        let target_seg = net.segment(target.segment)?;

        if source.segment == target.segment {
            let mut route = Route::new(source, target);
            route.push_back(source.segment, source.progress <= target.progress);
            route.set_length((source.progress as i64 - target.progress as i64).abs());
            return Some(route);
        }
        if !self.has_distance_tables() {
            return None;
        }

        // every admissible exit of the source segment × entry of the target
        let mut best: Option<(usize, usize, i64, bool, bool)> = None;
        for (exit, head, exit_forward) in self.exits(source_seg, source) {
            for (entry, tail, entry_forward) in self.entries(target_seg, target) {
                let between = self.dist[exit][entry];
                if between == UNREACHABLE {
                    continue;
                }
                let total = between as i64 + head + tail;
                if best.map_or(true, |(_, _, d, _, _)| total < d) {
                    best = Some((exit, entry, total, exit_forward, entry_forward));
                }
            }
        }
        let (exit, entry, total, exit_forward, entry_forward) = best?;

        let mut route = Route::new(source, target);
        route.push_back(source.segment, exit_forward);
        for leg in &self.paths[exit][entry] {
            route.push_back(self.segments[leg.segment as usize], leg.forward);
        }
        route.push_back(target.segment, entry_forward);
        route.set_length(total);
        Some(route)
    }

    /// Shortest route from `location` to the nearest trigger point: a
    /// cached border location or one of the caller's points of interest.
    pub fn route_to_nearest_trigger_point(
        &self,
        net: &RoadNetwork,
        points: &[RoadPosition],
        location: RoadPosition,
    ) -> Option<Route> {
        let mut nearest: Option<Route> = None;
        for trigger in self.border_locations.iter().chain(points.iter()) {
            if let Some(route) = self.route(net, location, *trigger) {
                if nearest
                    .as_ref()
                    .map_or(true, |best| route.length(net) < best.length(net))
                {
                    nearest = Some(route);
                }
            }
        }
        nearest
    }

    /// Admissible exits of the source segment: local junction index,
    /// partial distance from the position, and the leg's direction flag.
    fn exits(&self, segment: &Segment, position: RoadPosition) -> ArrayVec<(usize, i64, bool), 2> {
        let mut exits = ArrayVec::new();
        if let Some(&idx) = self.junction_index.get(&segment.target()) {
            exits.push((idx, (segment.length() - position.progress) as i64, true));
        }
        if !segment.is_directed() {
            if let Some(&idx) = self.junction_index.get(&segment.source()) {
                exits.push((idx, position.progress as i64, false));
            }
        }
        exits
    }

    /// Admissible entries of the target segment.
    fn entries(&self, segment: &Segment, position: RoadPosition) -> ArrayVec<(usize, i64, bool), 2> {
        let mut entries = ArrayVec::new();
        if let Some(&idx) = self.junction_index.get(&segment.source()) {
            entries.push((idx, position.progress as i64, true));
        }
        if !segment.is_directed() {
            if let Some(&idx) = self.junction_index.get(&segment.target()) {
                entries.push((idx, (segment.length() - position.progress) as i64, false));
            }
        }
        entries
    }

    /// Writes the partition in the binary partition-file layout.
    pub(crate) fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        if !self.has_distance_tables() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "partition has no precomputed distance tables",
            ));
        }
        codec::write_u32(out, self.id.0)?;
        codec::write_u32(out, self.segments.len() as u32)?;
        for segment in &self.segments {
            codec::write_u32(out, segment.0)?;
        }
        codec::write_u32(out, self.junctions.len() as u32)?;
        for border in &self.is_border {
            codec::write_bool(out, *border)?;
        }
        for row in 0..self.junctions.len() {
            for col in 0..self.junctions.len() {
                codec::write_i32(out, self.dist[row][col])?;
                let path = &self.paths[row][col];
                codec::write_u32(out, path.len() as u32)?;
                for leg in path {
                    // 1-based signed index; the sign carries the direction
                    let signed = (leg.segment as i32 + 1) * if leg.forward { 1 } else { -1 };
                    codec::write_i32(out, signed)?;
                }
            }
        }
        Ok(())
    }

    /// Reads one partition, resolving segment ids against the network and
    /// re-deriving the local junction index from the segment list.
    pub(crate) fn load(input: &mut dyn Read, net: &RoadNetwork) -> Result<Self, DecodeError> {
        let id = PartitionId(codec::read_u32(input)?);
        let mut partition = Partition::new(id);

        let segment_count = codec::read_u32(input)?;
        for _ in 0..segment_count {
            let segment_id = SegmentId(codec::read_u32(input)?);
            let segment = net
                .segment(segment_id)
                .ok_or(DecodeError::UnknownSegment(segment_id))?;
            partition.insert_segment(segment);
        }

        let stored = codec::read_u32(input)? as usize;
        let n = partition.junctions.len();
        if stored != n {
            return Err(DecodeError::MatrixSizeMismatch {
                stored,
                derived: n,
            });
        }
        partition.is_border = Vec::with_capacity(n);
        for _ in 0..n {
            partition.is_border.push(codec::read_bool(input)?);
        }

        partition.dist = vec![vec![UNREACHABLE; n]; n];
        partition.paths = vec![vec![Vec::new(); n]; n];
        for row in 0..n {
            for col in 0..n {
                let distance = codec::read_i32(input)?;
                if distance < 0 {
                    return Err(DecodeError::NegativeDistance);
                }
                partition.dist[row][col] = distance;
                let path_length = codec::read_u32(input)?;
                let mut path = Vec::with_capacity(path_length as usize);
                for _ in 0..path_length {
                    let signed = codec::read_i32(input)?;
                    let local = signed.unsigned_abs();
                    if local == 0 || local as usize > partition.segments.len() {
                        return Err(DecodeError::InvalidPathLeg(signed));
                    }
                    path.push(PathLeg {
                        segment: local - 1,
                        forward: signed > 0,
                    });
                }
                partition.paths[row][col] = path;
            }
        }

        partition.border_locations = partition.derive_border_locations(net);
        Ok(partition)
    }
}
