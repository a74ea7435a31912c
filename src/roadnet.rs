//! The road-network graph and its routing/partitioning engine.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::io::{self, Read, Write};
use std::ops::Index;

use arrayvec::ArrayVec;
use log::debug;
use rand::Rng;

pub mod geometry;
pub mod junction;
pub mod partition;
pub mod route;
pub mod segment;

use crate::codec;
use crate::error::DecodeError;
use crate::vector::{PlanarVector, RoadPosition};
use crate::{JunctionId, PartitionId, SegmentId};
use junction::Junction;
use partition::Partition;
use route::Route;
use segment::Segment;

/// Metric used to grow partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceMode {
    /// Number of segments traversed.
    Hops,
    /// Road distance in mm.
    RoadDistance,
    /// Travel time at the speed limit, in ms.
    TravelTime,
}

/// Ordering in which junctions are tried as partition seeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedPriority {
    /// Random order.
    Random,
    /// Junctions with the highest aggregate incident speed limit first,
    /// so arterial junctions seed partitions.
    SpeedSum,
}

/// Distance and previous-segment maps of a Dijkstra expansion from one
/// source position, for callers that need many distances at once.
pub struct SpanningTree {
    /// Junction → distance from the source in mm.
    pub dist: HashMap<JunctionId, i64>,
    /// Junction → the segment it was reached through.
    pub prev: HashMap<JunctionId, SegmentId>,
}

/// Result of one Dijkstra expansion.
struct Expansion {
    dist: HashMap<JunctionId, i64>,
    prev: HashMap<JunctionId, SegmentId>,
    /// Best completed target entry: junction, entry-leg direction, total
    /// route length.
    best: Option<(JunctionId, bool, i64)>,
}

/// Bookkeeping of a partitioning run.
#[derive(Clone, Copy, PartialEq, Eq)]
enum JunctionStatus {
    /// Claimed by some partition's interior.
    Interior,
    /// Fixed as a border point of some finalized partition.
    Border,
}

/// The road-network graph. Owns every segment and junction, addressed by
/// their external integer ids.
#[derive(Debug, Default)]
pub struct RoadNetwork {
    segments: HashMap<SegmentId, Segment>,
    junctions: HashMap<JunctionId, Junction>,
    highest_segment_id: Option<u32>,
    partitions: Vec<Partition>,
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Gets the segment with the given ID.
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    /// Gets the junction with the given ID.
    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(&id)
    }

    /// Iterates over all segments, in no particular order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// Iterates over all junctions, in no particular order.
    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn junction_count(&self) -> usize {
        self.junctions.len()
    }

    /// The next unused segment ID.
    pub fn next_segment_id(&self) -> SegmentId {
        SegmentId(self.highest_segment_id.map_or(0, |id| id + 1))
    }

    /// Aggregate length of all segments in mm.
    pub fn length_total(&self) -> i64 {
        self.segments.values().map(|s| s.length() as i64).sum()
    }

    /// Adds a segment, creating its end junctions as needed and linking it
    /// into their incidence and clockwise-reachability lists.
    ///
    /// Returns `false` (leaving the graph untouched) if the ID is taken.
    pub fn add_segment(&mut self, segment: Segment) -> bool {
        if self.segments.contains_key(&segment.id()) {
            return false;
        }
        let id = segment.id();
        // tangent angles pointing away from each end
        let theta_out = segment.tangent_at(0).theta();
        let theta_in = (-segment.tangent_at(segment.length())).theta();

        self.junctions
            .entry(segment.source())
            .or_insert_with(|| Junction::new(segment.source()))
            .attach_originating(id, theta_out);
        let enter_from_target = !segment.is_directed();
        self.junctions
            .entry(segment.target())
            .or_insert_with(|| Junction::new(segment.target()))
            .attach_terminating(id, enter_from_target.then_some(theta_in));

        self.highest_segment_id = Some(self.highest_segment_id.map_or(id.0, |h| h.max(id.0)));
        self.segments.insert(id, segment);
        true
    }

    /// Removes a segment, detaching it from its junctions and pruning any
    /// junction left with no incident segments. Returns the segment.
    pub fn remove_segment(&mut self, id: SegmentId) -> Option<Segment> {
        let segment = self.segments.remove(&id)?;
        for end in [segment.source(), segment.target()] {
            if let Some(junction) = self.junctions.get_mut(&end) {
                junction.detach(id);
                if junction.degree() == 0 {
                    self.junctions.remove(&end);
                }
            }
        }
        Some(segment)
    }

    /// Planar location of a road position.
    pub fn locate(&self, position: RoadPosition) -> Option<PlanarVector> {
        Some(self.segment(position.segment)?.location_at(position.progress))
    }

    /// The road position nearest to a planar point.
    // TODO: use a spatial index instead of scanning every segment
    pub fn road_location(&self, location: PlanarVector) -> Option<RoadPosition> {
        let mut nearest: Option<(i64, RoadPosition)> = None;
        for segment in self.segments.values() {
            let position = segment.road_location(location);
            let distance = segment
                .location_at(position.progress)
                .vector_to(location)
                .magnitude();
            if nearest.map_or(true, |(best, _)| distance < best) {
                nearest = Some((distance, position));
            }
        }
        nearest.map(|(_, position)| position)
    }

    /// A road-relative coordinate for the given junction. Several valid
    /// coordinates may represent the junction; one is returned.
    pub fn junction_road_location(&self, id: JunctionId) -> Option<RoadPosition> {
        let junction = self.junction(id)?;
        if let Some(&segment) = junction.in_segments().first() {
            return self.segment(segment)?.junction_location(id);
        }
        let &segment = junction.out_segments().first()?;
        self.segment(segment)?.junction_location(id)
    }

    /// Shortest route between two road positions, or `None` when the
    /// target is unreachable.
    pub fn shortest_route(&self, source: RoadPosition, target: RoadPosition) -> Option<Route> {
        let source_seg = self.segment(source.segment)?;
        let target_seg = self.segment(target.segment)?;

        // fast path: same segment and the target is reachable along it
        if source.segment == target.segment
            && (!source_seg.is_directed() || source.progress <= target.progress)
        {
            let mut route = Route::new(source, target);
            route.push_back(source.segment, source.progress <= target.progress);
            return Some(route);
        }

        let expansion = self.expand(source_seg, source, Some((target_seg, target)));
        let (mut junction, entry_forward, total) = expansion.best?;

        let mut route = Route::new(source, target);
        route.push_back(target.segment, entry_forward);
        while let Some(&segment_id) = expansion.prev.get(&junction) {
            let segment = &self.segments[&segment_id];
            route.push_front(segment_id, segment.end_index(junction) == Some(1));
            junction = segment.other_junction(junction);
        }
        // exit leg: forward if leaving the source segment at its target end
        route.push_front(source.segment, source_seg.end_index(junction) == Some(1));
        route.set_length(total);
        Some(route)
    }

    /// Full Dijkstra expansion from one source position: distances to every
    /// reachable junction and the segment each was reached through.
    pub fn spanning_tree(&self, source: RoadPosition) -> Option<SpanningTree> {
        let source_seg = self.segment(source.segment)?;
        let Expansion { dist, prev, .. } = self.expand(source_seg, source, None);
        Some(SpanningTree { dist, prev })
    }

    /// Label-correcting search over junctions with a lazy-deletion binary
    /// heap ordered by `(distance, junction id)`; the id tie-break keeps
    /// routes deterministic. With a target, expansion stops as soon as the
    /// frontier can no longer beat the best completed route.
    fn expand(
        &self,
        source_seg: &Segment,
        source: RoadPosition,
        target: Option<(&Segment, RoadPosition)>,
    ) -> Expansion {
        let mut dist: HashMap<JunctionId, i64> = HashMap::new();
        let mut prev: HashMap<JunctionId, SegmentId> = HashMap::new();
        let mut heap: BinaryHeap<Reverse<(i64, JunctionId)>> = BinaryHeap::new();
        let mut best: Option<(JunctionId, bool, i64)> = None;

        let entries: ArrayVec<(JunctionId, i64, bool), 2> = match target {
            Some((segment, position)) => Self::entry_junctions(segment, position),
            None => ArrayVec::new(),
        };
        let offer = |junction: JunctionId,
                         d: i64,
                         best: &mut Option<(JunctionId, bool, i64)>| {
            for &(entry, remainder, forward) in &entries {
                if entry == junction {
                    let total = d + remainder;
                    if best.map_or(true, |(_, _, b)| total < b) {
                        *best = Some((junction, forward, total));
                    }
                }
            }
        };

        // seed the frontier with the junctions reachable from the source
        for (junction, d) in Self::exit_junctions(source_seg, source) {
            if dist.get(&junction).map_or(true, |&old| d < old) {
                dist.insert(junction, d);
                heap.push(Reverse((d, junction)));
            }
            offer(junction, d, &mut best);
        }

        while let Some(Reverse((d, junction))) = heap.pop() {
            if best.map_or(false, |(_, _, b)| d >= b) {
                break;
            }
            if dist.get(&junction) != Some(&d) {
                continue; // superseded heap entry
            }
            for segment_id in self.junctions[&junction].reachable_segments() {
                let segment = &self.segments[&segment_id];
                let d2 = d + segment.length() as i64;
                let other = segment.other_junction(junction);
                if dist.get(&other).map_or(true, |&old| d2 < old) {
                    dist.insert(other, d2);
                    prev.insert(other, segment_id);
                    heap.push(Reverse((d2, other)));
                }
                offer(other, d2, &mut best);
            }
        }

        Expansion { dist, prev, best }
    }

    /// Junctions reachable from a position along its own segment, with the
    /// partial distance to each.
    fn exit_junctions(segment: &Segment, position: RoadPosition) -> ArrayVec<(JunctionId, i64), 2> {
        let mut exits = ArrayVec::new();
        exits.push((
            segment.target(),
            (segment.length() - position.progress) as i64,
        ));
        if !segment.is_directed() {
            exits.push((segment.source(), position.progress as i64));
        }
        exits
    }

    /// Junctions a route may enter the target segment from, with the
    /// remaining distance to the target position and the direction of the
    /// final leg.
    fn entry_junctions(
        segment: &Segment,
        position: RoadPosition,
    ) -> ArrayVec<(JunctionId, i64, bool), 2> {
        let mut entries = ArrayVec::new();
        entries.push((segment.source(), position.progress as i64, true));
        if !segment.is_directed() {
            entries.push((
                segment.target(),
                (segment.length() - position.progress) as i64,
                false,
            ));
        }
        entries
    }

    /// Partitions the network into radius-bounded regions, each with
    /// precomputed routing tables. Every segment is claimed by exactly one
    /// partition; membership is recorded on the segments and the partition
    /// list replaces any previous one.
    pub fn partition(
        &mut self,
        radius: i32,
        mode: DistanceMode,
        priority: SeedPriority,
    ) -> &[Partition] {
        let mut partitions: Vec<Partition> = Vec::new();
        let mut segment_status: HashMap<SegmentId, PartitionId> = HashMap::new();
        let mut junction_status: HashMap<JunctionId, JunctionStatus> = HashMap::new();
        let mut seeds = self.junctions_in_order(priority).into_iter();

        while segment_status.len() < self.segments.len() {
            if junction_status.len() == self.junctions.len() {
                // every junction is claimed: only isolated single-segment
                // partitions remain
                self.claim_leftover_segments(&mut partitions, &mut segment_status);
                continue;
            }
            let Some(seed) = seeds.find(|j| !junction_status.contains_key(j)) else {
                break;
            };
            let partition = self.grow_partition(
                PartitionId(partitions.len() as u32),
                seed,
                radius,
                mode,
                &mut segment_status,
                &mut junction_status,
            );
            partitions.push(partition);
        }

        debug!(
            "partitioned {} segments into {} regions",
            self.segments.len(),
            partitions.len()
        );
        self.install_partitions(partitions);
        &self.partitions
    }

    /// Undirected connected-components decomposition: unbounded radius,
    /// hop metric, no distance precomputation for the grown regions.
    /// The result may be too coarse for heavily directed networks.
    pub fn connected_components(&mut self) -> &[Partition] {
        self.partition(i32::MAX, DistanceMode::Hops, SeedPriority::Random)
    }

    /// Grows one region from `seed` by Dijkstra-style expansion in the
    /// chosen metric, claiming every newly reached segment.
    fn grow_partition(
        &self,
        id: PartitionId,
        seed: JunctionId,
        radius: i32,
        mode: DistanceMode,
        segment_status: &mut HashMap<SegmentId, PartitionId>,
        junction_status: &mut HashMap<JunctionId, JunctionStatus>,
    ) -> Partition {
        let mut partition = Partition::new(id);
        let mut dist: HashMap<JunctionId, i32> = HashMap::new();
        let mut heap: BinaryHeap<Reverse<(i32, JunctionId)>> = BinaryHeap::new();
        let mut absorbed: HashSet<JunctionId> = HashSet::new();
        let mut borders: Vec<JunctionId> = Vec::new();

        dist.insert(seed, 0);
        heap.push(Reverse((0, seed)));

        while let Some(Reverse((d, junction))) = heap.pop() {
            if dist.get(&junction) != Some(&d) || absorbed.contains(&junction) {
                continue;
            }
            if d > radius {
                break; // junctions past the radius stay on the rim
            }
            absorbed.insert(junction);
            junction_status.insert(junction, JunctionStatus::Interior);

            for segment_id in self.junctions[&junction].reachable_segments() {
                if segment_status.contains_key(&segment_id) {
                    continue;
                }
                let segment = &self.segments[&segment_id];
                segment_status.insert(segment_id, id);
                partition.insert_segment(segment);

                let step = match mode {
                    DistanceMode::Hops => 1,
                    DistanceMode::RoadDistance => segment.length(),
                    DistanceMode::TravelTime => {
                        (1000 * segment.length() as i64 / segment.speed_limit() as i64) as i32
                    }
                };
                let d2 = d.saturating_add(step);
                let other = segment.other_junction(junction);
                if junction_status.get(&other) == Some(&JunctionStatus::Border) {
                    // borders propagate: a finalized partition's border
                    // stays a border here, and expansion stops at it
                    borders.push(other);
                } else if !absorbed.contains(&other)
                    && dist.get(&other).map_or(true, |&old| d2 < old)
                {
                    dist.insert(other, d2);
                    heap.push(Reverse((d2, other)));
                    junction_status.insert(other, JunctionStatus::Interior);
                }
            }
        }

        // discovered but unabsorbed junctions become borders, unless all
        // their outlets lead back into this partition
        let mut rim: Vec<JunctionId> = dist
            .keys()
            .filter(|j| !absorbed.contains(*j))
            .copied()
            .collect();
        rim.sort();
        for junction in rim {
            let outward = self.junctions[&junction]
                .reachable_segments()
                .any(|s| segment_status.get(&s) != Some(&id));
            if outward {
                borders.push(junction);
            }
        }
        for border in &borders {
            junction_status.insert(*border, JunctionStatus::Border);
        }

        // connected-component runs skip the distance precomputation
        if radius < i32::MAX {
            borders.sort();
            borders.dedup();
            partition.set_border_points(&borders, self);
        }
        partition
    }

    /// Makes a singleton partition, with both endpoints as borders, out of
    /// every still-unclaimed segment (e.g. an unreachable dangling edge).
    fn claim_leftover_segments(
        &self,
        partitions: &mut Vec<Partition>,
        segment_status: &mut HashMap<SegmentId, PartitionId>,
    ) {
        let mut leftover: Vec<SegmentId> = self
            .segments
            .keys()
            .filter(|id| !segment_status.contains_key(id))
            .copied()
            .collect();
        leftover.sort();
        for segment_id in leftover {
            let id = PartitionId(partitions.len() as u32);
            let segment = &self.segments[&segment_id];
            let mut partition = Partition::new(id);
            partition.insert_segment(segment);
            let mut borders = vec![segment.source(), segment.target()];
            borders.dedup();
            partition.set_border_points(&borders, self);
            segment_status.insert(segment_id, id);
            partitions.push(partition);
        }
    }

    /// Junction ids ordered by seed priority, ties broken by id.
    fn junctions_in_order(&self, priority: SeedPriority) -> Vec<JunctionId> {
        let mut rng = rand::thread_rng();
        let mut scored: Vec<(i64, JunctionId)> = self
            .junctions
            .values()
            .map(|junction| {
                let score = match priority {
                    SeedPriority::Random => rng.gen_range(0..1_000_000),
                    SeedPriority::SpeedSum => -junction
                        .all_segments(true)
                        .iter()
                        .map(|s| self.segments[s].speed_limit() as i64)
                        .sum::<i64>(),
                };
                (score, junction.id())
            })
            .collect();
        scored.sort();
        scored.into_iter().map(|(_, junction)| junction).collect()
    }

    /// The currently installed partitions.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Installs a partition set, recording membership on the segments.
    pub fn set_partitions(&mut self, partitions: Vec<Partition>) {
        self.install_partitions(partitions);
    }

    fn install_partitions(&mut self, partitions: Vec<Partition>) {
        for segment in self.segments.values_mut() {
            segment.set_partition(None);
        }
        for partition in &partitions {
            for segment_id in partition.segment_ids() {
                if let Some(segment) = self.segments.get_mut(segment_id) {
                    segment.set_partition(Some(partition.id()));
                }
            }
        }
        self.partitions = partitions;
    }

    /// Writes the installed partitions in the binary partition-file layout.
    pub fn save_partitions(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u32(out, self.partitions.len() as u32)?;
        for partition in &self.partitions {
            partition.save_to(out)?;
        }
        Ok(())
    }

    /// Loads a partition set, replacing the installed one. A decode
    /// failure leaves the previously installed partitions untouched.
    pub fn load_partitions(&mut self, input: &mut dyn Read) -> Result<(), DecodeError> {
        let count = codec::read_u32(input)?;
        let mut partitions = Vec::new();
        for _ in 0..count {
            partitions.push(Partition::load(input, self)?);
        }
        self.install_partitions(partitions);
        Ok(())
    }
}

impl Index<SegmentId> for RoadNetwork {
    type Output = Segment;

    fn index(&self, id: SegmentId) -> &Segment {
        &self.segments[&id]
    }
}

impl Index<JunctionId> for RoadNetwork {
    type Output = Junction;

    fn index(&self, id: JunctionId) -> &Junction {
        &self.junctions[&id]
    }
}

#[cfg(test)]
mod tests {
    use super::geometry::SegmentGeometry;
    use super::*;

    fn segment(id: u32, from: u32, to: u32, geometry: SegmentGeometry) -> Segment {
        Segment::new(
            SegmentId(id),
            JunctionId(from),
            JunctionId(to),
            false,
            geometry,
            1000,
        )
    }

    #[test]
    fn add_and_remove_round_trip() {
        let mut net = RoadNetwork::new();
        let line = |x0, x1| {
            SegmentGeometry::line(PlanarVector::new(x0, 0), PlanarVector::new(x1, 0))
        };
        assert!(net.add_segment(segment(0, 1, 2, line(0, 1000))));
        assert!(net.add_segment(segment(1, 2, 3, line(1000, 2000))));
        assert!(!net.add_segment(segment(1, 2, 3, line(1000, 2000))));

        assert_eq!(net.segment_count(), 2);
        assert_eq!(net.junction_count(), 3);
        assert_eq!(net.next_segment_id(), SegmentId(2));
        assert_eq!(net.length_total(), 2000);

        let removed = net.remove_segment(SegmentId(1)).unwrap();
        assert_eq!(removed.id(), SegmentId(1));
        // junction 3 dropped to degree 0 and was pruned, junction 2 stays
        assert_eq!(net.segment_count(), 1);
        assert_eq!(net.junction_count(), 2);
        assert!(net.junction(JunctionId(3)).is_none());
        assert_eq!(net[JunctionId(2)].degree(), 1);
    }

    #[test]
    fn clockwise_reachability_around_a_junction() {
        // four spokes around junction 0: east, north, west, south
        let mut net = RoadNetwork::new();
        let center = PlanarVector::new(0, 0);
        let spokes = [
            (1, PlanarVector::new(1000, 0)),
            (2, PlanarVector::new(0, 1000)),
            (3, PlanarVector::new(-1000, 0)),
            (4, PlanarVector::new(0, -1000)),
        ];
        for (id, end) in spokes {
            net.add_segment(segment(id, 0, id, SegmentGeometry::line(center, end)));
        }
        // descending angle: south (3π/2), west (π), north (π/2), east (0)
        let order: Vec<SegmentId> = net[JunctionId(0)].reachable_segments().collect();
        assert_eq!(
            order,
            vec![SegmentId(4), SegmentId(3), SegmentId(2), SegmentId(1)]
        );
    }
}
