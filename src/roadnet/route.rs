use std::cell::Cell;
use std::collections::VecDeque;

use crate::roadnet::RoadNetwork;
use crate::vector::RoadPosition;
use crate::SegmentId;

/// One traversed segment of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteLeg {
    /// The traversed segment.
    pub segment: SegmentId,
    /// Whether travel follows the segment's source-to-target orientation.
    pub forward: bool,
}

/// An ordered traversal of segments connecting two road positions.
///
/// Consecutive legs share a junction consistent with their direction flags.
/// Length and travel time are computed lazily and cached.
#[derive(Clone, Debug)]
pub struct Route {
    source: RoadPosition,
    target: RoadPosition,
    legs: VecDeque<RouteLeg>,
    /// Cached length in mm.
    length: Cell<Option<i64>>,
    /// Cached minimum travel time in s.
    travel_time: Cell<Option<f64>>,
}

impl Route {
    pub(crate) fn new(source: RoadPosition, target: RoadPosition) -> Self {
        Self {
            source,
            target,
            legs: VecDeque::new(),
            length: Cell::new(None),
            travel_time: Cell::new(None),
        }
    }

    /// The route's starting position.
    pub fn source(&self) -> RoadPosition {
        self.source
    }

    /// The route's final position.
    pub fn target(&self) -> RoadPosition {
        self.target
    }

    /// Number of traversed segments.
    pub fn segment_count(&self) -> usize {
        self.legs.len()
    }

    /// The legs of the route, in travel order.
    pub fn legs(&self) -> impl Iterator<Item = RouteLeg> + '_ {
        self.legs.iter().copied()
    }

    /// The i-th leg of the route.
    pub fn leg(&self, i: usize) -> Option<RouteLeg> {
        self.legs.get(i).copied()
    }

    pub(crate) fn push_front(&mut self, segment: SegmentId, forward: bool) {
        self.legs.push_front(RouteLeg { segment, forward });
        self.length.set(None);
        self.travel_time.set(None);
    }

    pub(crate) fn push_back(&mut self, segment: SegmentId, forward: bool) {
        self.legs.push_back(RouteLeg { segment, forward });
        self.length.set(None);
        self.travel_time.set(None);
    }

    /// Installs a length already known to the caller, e.g. from a
    /// precomputed partition distance table.
    pub(crate) fn set_length(&self, length: i64) {
        self.length.set(Some(length));
    }

    /// Total length of the route in mm: the partial distances on the first
    /// and last segments plus the full lengths of the interior segments.
    pub fn length(&self, net: &RoadNetwork) -> i64 {
        if let Some(length) = self.length.get() {
            return length;
        }
        let length = if self.legs.len() > 1 {
            self.end_remainders(net).0
                + self
                    .legs
                    .iter()
                    .skip(1)
                    .take(self.legs.len() - 2)
                    .map(|leg| net[leg.segment].length() as i64)
                    .sum::<i64>()
        } else {
            (self.source.progress as i64 - self.target.progress as i64).abs()
        };
        self.length.set(Some(length));
        length
    }

    /// Minimum time to travel the route, always moving at each segment's
    /// speed limit, in seconds.
    pub fn travel_time(&self, net: &RoadNetwork) -> f64 {
        if let Some(time) = self.travel_time.get() {
            return time;
        }
        let time = if self.legs.len() > 1 {
            let (_, first, last) = self.end_remainders(net);
            let mut time = first + last;
            for leg in self.legs.iter().skip(1).take(self.legs.len() - 2) {
                let segment = &net[leg.segment];
                time += segment.length() as f64 / segment.speed_limit() as f64;
            }
            time
        } else {
            let speed = net[self.source.segment].speed_limit() as f64;
            (self.source.progress as f64 - self.target.progress as f64).abs() / speed
        };
        self.travel_time.set(Some(time));
        time
    }

    /// Partial distances on the first and last segments: summed length in
    /// mm, and each end's travel time in s.
    fn end_remainders(&self, net: &RoadNetwork) -> (i64, f64, f64) {
        let first = self.legs[0];
        let segment = &net[first.segment];
        let head = if first.forward {
            (segment.length() - self.source.progress) as i64
        } else {
            self.source.progress as i64
        };
        let head_time = head as f64 / segment.speed_limit() as f64;

        let last = self.legs[self.legs.len() - 1];
        let segment = &net[last.segment];
        let tail = if last.forward {
            self.target.progress as i64
        } else {
            (segment.length() - self.target.progress) as i64
        };
        let tail_time = tail as f64 / segment.speed_limit() as f64;

        (head + tail, head_time, tail_time)
    }
}
