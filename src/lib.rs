pub use agent::{Agent, MobilityUpdate};
pub use error::{DecodeError, SimError};
pub use query::{LocationQuery, QueryKey};
pub use roadnet::geometry::SegmentGeometry;
pub use roadnet::junction::Junction;
pub use roadnet::partition::Partition;
pub use roadnet::route::{Route, RouteLeg};
pub use roadnet::segment::Segment;
pub use roadnet::{DistanceMode, RoadNetwork, SeedPriority, SpanningTree};
pub use scheduling::activity::{
    PeriodicTraceSavingActivity, SimActivity, TraceGenerationActivity, TraceGenerator,
    TraceLoadingActivity,
};
pub use scheduling::event::{
    AccelerationChangeEvent, LocationChangeEvent, QueryCreateEvent, QueryDeleteEvent, SimEvent,
    VelocityChangeEvent,
};
pub use scheduling::queue::EventQueue;
pub use simulation::{SimClock, Simulation};
pub use vector::{PlanarVector, RoadPosition, WorldVector};

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod agent;
mod codec;
mod error;
mod query;
pub mod roadnet;
pub mod scheduling;
mod simulation;
mod vector;

/// Simulation time in milliseconds.
pub type Timestamp = i64;

/// Unique ID of a [Segment].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentId(pub u32);

/// Unique ID of a [Junction].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JunctionId(pub u32);

/// Unique ID of an [Agent].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentId(pub u32);

/// Unique ID of a [Partition].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionId(pub u32);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for JunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
