use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::agent::MobilityUpdate;
use crate::codec;
use crate::error::{DecodeError, SimError};
use crate::query::{LocationQuery, QueryKey};
use crate::simulation::Simulation;
use crate::vector::WorldVector;
use crate::{AgentId, Timestamp};

/// Type code of events that are never written to a trace.
pub const NON_PERSISTENT: u8 = 0;

// Execution priorities among events with equal timestamps;
// a lower number runs first.
pub const PRIORITY_TRACE_LOAD: i32 = 10;
pub const PRIORITY_MOBILITY_CHANGE: i32 = 20;
pub const PRIORITY_TRACE_SAVE: i32 = 30;
pub const PRIORITY_QUERY_CREATE: i32 = 40;
pub const PRIORITY_QUERY_DELETE: i32 = 40;

/// A scheduled, side-effecting simulation event.
///
/// Events run to completion and are the unit of atomicity; their relative
/// order is fully determined by `(timestamp, priority, insertion order)`.
pub trait SimEvent {
    /// Simulation time the event fires at, in ms.
    fn timestamp(&self) -> Timestamp;

    /// Ordering among events with the same timestamp; lower runs first.
    fn priority(&self) -> i32;

    /// One-byte persistence tag. [NON_PERSISTENT] events are
    /// scheduler-internal and never written to a trace.
    fn type_code(&self) -> u8;

    /// Writes the event as one trace record.
    fn save_to(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Applies the event against the simulation state.
    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError>;
}

/// Decodes one event payload. The record's type code and timestamp have
/// already been consumed from the stream.
pub type EventDecoder = fn(Timestamp, &mut dyn Read) -> Result<Box<dyn SimEvent>, DecodeError>;

/// The trace-persistent event set a simulation recognizes by default.
pub fn default_trace_events() -> Vec<(u8, EventDecoder)> {
    vec![
        (LocationChangeEvent::TYPE_CODE, LocationChangeEvent::decode),
        (VelocityChangeEvent::TYPE_CODE, VelocityChangeEvent::decode),
        (
            AccelerationChangeEvent::TYPE_CODE,
            AccelerationChangeEvent::decode,
        ),
        (QueryCreateEvent::TYPE_CODE, QueryCreateEvent::decode),
        (QueryDeleteEvent::TYPE_CODE, QueryDeleteEvent::decode),
    ]
}

/// Moves an agent to a new location.
pub struct LocationChangeEvent {
    timestamp: Timestamp,
    agent: AgentId,
    location: WorldVector,
}

impl LocationChangeEvent {
    pub const TYPE_CODE: u8 = b'l';

    pub fn new(timestamp: Timestamp, agent: AgentId, location: WorldVector) -> Self {
        Self {
            timestamp,
            agent,
            location,
        }
    }

    fn decode(timestamp: Timestamp, input: &mut dyn Read) -> Result<Box<dyn SimEvent>, DecodeError> {
        let agent = AgentId(codec::read_u32(input)?);
        let location = WorldVector::load(input)?;
        Ok(Box::new(Self {
            timestamp,
            agent,
            location,
        }))
    }
}

impl SimEvent for LocationChangeEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn priority(&self) -> i32 {
        PRIORITY_MOBILITY_CHANGE
    }

    fn type_code(&self) -> u8 {
        Self::TYPE_CODE
    }

    fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u8(out, Self::TYPE_CODE)?;
        codec::write_i64(out, self.timestamp)?;
        codec::write_u32(out, self.agent.0)?;
        self.location.save_to(out)
    }

    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError> {
        sim.apply_mobility(
            self.agent,
            MobilityUpdate {
                timestamp: self.timestamp,
                location: self.location,
                velocity: None,
                acceleration: None,
            },
        )
    }
}

/// Sets an agent's velocity, pinning its location at the same instant.
pub struct VelocityChangeEvent {
    timestamp: Timestamp,
    agent: AgentId,
    location: WorldVector,
    velocity: WorldVector,
}

impl VelocityChangeEvent {
    pub const TYPE_CODE: u8 = b'v';

    pub fn new(
        timestamp: Timestamp,
        agent: AgentId,
        location: WorldVector,
        velocity: WorldVector,
    ) -> Self {
        Self {
            timestamp,
            agent,
            location,
            velocity,
        }
    }

    fn decode(timestamp: Timestamp, input: &mut dyn Read) -> Result<Box<dyn SimEvent>, DecodeError> {
        let agent = AgentId(codec::read_u32(input)?);
        let location = WorldVector::load(input)?;
        let velocity = WorldVector::load(input)?;
        Ok(Box::new(Self {
            timestamp,
            agent,
            location,
            velocity,
        }))
    }
}

impl SimEvent for VelocityChangeEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn priority(&self) -> i32 {
        PRIORITY_MOBILITY_CHANGE
    }

    fn type_code(&self) -> u8 {
        Self::TYPE_CODE
    }

    fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u8(out, Self::TYPE_CODE)?;
        codec::write_i64(out, self.timestamp)?;
        codec::write_u32(out, self.agent.0)?;
        self.location.save_to(out)?;
        self.velocity.save_to(out)
    }

    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError> {
        sim.apply_mobility(
            self.agent,
            MobilityUpdate {
                timestamp: self.timestamp,
                location: self.location,
                velocity: Some(self.velocity),
                acceleration: None,
            },
        )
    }
}

/// Sets an agent's acceleration, pinning its location and velocity at the
/// same instant.
pub struct AccelerationChangeEvent {
    timestamp: Timestamp,
    agent: AgentId,
    location: WorldVector,
    velocity: WorldVector,
    acceleration: WorldVector,
}

impl AccelerationChangeEvent {
    pub const TYPE_CODE: u8 = b'a';

    pub fn new(
        timestamp: Timestamp,
        agent: AgentId,
        location: WorldVector,
        velocity: WorldVector,
        acceleration: WorldVector,
    ) -> Self {
        Self {
            timestamp,
            agent,
            location,
            velocity,
            acceleration,
        }
    }

    fn decode(timestamp: Timestamp, input: &mut dyn Read) -> Result<Box<dyn SimEvent>, DecodeError> {
        let agent = AgentId(codec::read_u32(input)?);
        let location = WorldVector::load(input)?;
        let velocity = WorldVector::load(input)?;
        let acceleration = WorldVector::load(input)?;
        Ok(Box::new(Self {
            timestamp,
            agent,
            location,
            velocity,
            acceleration,
        }))
    }
}

impl SimEvent for AccelerationChangeEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn priority(&self) -> i32 {
        PRIORITY_MOBILITY_CHANGE
    }

    fn type_code(&self) -> u8 {
        Self::TYPE_CODE
    }

    fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u8(out, Self::TYPE_CODE)?;
        codec::write_i64(out, self.timestamp)?;
        codec::write_u32(out, self.agent.0)?;
        self.location.save_to(out)?;
        self.velocity.save_to(out)?;
        self.acceleration.save_to(out)
    }

    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError> {
        sim.apply_mobility(
            self.agent,
            MobilityUpdate {
                timestamp: self.timestamp,
                location: self.location,
                velocity: Some(self.velocity),
                acceleration: Some(self.acceleration),
            },
        )
    }
}

/// Registers a location-based query with the simulation.
pub struct QueryCreateEvent {
    timestamp: Timestamp,
    key: QueryKey,
    query: LocationQuery,
}

impl QueryCreateEvent {
    pub const TYPE_CODE: u8 = b'c';

    pub fn new(timestamp: Timestamp, key: QueryKey, query: LocationQuery) -> Self {
        Self {
            timestamp,
            key,
            query,
        }
    }

    fn decode(timestamp: Timestamp, input: &mut dyn Read) -> Result<Box<dyn SimEvent>, DecodeError> {
        let key = QueryKey::load(input)?;
        let query = LocationQuery::load(input)?;
        Ok(Box::new(Self {
            timestamp,
            key,
            query,
        }))
    }
}

impl SimEvent for QueryCreateEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn priority(&self) -> i32 {
        PRIORITY_QUERY_CREATE
    }

    fn type_code(&self) -> u8 {
        Self::TYPE_CODE
    }

    fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u8(out, Self::TYPE_CODE)?;
        codec::write_i64(out, self.timestamp)?;
        self.key.save_to(out)?;
        self.query.save_to(out)
    }

    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError> {
        sim.simulate_add_query(self.key, self.query);
        Ok(())
    }
}

/// Withdraws a previously registered query.
pub struct QueryDeleteEvent {
    timestamp: Timestamp,
    key: QueryKey,
}

impl QueryDeleteEvent {
    pub const TYPE_CODE: u8 = b'd';

    pub fn new(timestamp: Timestamp, key: QueryKey) -> Self {
        Self { timestamp, key }
    }

    fn decode(timestamp: Timestamp, input: &mut dyn Read) -> Result<Box<dyn SimEvent>, DecodeError> {
        let key = QueryKey::load(input)?;
        Ok(Box::new(Self { timestamp, key }))
    }
}

impl SimEvent for QueryDeleteEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn priority(&self) -> i32 {
        PRIORITY_QUERY_DELETE
    }

    fn type_code(&self) -> u8 {
        Self::TYPE_CODE
    }

    fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u8(out, Self::TYPE_CODE)?;
        codec::write_i64(out, self.timestamp)?;
        self.key.save_to(out)
    }

    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError> {
        sim.simulate_remove_query(self.key);
        Ok(())
    }
}

/// Scheduler-internal sentinel that loads the next chunk of a trace
/// stream. Loading enqueues a successor sentinel when records remain, so
/// memory stays bounded regardless of trace size.
pub struct TraceLoadEvent {
    timestamp: Timestamp,
    input: Box<dyn Read>,
}

impl TraceLoadEvent {
    pub fn new(timestamp: Timestamp, input: Box<dyn Read>) -> Self {
        Self { timestamp, input }
    }
}

impl SimEvent for TraceLoadEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn priority(&self) -> i32 {
        PRIORITY_TRACE_LOAD
    }

    fn type_code(&self) -> u8 {
        NON_PERSISTENT
    }

    fn save_to(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError> {
        let TraceLoadEvent { input, .. } = *self;
        sim.queue_mut().load_some(input)?;
        Ok(())
    }
}

/// Scheduler-internal event that snapshots every agent's extrapolated
/// planar location to a trace writer, then reschedules itself one period
/// later.
pub struct PeriodicTraceSaveEvent {
    timestamp: Timestamp,
    /// Snapshot period in ms.
    period: i64,
    output: Rc<RefCell<dyn Write>>,
}

impl PeriodicTraceSaveEvent {
    pub fn new(timestamp: Timestamp, period: i64, output: Rc<RefCell<dyn Write>>) -> Self {
        Self {
            timestamp,
            period,
            output,
        }
    }
}

impl SimEvent for PeriodicTraceSaveEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn priority(&self) -> i32 {
        PRIORITY_TRACE_SAVE
    }

    fn type_code(&self) -> u8 {
        NON_PERSISTENT
    }

    fn save_to(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn execute(self: Box<Self>, sim: &mut Simulation) -> Result<(), SimError> {
        {
            let mut out = self.output.borrow_mut();
            let mut ids: Vec<AgentId> = sim.agents().map(|agent| agent.id()).collect();
            ids.sort();
            for id in ids {
                let location = sim.agent(id).and_then(|agent| agent.location_at(self.timestamp));
                let planar = match location {
                    Some(WorldVector::Road(position)) => {
                        sim.world().locate(position).map(WorldVector::Planar)
                    }
                    Some(planar @ WorldVector::Planar(_)) => Some(planar),
                    None => None,
                };
                if let Some(planar) = planar {
                    LocationChangeEvent::new(self.timestamp, id, planar).save_to(&mut *out)?;
                }
            }
        }
        let next = PeriodicTraceSaveEvent::new(
            self.timestamp + self.period,
            self.period,
            self.output.clone(),
        );
        sim.add_event(Box::new(next));
        Ok(())
    }
}
