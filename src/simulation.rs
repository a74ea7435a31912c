use std::collections::HashMap;
use std::mem;

use log::info;

use crate::agent::{Agent, MobilityUpdate};
use crate::error::SimError;
use crate::query::{LocationQuery, QueryKey};
use crate::roadnet::RoadNetwork;
use crate::scheduling::activity::SimActivity;
use crate::scheduling::event::{default_trace_events, SimEvent};
use crate::scheduling::queue::EventQueue;
use crate::{AgentId, SegmentId, Timestamp};

/// Log a progress line every this many executed events.
const PROGRESS_EVERY: u64 = 1_000_000;

/// Simulation time bounds and current time, in ms.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimClock {
    start: Timestamp,
    end: Timestamp,
    warmup: Timestamp,
    now: Timestamp,
}

impl SimClock {
    /// Absolute time the simulation starts at.
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Absolute time the simulation ends at.
    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Warmup duration after the start, before measurements begin.
    pub fn warmup(&self) -> Timestamp {
        self.warmup
    }

    /// Current simulation time.
    pub fn now(&self) -> Timestamp {
        self.now
    }
}

/// A discrete-event simulation of mobile agents over a road network.
///
/// Lifecycle: construct empty, configure through the setters, [init],
/// then [run] or [run_to], and finally [end]. Everything runs on one
/// thread; events are the unit of atomicity.
#[derive(Default)]
pub struct Simulation {
    world: RoadNetwork,
    agents: HashMap<AgentId, Agent>,
    /// Segment → agents currently on it. Buckets are created lazily.
    agent_index: HashMap<SegmentId, Vec<AgentId>>,
    queries: HashMap<QueryKey, LocationQuery>,
    queue: EventQueue,
    activities: Vec<Box<dyn SimActivity>>,
    clock: SimClock,
}

impl Simulation {
    /// Creates an unconfigured simulation.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the absolute start/end times and the warmup duration, in ms.
    pub fn set_times(&mut self, start: Timestamp, end: Timestamp, warmup: Timestamp) {
        self.clock.start = start;
        self.clock.end = end;
        self.clock.warmup = warmup;
    }

    /// The simulation clock.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Current simulation time in ms.
    pub fn time(&self) -> Timestamp {
        self.clock.now
    }

    /// Installs the road network.
    pub fn set_world(&mut self, world: RoadNetwork) {
        self.world = world;
    }

    pub fn world(&self) -> &RoadNetwork {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut RoadNetwork {
        &mut self.world
    }

    /// Replaces the agent registry.
    pub fn set_agents(&mut self, agents: Vec<Agent>) {
        self.agents = agents.into_iter().map(|agent| (agent.id(), agent)).collect();
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Iterates over all agents, in no particular order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Agents currently on the given segment.
    pub fn agents_on_segment(&self, segment: SegmentId) -> &[AgentId] {
        self.agent_index
            .get(&segment)
            .map_or(&[], |bucket| bucket.as_slice())
    }

    /// Moves an agent between segment buckets when its segment changes.
    /// A planar location takes the agent out of the index.
    pub fn update_agent_index(
        &mut self,
        agent: AgentId,
        new_segment: Option<SegmentId>,
    ) -> Result<(), SimError> {
        let old_segment = self
            .agents
            .get(&agent)
            .ok_or(SimError::UnknownAgent(agent))?
            .mobility()
            .and_then(|update| update.location.segment());
        if old_segment == new_segment {
            return Ok(());
        }
        if let Some(old) = old_segment {
            if let Some(bucket) = self.agent_index.get_mut(&old) {
                bucket.retain(|id| *id != agent);
            }
        }
        if let Some(new) = new_segment {
            self.agent_index.entry(new).or_default().push(agent);
        }
        Ok(())
    }

    /// Applies a mobility update: re-indexes the agent, then installs the
    /// update as its current kinematic state.
    pub fn apply_mobility(&mut self, agent: AgentId, update: MobilityUpdate) -> Result<(), SimError> {
        self.update_agent_index(agent, update.location.segment())?;
        if let Some(agent) = self.agents.get_mut(&agent) {
            agent.set_mobility(update);
        }
        Ok(())
    }

    /// Registers an active query.
    pub fn simulate_add_query(&mut self, key: QueryKey, query: LocationQuery) {
        self.queries.insert(key, query);
    }

    /// Withdraws an active query.
    pub fn simulate_remove_query(&mut self, key: QueryKey) -> Option<LocationQuery> {
        self.queries.remove(&key)
    }

    /// The currently active queries.
    pub fn queries(&self) -> impl Iterator<Item = (&QueryKey, &LocationQuery)> {
        self.queries.iter()
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Enqueues an event.
    pub fn add_event(&mut self, event: Box<dyn SimEvent>) {
        self.queue.add_event(event);
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    /// Attaches an activity; it seeds its events at [init].
    pub fn add_activity(&mut self, activity: Box<dyn SimActivity>) {
        self.activities.push(activity);
    }

    /// Puts the simulation into its initial pre-run state: allocates a
    /// fresh queue and agent index, registers the default trace events and
    /// gives every activity the chance to seed events.
    pub fn init(&mut self) -> Result<(), SimError> {
        self.queue = EventQueue::new();
        self.queue.set_loadable_events(&default_trace_events())?;
        self.agent_index = HashMap::new();
        self.queries = HashMap::new();
        self.clock.now = self.clock.start;

        info!("scheduling {} activities", self.activities.len());
        let mut activities = mem::take(&mut self.activities);
        let result = activities
            .iter_mut()
            .try_for_each(|activity| activity.schedule_on(self));
        self.activities = activities;
        result
    }

    /// Runs the main loop: pops and executes events, advancing the clock
    /// to each event's timestamp, until the queue drains or the next event
    /// would fall at or past the configured end time.
    pub fn run(&mut self) -> Result<(), SimError> {
        info!("running simulation");
        let mut processed: u64 = 0;
        while self
            .queue
            .next_event_time()
            .map_or(false, |next| next < self.clock.end)
        {
            let Some(event) = self.queue.pop() else {
                break;
            };
            self.clock.now = event.timestamp();
            event.execute(self)?;
            processed += 1;
            if processed % PROGRESS_EVERY == 1 {
                info!(
                    "{} events queued, simTime= {:.1} min",
                    self.queue.len(),
                    self.clock.now as f64 / 60_000.0
                );
            }
        }
        info!("done, {} events executed", processed);
        Ok(())
    }

    /// Runs quietly up to and including time `t`, so the agent state is
    /// exactly the state at `t`. Shares [run]'s pop/execute primitive but
    /// skips the instrumentation.
    pub fn run_to(&mut self, t: Timestamp) -> Result<(), SimError> {
        while self
            .queue
            .next_event_time()
            .map_or(false, |next| next <= t)
        {
            let Some(event) = self.queue.pop() else {
                break;
            };
            self.clock.now = event.timestamp();
            event.execute(self)?;
        }
        self.clock.now = t;
        Ok(())
    }

    /// Cleans up after the run, releasing resources held by activities.
    pub fn end(&mut self) {
        let mut activities = mem::take(&mut self.activities);
        for activity in &mut activities {
            activity.cleanup();
        }
        self.activities = activities;
    }
}
