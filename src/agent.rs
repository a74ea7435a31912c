use crate::vector::{PlanarVector, RoadPosition, WorldVector};
use crate::{AgentId, Timestamp};

/// The most recent kinematic update applied to an agent, as carried by a
/// mobility-change event.
#[derive(Clone, Copy, Debug)]
pub struct MobilityUpdate {
    /// When the update took effect, in ms.
    pub timestamp: Timestamp,
    pub location: WorldVector,
    pub velocity: Option<WorldVector>,
    pub acceleration: Option<WorldVector>,
}

/// A simulated mobile agent.
///
/// An agent's kinematics are defined entirely by its latest mobility
/// update; positions at later times are extrapolated from it.
#[derive(Clone, Debug)]
pub struct Agent {
    id: AgentId,
    mobility: Option<MobilityUpdate>,
}

impl Agent {
    /// Creates an agent with no kinematic state yet.
    pub fn new(id: AgentId) -> Self {
        Self { id, mobility: None }
    }

    /// The agent ID.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The latest mobility update, if any.
    pub fn mobility(&self) -> Option<&MobilityUpdate> {
        self.mobility.as_ref()
    }

    /// Installs a new kinematic state, as mobility events do on execution.
    pub fn set_mobility(&mut self, update: MobilityUpdate) {
        self.mobility = Some(update);
    }

    /// The agent's location at `now`: `s = s₀ + v₀t + ½a₀t²` extrapolated
    /// from the latest update.
    pub fn location_at(&self, now: Timestamp) -> Option<WorldVector> {
        let update = self.mobility?;
        let dt = (now - update.timestamp) as f64 / 1000.0;
        Some(extrapolate(
            update.location,
            update.velocity,
            update.acceleration,
            dt,
        ))
    }

    /// The agent's velocity at `now`: `v = v₀ + a₀t`.
    pub fn velocity_at(&self, now: Timestamp) -> Option<WorldVector> {
        let update = self.mobility?;
        let velocity = update.velocity?;
        let dt = (now - update.timestamp) as f64 / 1000.0;
        Some(extrapolate(velocity, update.acceleration, None, dt))
    }

    /// The agent's acceleration, which is constant between updates.
    pub fn acceleration(&self) -> Option<WorldVector> {
        self.mobility.as_ref().and_then(|update| update.acceleration)
    }
}

/// `base + first·dt + second·dt²/2`, carried out in the base vector's own
/// representation. Terms in a different representation (or on a different
/// segment) cannot contribute and are ignored.
fn extrapolate(
    base: WorldVector,
    first: Option<WorldVector>,
    second: Option<WorldVector>,
    dt: f64,
) -> WorldVector {
    match base {
        WorldVector::Road(position) => {
            let mut progress = position.progress as f64;
            if let Some(WorldVector::Road(v)) = first {
                if v.segment == position.segment {
                    progress += v.progress as f64 * dt;
                    if let Some(WorldVector::Road(a)) = second {
                        if a.segment == position.segment {
                            progress += a.progress as f64 * dt * dt / 2.0;
                        }
                    }
                }
            }
            WorldVector::Road(RoadPosition::new(position.segment, progress as i32))
        }
        WorldVector::Planar(location) => {
            let mut x = location.x as f64;
            let mut y = location.y as f64;
            if let Some(WorldVector::Planar(v)) = first {
                x += v.x as f64 * dt;
                y += v.y as f64 * dt;
                if let Some(WorldVector::Planar(a)) = second {
                    x += a.x as f64 * dt * dt / 2.0;
                    y += a.y as f64 * dt * dt / 2.0;
                }
            }
            WorldVector::Planar(PlanarVector::new(x as i64, y as i64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SegmentId;

    #[test]
    fn road_kinematics_extrapolate() {
        let segment = SegmentId(3);
        let mut agent = Agent::new(AgentId(1));
        agent.set_mobility(MobilityUpdate {
            timestamp: 10_000,
            location: WorldVector::Road(RoadPosition::new(segment, 500)),
            velocity: Some(WorldVector::Road(RoadPosition::new(segment, 100))),
            acceleration: Some(WorldVector::Road(RoadPosition::new(segment, 10))),
        });

        // 2 s later: 500 + 100·2 + 10·4/2 = 720
        assert_eq!(
            agent.location_at(12_000),
            Some(WorldVector::Road(RoadPosition::new(segment, 720)))
        );
        // v = 100 + 10·2 = 120
        assert_eq!(
            agent.velocity_at(12_000),
            Some(WorldVector::Road(RoadPosition::new(segment, 120)))
        );
    }

    #[test]
    fn stationary_agent_stays_put() {
        let mut agent = Agent::new(AgentId(1));
        assert_eq!(agent.location_at(0), None);

        let location = WorldVector::Planar(PlanarVector::new(7, 9));
        agent.set_mobility(MobilityUpdate {
            timestamp: 0,
            location,
            velocity: None,
            acceleration: None,
        });
        assert_eq!(agent.location_at(60_000), Some(location));
        assert_eq!(agent.velocity_at(60_000), None);
    }
}
