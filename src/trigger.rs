//! Region enter and exit events for hosts without their own collision detection.

use crate::simulation::Simulation;
use crate::{AgentId, IntersectionId};
use itertools::Itertools;
use std::collections::HashSet;

/// Tracks which agents are inside which intersection volumes and reports the changes
/// to the simulation.
///
/// An agent counts as inside a volume while the centre of its vehicle is.
#[derive(Clone, Debug, Default)]
pub struct RegionTriggers {
    inside: HashSet<(IntersectionId, AgentId)>,
}

impl RegionTriggers {
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether an agent was inside an intersection's volume on the last update.
    pub fn is_inside(&self, intersection_id: IntersectionId, agent_id: AgentId) -> bool {
        self.inside.contains(&(intersection_id, agent_id))
    }

    /// Fires enter and exit events for every agent whose containment changed since the
    /// last update. Exits are reported before entries.
    pub fn update(&mut self, sim: &mut Simulation) {
        let mut now_inside = HashSet::with_capacity(self.inside.len());
        for intersection in sim.iter_intersections() {
            for agent_id in sim.iter_agents() {
                let inside = sim
                    .vehicle_state(agent_id)
                    .map_or(false, |state| intersection.contains(state.position));
                if inside {
                    now_inside.insert((intersection.id(), agent_id));
                }
            }
        }

        // Sorted so that entry sequence numbers do not depend on hashing
        let exited = self.inside.difference(&now_inside).copied().sorted().collect::<Vec<_>>();
        let entered = now_inside.difference(&self.inside).copied().sorted().collect::<Vec<_>>();
        for (intersection_id, agent_id) in exited {
            sim.on_region_exit(intersection_id, agent_id);
        }
        for (intersection_id, agent_id) in entered {
            sim.on_region_enter(intersection_id, agent_id);
        }
        self.inside = now_inside;
    }
}
