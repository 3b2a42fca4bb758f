//! Right-of-way arbitration at intersections.
//!
//! Each turn through an intersection is treated as a resource. An agent holds its turn
//! while [Moving](IntersectionState::Moving) and queues for it while
//! [Waiting](IntersectionState::Waiting); crossing turns may not be held at the same time.
//! Admission is greedy and non-preemptive, so a timeout evicts agents that wait too long.

use crate::agent::IntersectionState;
use crate::graph::PathGraph;
use crate::math::{signed_ground_angle, Point3d};
use crate::util::Interval;
use crate::{AgentId, IntersectionId, NavigatorSet, SegmentId};
use cgmath::prelude::*;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;

mod turn;

pub use turn::Turn;

/// Approach directions with a dot product below this are considered opposing.
const OPPOSING_DOT: f64 = -0.5;

/// Turn angles closer than this are considered equal, in degrees.
const ANGLE_EPSILON: f64 = 1e-3;

/// An intersection volume and the agents passing through it.
#[derive(Clone, Debug)]
pub struct Intersection {
    /// The intersection ID.
    id: IntersectionId,
    /// The axis-aligned volume.
    bounds: [Interval<f64>; 3],
    settings: IntersectionSettings,
    /// The turns that start and end within the volume.
    turns: Vec<Turn>,
    /// The registered agents, in registration order.
    agents: Vec<IntersectionAgent>,
}

/// The arbitration settings of an intersection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionSettings {
    /// Decides which waiting agent is considered first.
    pub policy: PriorityPolicy,
    /// The longest an agent may wait before it is evicted, in s.
    pub max_time_in_intersection: f64,
    /// Whether agents are released as soon as they reach their destination segment.
    pub early_exit: bool,
}

/// The order in which waiting agents are admitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityPolicy {
    /// Agents go in the order they arrived, or in lane order within a lane; nobody may
    /// overtake a blocked agent.
    #[default]
    FirstInFirstOut,
    /// Agents are ordered by where they approach from and how they turn.
    DirectionAndTurnAngle {
        /// Which turn goes first when two agents approach from opposite directions.
        opposing: TurnPreference,
        /// Which side yields when two agents approach from different directions.
        crossing: HandPriority,
    },
    /// Any agent whose turn is clear may go.
    TurnOccupationOnly,
}

/// Which of two opposing turns has priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnPreference {
    /// The turn further to the left goes first.
    Left,
    /// The turn further to the right goes first.
    #[default]
    Right,
}

/// Which approach side has priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandPriority {
    /// Agents yield to traffic approaching from their right.
    #[default]
    Right,
    /// Agents yield to traffic approaching from their left.
    Left,
}

/// The availability of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnOccupancy {
    /// No moving agent holds this or a crossing turn.
    Clear,
    /// A moving agent holds a crossing turn.
    Blocked,
    /// A moving agent holds this turn.
    Occupied,
}

/// An agent registered with an intersection.
#[derive(Clone, Debug)]
pub struct IntersectionAgent {
    agent_id: AgentId,
    /// Index of the turn the agent is making.
    turn: usize,
    /// The global sequence number assigned on entry.
    seq: u64,
    state: IntersectionState,
    /// Time spent registered with the intersection in s.
    elapsed: f64,
}

impl Default for IntersectionSettings {
    fn default() -> Self {
        Self {
            policy: PriorityPolicy::FirstInFirstOut,
            max_time_in_intersection: 30.0,
            early_exit: false,
        }
    }
}

impl IntersectionAgent {
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Index of the turn the agent is making.
    pub fn turn(&self) -> usize {
        self.turn
    }

    /// The sequence number assigned when the agent entered.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn state(&self) -> IntersectionState {
        self.state
    }

    /// Time spent registered with the intersection in s.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl Intersection {
    /// Creates an intersection, finding every turn within its volume.
    pub(crate) fn new(
        id: IntersectionId,
        bounds: [Interval<f64>; 3],
        settings: IntersectionSettings,
        graph: &PathGraph,
    ) -> Self {
        let turns = turn::find_turns(&bounds, graph);
        debug!(
            "Intersection {:?} has {} turns and {} crossings",
            id,
            turns.len(),
            turns.iter().map(|t| t.crossing_turns().len()).sum::<usize>() / 2
        );
        Self {
            id,
            bounds,
            settings,
            turns,
            agents: vec![],
        }
    }

    /// Gets the intersection ID.
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    /// The axis-aligned volume of the intersection.
    pub fn bounds(&self) -> &[Interval<f64>; 3] {
        &self.bounds
    }

    pub fn settings(&self) -> &IntersectionSettings {
        &self.settings
    }

    /// Whether a point lies within the intersection's volume.
    pub fn contains(&self, point: Point3d) -> bool {
        turn::volume_contains(&self.bounds, point)
    }

    /// The turns through the intersection.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Finds the turn from one segment onto another.
    pub fn find_turn(&self, from: SegmentId, to: SegmentId) -> Option<usize> {
        self.turns.iter().position(|t| t.from() == from && t.to() == to)
    }

    /// The registered agents, in registration order.
    pub fn agents(&self) -> &[IntersectionAgent] {
        &self.agents
    }

    /// Gets a registered agent.
    pub fn agent(&self, agent_id: AgentId) -> Option<&IntersectionAgent> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    /// Whether the agent is registered with this intersection.
    pub fn is_registered(&self, agent_id: AgentId) -> bool {
        self.agent(agent_id).is_some()
    }

    /// The availability of the turn at index `turn`.
    pub fn occupancy(&self, turn: usize) -> TurnOccupancy {
        let mut occupancy = TurnOccupancy::Clear;
        for agent in self.agents.iter().filter(|a| a.state == IntersectionState::Moving) {
            if agent.turn == turn {
                return TurnOccupancy::Occupied;
            }
            if self.turns[turn].crosses(agent.turn) {
                occupancy = TurnOccupancy::Blocked;
            }
        }
        occupancy
    }

    /// Registers an agent that has entered the volume and runs an admission pass.
    ///
    /// Returns whether the agent was registered. Agents that are not making one of the
    /// intersection's turns are ignored.
    pub(crate) fn enter(&mut self, agent_id: AgentId, seq: u64, navs: &mut NavigatorSet) -> bool {
        let Some(nav) = navs.get_mut(agent_id) else {
            return false;
        };
        if self.is_registered(agent_id) {
            trace!("Agent {:?} is already registered at {:?}", agent_id, self.id);
            return false;
        }

        let turn = nav
            .current_segment()
            .zip(nav.next_segment())
            .and_then(|(from, to)| self.find_turn(from, to));
        let Some(turn) = turn else {
            trace!("Agent {:?} is not turning through {:?}", agent_id, self.id);
            return false;
        };

        nav.set_intersection(Some(self.id), IntersectionState::Waiting);
        self.agents.push(IntersectionAgent {
            agent_id,
            turn,
            seq,
            state: IntersectionState::Waiting,
            elapsed: 0.0,
        });
        trace!("Agent {:?} waiting at {:?} (seq {})", agent_id, self.id, seq);

        self.admit(navs);
        true
    }

    /// Removes an agent that has left the volume and runs an admission pass.
    pub(crate) fn exit(&mut self, agent_id: AgentId, navs: &mut NavigatorSet) {
        if self.release(agent_id, navs) {
            self.admit(navs);
        }
    }

    /// Advances the intersection's clock, evicting agents that have waited too long and
    /// releasing agents that have finished their turn early.
    pub(crate) fn update(&mut self, dt: f64, navs: &mut NavigatorSet) {
        // Agents removed from the simulation without exiting
        self.agents.retain(|a| navs.contains_key(a.agent_id));

        for agent in &mut self.agents {
            agent.elapsed += dt;
        }

        let max_time = self.settings.max_time_in_intersection;
        let timed_out = self
            .agents
            .iter()
            .filter(|a| a.state == IntersectionState::Waiting && a.elapsed > max_time)
            .map(|a| a.agent_id)
            .collect::<SmallVec<[AgentId; 4]>>();
        for agent_id in timed_out {
            warn!(
                "Agent {:?} waited more than {}s at {:?} and was evicted",
                agent_id, max_time, self.id
            );
            self.release(agent_id, navs);
        }

        if self.settings.early_exit {
            let finished = self
                .agents
                .iter()
                .filter(|a| a.state == IntersectionState::Moving)
                .filter(|a| {
                    let to = self.turns[a.turn].to();
                    navs.get(a.agent_id).map_or(false, |nav| {
                        nav.current_segment() == Some(to)
                            && nav.current_sample().map_or(false, |s| !s.is_at_start())
                    })
                })
                .map(|a| a.agent_id)
                .collect::<SmallVec<[AgentId; 4]>>();
            for agent_id in finished {
                trace!("Agent {:?} finished its turn through {:?}", agent_id, self.id);
                self.release(agent_id, navs);
            }
        }

        self.admit(navs);
    }

    /// Unregisters an agent without running an admission pass.
    /// Returns whether the agent was registered.
    pub(crate) fn release(&mut self, agent_id: AgentId, navs: &mut NavigatorSet) -> bool {
        let Some(idx) = self.agents.iter().position(|a| a.agent_id == agent_id) else {
            return false;
        };
        self.agents.remove(idx);
        if let Some(nav) = navs.get_mut(agent_id) {
            if nav.intersection() == Some(self.id) {
                nav.set_intersection(None, IntersectionState::None);
            }
        }
        true
    }

    /// Grants passage to as many waiting agents as possible, in priority order.
    fn admit(&mut self, navs: &mut NavigatorSet) {
        let mut pending = (0..self.agents.len())
            .filter(|&idx| self.agents[idx].state == IntersectionState::Waiting)
            .collect::<SmallVec<[usize; 8]>>();
        // Turns wanted by higher-priority agents that could not go yet
        let mut reserved = SmallVec::<[usize; 8]>::new();

        while !pending.is_empty() {
            let pos = (1..pending.len()).fold(0, |best, pos| {
                if self.compare(pending[pos], pending[best], navs) == Ordering::Less {
                    pos
                } else {
                    best
                }
            });
            let idx = pending.remove(pos);
            let turn = self.agents[idx].turn;

            let reserved_conflict = reserved
                .iter()
                .any(|&other| other == turn || self.turns[turn].crosses(other));
            let can_go = self.occupancy(turn) == TurnOccupancy::Clear
                && !reserved_conflict
                && !self.is_queued(idx, navs);

            if can_go {
                let agent = &mut self.agents[idx];
                agent.state = IntersectionState::Moving;
                if let Some(nav) = navs.get_mut(agent.agent_id) {
                    nav.set_intersection_state(IntersectionState::Moving);
                }
                debug!("Agent {:?} may proceed through {:?}", agent.agent_id, self.id);
                continue;
            }

            match self.settings.policy {
                PriorityPolicy::FirstInFirstOut => break,
                PriorityPolicy::DirectionAndTurnAngle { .. } => reserved.push(turn),
                PriorityPolicy::TurnOccupationOnly => {}
            }
        }
    }

    /// Whether a waiting agent on the same origin segment is nearer the stop line.
    fn is_queued(&self, idx: usize, navs: &NavigatorSet) -> bool {
        let from = self.turns[self.agents[idx].turn].from();
        let own = self.stop_line_distance(idx, navs);
        self.agents.iter().enumerate().any(|(other, agent)| {
            other != idx
                && agent.state == IntersectionState::Waiting
                && self.turns[agent.turn].from() == from
                && (self.stop_line_distance(other, navs), agent.seq) < (own, self.agents[idx].seq)
        })
    }

    /// The distance remaining to the end of the agent's origin segment.
    fn stop_line_distance(&self, idx: usize, navs: &NavigatorSet) -> f64 {
        let agent = &self.agents[idx];
        match navs.get(agent.agent_id) {
            Some(nav) if nav.current_segment() == Some(self.turns[agent.turn].from()) => {
                nav.distance_to_end()
            }
            // Already past the stop line
            Some(_) => 0.0,
            None => f64::INFINITY,
        }
    }

    /// Orders two registered agents by priority; `Less` means `a` goes first.
    fn compare(&self, a: usize, b: usize, navs: &NavigatorSet) -> Ordering {
        let by_seq = self.agents[a].seq.cmp(&self.agents[b].seq);
        let (ta, tb) = (&self.turns[self.agents[a].turn], &self.turns[self.agents[b].turn]);

        // Agents in the same lane go in lane order under every policy
        if ta.from() == tb.from() {
            let (da, db) = (self.stop_line_distance(a, navs), self.stop_line_distance(b, navs));
            return da.partial_cmp(&db).unwrap_or(Ordering::Equal).then(by_seq);
        }

        let PriorityPolicy::DirectionAndTurnAngle { opposing, crossing } = self.settings.policy else {
            return by_seq;
        };

        let approach_dot = ta.approach_direction().dot(tb.approach_direction());
        let by_policy = if approach_dot < OPPOSING_DOT {
            if (ta.angle() - tb.angle()).abs() < ANGLE_EPSILON {
                Ordering::Equal
            } else {
                let a_right_of_b = ta.angle() > tb.angle();
                match (opposing, a_right_of_b) {
                    (TurnPreference::Right, true) | (TurnPreference::Left, false) => Ordering::Less,
                    _ => Ordering::Greater,
                }
            }
        } else {
            // Negative when b approaches from a's right
            let angle = signed_ground_angle(ta.approach_direction(), tb.approach_direction());
            if angle.abs() < ANGLE_EPSILON {
                Ordering::Equal
            } else {
                match (crossing, angle < 0.0) {
                    (HandPriority::Right, true) | (HandPriority::Left, false) => Ordering::Greater,
                    _ => Ordering::Less,
                }
            }
        };
        by_policy.then(by_seq)
    }
}
