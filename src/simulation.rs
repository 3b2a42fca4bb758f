use crate::actuation::{Actuation, VehicleActuator, VehicleState};
use crate::agent::routing::RoutePolicy;
use crate::agent::speed::SpeedController;
use crate::agent::steering::{SteerMode, SteeringController};
use crate::agent::{IntersectionState, Navigator};
use crate::config::{AgentSettings, NetworkConfig};
use crate::error::TrafficResult;
use crate::graph::PathGraph;
use crate::intersection::{Intersection, IntersectionSettings};
use crate::sensor::ForwardSensor;
use crate::util::Interval;
use crate::{AgentId, IntersectionId, NavigatorSet};
use log::{debug, trace, warn};
use slotmap::{SecondaryMap, SlotMap};

/// A traffic simulation.
pub struct Simulation {
    /// The path network.
    graph: PathGraph,
    /// The intersections.
    intersections: SlotMap<IntersectionId, Intersection>,
    /// The path-following state of each agent.
    navigators: NavigatorSet,
    /// The controllers and vehicle of each agent.
    drivers: SecondaryMap<AgentId, Driver>,
    /// Chooses where agents go next.
    router: Box<dyn RoutePolicy>,
    /// The next intersection entry sequence number.
    seq: u64,
    /// The current frame of simulation.
    frame: usize,
    /// The simulated time in s.
    time: f64,
}

/// Everything that turns an agent's navigation state into vehicle commands.
struct Driver {
    settings: AgentSettings,
    steering: SteeringController,
    speed: SpeedController,
    body: Box<dyn VehicleActuator>,
    sensor: Box<dyn ForwardSensor>,
    /// The command applied on the last frame.
    actuation: Actuation,
}

impl Simulation {
    /// Creates a new simulation over the given network.
    pub fn new(graph: PathGraph, router: impl RoutePolicy + 'static) -> Self {
        Self {
            graph,
            intersections: SlotMap::with_key(),
            navigators: NavigatorSet::with_key(),
            drivers: SecondaryMap::new(),
            router: Box::new(router),
            seq: 0,
            frame: 0,
            time: 0.0,
        }
    }

    /// Creates a simulation from an authored network.
    pub fn from_config(config: &NetworkConfig, router: impl RoutePolicy + 'static) -> TrafficResult<Self> {
        let (graph, _) = config.build_graph()?;
        let mut sim = Self::new(graph, router);
        for intersection in &config.intersections {
            sim.add_intersection(intersection.bounds(), intersection.settings.clone());
        }
        Ok(sim)
    }

    /// Adds an intersection covering the given axis-aligned volume.
    pub fn add_intersection(
        &mut self,
        bounds: [Interval<f64>; 3],
        settings: IntersectionSettings,
    ) -> IntersectionId {
        let graph = &self.graph;
        self.intersections
            .insert_with_key(|id| Intersection::new(id, bounds, settings, graph))
    }

    /// Adds an agent driving the given vehicle, placed on the segment closest to it.
    pub fn add_agent(
        &mut self,
        settings: AgentSettings,
        body: impl VehicleActuator + 'static,
        sensor: impl ForwardSensor + 'static,
    ) -> AgentId {
        let position = body.state().position;
        let nav = Navigator::spawn(position, &self.graph, self.router.as_mut());
        let agent_id = self.navigators.insert(nav);
        self.drivers.insert(
            agent_id,
            Driver {
                steering: SteeringController::new(&settings),
                speed: SpeedController::new(&settings),
                settings,
                body: Box::new(body),
                sensor: Box::new(sensor),
                actuation: Actuation::idle(),
            },
        );
        agent_id
    }

    /// Removes an agent, releasing any intersection it is registered with.
    pub fn remove_agent(&mut self, agent_id: AgentId) {
        let intersection = self.navigators.get(agent_id).and_then(|nav| nav.intersection());
        if let Some(intersection) = intersection.and_then(|id| self.intersections.get_mut(id)) {
            intersection.exit(agent_id, &mut self.navigators);
        }
        self.navigators.remove(agent_id);
        self.drivers.remove(agent_id);
    }

    /// Notifies the simulation that an agent has entered an intersection's volume.
    pub fn on_region_enter(&mut self, intersection_id: IntersectionId, agent_id: AgentId) {
        let (Some(intersection), Some(nav)) = (
            self.intersections.get(intersection_id),
            self.navigators.get(agent_id),
        ) else {
            return;
        };

        let turn = nav
            .current_segment()
            .zip(nav.next_segment())
            .and_then(|(from, to)| intersection.find_turn(from, to));
        if turn.is_none() {
            trace!("Agent {:?} is not turning through {:?}", agent_id, intersection_id);
            return;
        }

        if let Some(previous) = nav.intersection().filter(|id| *id != intersection_id) {
            warn!(
                "Agent {:?} entered {:?} while still registered at {:?}",
                agent_id, intersection_id, previous
            );
            if let Some(previous) = self.intersections.get_mut(previous) {
                previous.exit(agent_id, &mut self.navigators);
            }
        }

        if self.intersections[intersection_id].enter(agent_id, self.seq, &mut self.navigators) {
            self.seq += 1;
        }
    }

    /// Notifies the simulation that an agent has left an intersection's volume.
    pub fn on_region_exit(&mut self, intersection_id: IntersectionId, agent_id: AgentId) {
        if let Some(intersection) = self.intersections.get_mut(intersection_id) {
            intersection.exit(agent_id, &mut self.navigators);
        }
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.update_navigators();
        self.update_intersections(dt);
        self.apply_controls(dt);
        self.frame += 1;
        self.time += dt;
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets the simulated time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Gets the path network.
    pub fn graph(&self) -> &PathGraph {
        &self.graph
    }

    /// Returns an iterator over the IDs of all the agents in the simulation.
    pub fn iter_agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.navigators.keys()
    }

    /// Returns an iterator over all the intersections in the simulation.
    pub fn iter_intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    /// Gets a reference to the intersection with the given ID.
    pub fn intersection(&self, intersection_id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(intersection_id)
    }

    /// Gets the navigation state of an agent.
    pub fn navigator(&self, agent_id: AgentId) -> Option<&Navigator> {
        self.navigators.get(agent_id)
    }

    /// Gets the kinematic state of an agent's vehicle.
    pub fn vehicle_state(&self, agent_id: AgentId) -> Option<VehicleState> {
        self.drivers.get(agent_id).map(|driver| driver.body.state())
    }

    /// Gets the command applied to an agent's vehicle on the last frame.
    pub fn actuation(&self, agent_id: AgentId) -> Option<Actuation> {
        self.drivers.get(agent_id).map(|driver| driver.actuation)
    }

    /// Gets the mode an agent steered with on the last frame.
    pub fn steer_mode(&self, agent_id: AgentId) -> Option<SteerMode> {
        self.drivers.get(agent_id).map(|driver| driver.steering.mode())
    }

    /// Gets the speed controller of an agent.
    pub fn speed_controller(&self, agent_id: AgentId) -> Option<&SpeedController> {
        self.drivers.get(agent_id).map(|driver| &driver.speed)
    }

    /// Gets an agent's state with respect to its intersection.
    pub fn intersection_state(&self, agent_id: AgentId) -> IntersectionState {
        self.navigators
            .get(agent_id)
            .map_or(IntersectionState::None, |nav| nav.intersection_state())
    }

    /// Gets how long an agent has been registered with its intersection, in s.
    pub fn time_in_intersection(&self, agent_id: AgentId) -> Option<f64> {
        let intersection = self.navigators.get(agent_id)?.intersection()?;
        Some(self.intersections.get(intersection)?.agent(agent_id)?.elapsed())
    }

    /// Re-projects every agent onto its path.
    fn update_navigators(&mut self) {
        for (agent_id, nav) in &mut self.navigators {
            if let Some(driver) = self.drivers.get(agent_id) {
                let segment = nav.current_segment();
                nav.update(driver.body.state().position, &self.graph, self.router.as_mut());
                if nav.is_idle() && segment.is_some() {
                    debug!("Agent {:?} reached the end of its route", agent_id);
                }
            }
        }
    }

    /// Advances the intersections' clocks and admits waiting agents.
    fn update_intersections(&mut self, dt: f64) {
        for intersection in self.intersections.values_mut() {
            intersection.update(dt, &mut self.navigators);
        }
    }

    /// Runs the controllers of every agent and applies the commands to their vehicles.
    fn apply_controls(&mut self, dt: f64) {
        for (agent_id, driver) in &mut self.drivers {
            let Some(nav) = self.navigators.get(agent_id) else {
                continue;
            };
            let state = driver.body.state();
            let command = if nav.is_idle() {
                Actuation::idle()
            } else {
                let steering = driver
                    .steering
                    .update(nav, &self.graph, &state, &driver.settings, dt);
                let reading = driver.sensor.sense(driver.settings.probe_distance);
                let power = driver
                    .speed
                    .update(nav, &state, &reading, &driver.settings, dt);
                Actuation::from_power(steering, power)
            };
            driver.body.actuate(command, dt);
            driver.actuation = command;
        }
    }
}
