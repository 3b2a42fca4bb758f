//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use traffic_nav::cgmath::prelude::*;
use traffic_nav::math::{Point3d, Vector3d};
use traffic_nav::{
    Actuation, AgentId, AgentSettings, IntersectionId, IntersectionSettings, IntersectionState,
    KinematicVehicle, NetworkConfig, NoObstacles, PathGraph, RoutePolicy, Segment, SegmentId,
    Simulation, VehicleActuator, VehicleState,
};

/// A routing policy built once the segment IDs are known.
pub type Router = Box<dyn FnMut(&Segment, &PathGraph) -> Option<SegmentId>>;

/// The segments of the demo crossroads.
pub struct Crossroads {
    /// Eastbound, northbound, westbound and southbound approaches.
    pub approaches: [SegmentId; 4],
    /// Eastbound, northbound, westbound and southbound exits.
    pub exits: [SegmentId; 4],
    pub intersection: IntersectionId,
}

/// Builds a simulation of the demo crossroads with the given intersection settings.
pub fn crossroads<R, F>(settings: IntersectionSettings, router: F) -> (Simulation, Crossroads)
where
    R: RoutePolicy + 'static,
    F: FnOnce(&[SegmentId; 4], &[SegmentId; 4]) -> R,
{
    let config = NetworkConfig::from_json(include_str!("../../demos/crossroads.json")).unwrap();
    let (graph, ids) = config.build_graph().unwrap();
    let approaches = [ids[0], ids[1], ids[2], ids[3]];
    let exits = [ids[4], ids[5], ids[6], ids[7]];

    let mut sim = Simulation::new(graph, router(&approaches, &exits));
    let intersection = sim.add_intersection(config.intersections[0].bounds(), settings);
    (
        sim,
        Crossroads {
            approaches,
            exits,
            intersection,
        },
    )
}

/// Routes every approach onto the exit `offset` quarter turns to the right of straight on.
pub fn turning(offset: usize) -> impl FnOnce(&[SegmentId; 4], &[SegmentId; 4]) -> Router {
    move |approaches, exits| {
        let routes = (0..4)
            .map(|i| (approaches[i], exits[(i + offset) % 4]))
            .collect::<HashMap<_, _>>();
        Box::new(move |segment: &Segment, _: &PathGraph| routes.get(&segment.id()).copied())
    }
}

/// A vehicle that stays exactly where it is put.
pub struct Parked {
    pub position: Point3d,
    pub forward: Vector3d,
}

impl VehicleActuator for Parked {
    fn state(&self) -> VehicleState {
        VehicleState {
            position: self.position,
            velocity: Vector3d::zero(),
            forward: self.forward,
        }
    }

    fn actuate(&mut self, _command: Actuation, _dt: f64) {}
}

/// Parks a vehicle `distance` m before the end of a segment.
pub fn park(sim: &mut Simulation, segment: SegmentId, distance: f64) -> AgentId {
    let segment = &sim.graph()[segment];
    let sample = segment.sample_from_distance(segment.total_length() - distance);
    let body = Parked {
        position: sample.position,
        forward: sample.forward,
    };
    sim.add_agent(AgentSettings::default(), body, NoObstacles)
}

/// Spawns a kinematic vehicle at the start of a segment.
pub fn drive(sim: &mut Simulation, segment: SegmentId) -> AgentId {
    let sample = sim.graph()[segment].start_sample();
    let body = KinematicVehicle::new(sample.position, sample.forward, Default::default())
        .with_speed(sample.speed_limit);
    sim.add_agent(AgentSettings::default(), body, NoObstacles)
}

/// Asserts that no two moving agents in any intersection hold crossing turns.
pub fn assert_mutual_exclusion(sim: &Simulation) {
    for intersection in sim.iter_intersections() {
        let moving = intersection
            .agents()
            .iter()
            .filter(|a| a.state() == IntersectionState::Moving)
            .collect::<Vec<_>>();
        for a in &moving {
            for b in &moving {
                assert!(
                    !intersection.turns()[a.turn()].crosses(b.turn()),
                    "{:?} and {:?} are both moving on crossing turns",
                    a.agent_id(),
                    b.agent_id()
                );
            }
        }
    }
}
