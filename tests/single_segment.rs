//! Tests that involve agents following a single segment, or a pair of them.

use std::cell::Cell;
use std::rc::Rc;
use traffic_nav::cgmath::prelude::*;
use traffic_nav::math::{Point3d, Vector3d};
use traffic_nav::{
    AgentSettings, FirstConnection, KinematicVehicle, NoObstacles, PathGraph, SensorReading,
    Simulation, Waypoint,
};

fn waypoint(x: f64, z: f64, speed_limit: f64) -> Waypoint {
    Waypoint {
        position: Point3d::new(x, 0.0, z),
        speed_limit,
    }
}

fn straight(length: f64) -> PathGraph {
    let mut graph = PathGraph::new();
    graph
        .add_segment(vec![waypoint(0.0, 0.0, 10.0), waypoint(length, 0.0, 10.0)])
        .unwrap();
    graph
}

/// Test that a vehicle's position increases monotonically as it pulls onto its path.
#[test]
fn vehicle_drives_forward() {
    let mut sim = Simulation::new(straight(400.0), FirstConnection);
    let body = KinematicVehicle::new(Point3d::new(0.0, 0.0, 1.5), Vector3d::unit_x(), Default::default());
    let agent = sim.add_agent(AgentSettings::default(), body, NoObstacles);

    let mut pos = sim.vehicle_state(agent).unwrap().position.x;
    for _ in 0..200 {
        sim.step(0.1);
        let next_pos = sim.vehicle_state(agent).unwrap().position.x;
        assert!(next_pos > pos);
        pos = next_pos;
    }

    let state = sim.vehicle_state(agent).unwrap();
    assert!(state.position.z.abs() < 0.3, "still {} m off the path", state.position.z);
    assert!((state.speed() - 10.0).abs() < 0.5, "driving at {} m/s", state.speed());
}

/// Test that a vehicle comes to rest short of an obstacle.
#[test]
fn agent_stops_at_obstacle() {
    const OBSTACLE: f64 = 150.0;

    let mut sim = Simulation::new(straight(400.0), FirstConnection);
    let x = Rc::new(Cell::new(0.0));
    let sensor = {
        let x = x.clone();
        move |probe_distance: f64| {
            let gap = OBSTACLE - x.get();
            if gap < probe_distance {
                SensorReading::hit(gap, Vector3d::zero())
            } else {
                SensorReading::clear(probe_distance)
            }
        }
    };
    let settings = AgentSettings::default();
    let margin = settings.stopping_margin();
    let body = KinematicVehicle::new(Point3d::new(0.0, 0.0, 0.0), Vector3d::unit_x(), Default::default());
    let agent = sim.add_agent(settings, body, sensor);

    for _ in 0..1200 {
        x.set(sim.vehicle_state(agent).unwrap().position.x);
        sim.step(0.05);
        assert!(sim.vehicle_state(agent).unwrap().position.x < OBSTACLE);
    }

    let state = sim.vehicle_state(agent).unwrap();
    assert!((state.position.x - (OBSTACLE - margin)).abs() < 1.0, "stopped at {}", state.position.x);
    assert!(state.speed() < 0.2);
    assert!(sim.speed_controller(agent).unwrap().stop_distance().is_some());
}

/// Test that a vehicle follows the gap between two segments and settles onto the second.
#[test]
fn vehicle_turns_across_gap() {
    let mut graph = PathGraph::new();
    let a = graph
        .add_segment(vec![waypoint(0.0, 0.0, 8.0), waypoint(50.0, 0.0, 8.0)])
        .unwrap();
    let b = graph
        .add_segment(vec![waypoint(55.0, 5.0, 8.0), waypoint(55.0, 80.0, 8.0)])
        .unwrap();
    graph.connect(a, b).unwrap();

    let mut sim = Simulation::new(graph, FirstConnection);
    let body = KinematicVehicle::new(Point3d::new(0.0, 0.0, 0.0), Vector3d::unit_x(), Default::default())
        .with_speed(8.0);
    let agent = sim.add_agent(AgentSettings::default(), body, NoObstacles);
    assert_eq!(sim.navigator(agent).unwrap().next_segment(), Some(b));

    let mut settled = false;
    for _ in 0..400 {
        sim.step(0.05);
        let nav = sim.navigator(agent).unwrap();
        let far_along = nav.current_segment() == Some(b)
            && nav.current_sample().map_or(false, |s| s.distance_along_segment > 50.0);
        if far_along {
            let position = sim.vehicle_state(agent).unwrap().position;
            assert!((position.x - 55.0).abs() < 1.0, "{} m off the second segment", position.x - 55.0);
            settled = true;
            break;
        }
    }
    assert!(settled, "never made it along the second segment");
}
