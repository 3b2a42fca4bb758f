use std::time::Instant;

use traffic_nav::cgmath::MetricSpace;
use traffic_nav::{
    AgentSettings, KinematicVehicle, NetworkConfig, NoObstacles, RandomRoute, RegionTriggers,
    SegmentId, Simulation, TrafficResult,
};

/// The simulation time step in s.
const DT: f64 = 0.05;

/// The number of frames to simulate.
const NUM_FRAMES: usize = 12000;

/// A new agent is spawned at each entry at most this often, in s.
const SPAWN_INTERVAL: f64 = 3.0;

/// Agents are not spawned while another agent is this close to the spawn point, in m.
const SPAWN_CLEARANCE: f64 = 20.0;

fn main() -> TrafficResult<()> {
    let config = NetworkConfig::from_json(include_str!("../demos/crossroads.json"))?;
    let mut sim = Simulation::from_config(&config, RandomRoute::seeded(42))?;
    let mut triggers = RegionTriggers::new();

    // Segments nothing leads onto are where traffic enters the network
    let entries = sim
        .graph()
        .iter_segments()
        .map(|segment| segment.id())
        .filter(|id| {
            !sim.graph()
                .iter_segments()
                .any(|segment| segment.connected_segments().contains(id))
        })
        .collect::<Vec<SegmentId>>();

    println!(
        "Simulating {} segments, {} entries, {} intersections...",
        sim.graph().len(),
        entries.len(),
        sim.iter_intersections().count()
    );

    let mut spawned = 0;
    let mut completed = 0;
    let mut next_spawn = 0.0;
    let start = Instant::now();

    for _ in 0..NUM_FRAMES {
        if sim.time() >= next_spawn {
            next_spawn += SPAWN_INTERVAL;
            for &entry in &entries {
                let origin = sim.graph()[entry].start_sample();
                let blocked = sim.iter_agents().any(|agent_id| {
                    sim.vehicle_state(agent_id)
                        .map_or(false, |s| s.position.distance(origin.position) < SPAWN_CLEARANCE)
                });
                if !blocked {
                    let body = KinematicVehicle::new(origin.position, origin.forward, Default::default())
                        .with_speed(origin.speed_limit);
                    sim.add_agent(AgentSettings::default(), body, NoObstacles);
                    spawned += 1;
                }
            }
        }

        sim.step(DT);
        triggers.update(&mut sim);

        let finished = sim
            .iter_agents()
            .filter(|id| sim.navigator(*id).map_or(true, |nav| nav.is_idle()))
            .collect::<Vec<_>>();
        for agent_id in finished {
            sim.remove_agent(agent_id);
            completed += 1;
        }
    }

    let frame = start.elapsed() / NUM_FRAMES as u32;
    println!(
        "Simulated {:.0}s in {:?}: {} agents spawned, {} completed, {} still driving",
        sim.time(),
        start.elapsed(),
        spawned,
        completed,
        sim.iter_agents().count()
    );
    println!(
        "Avg. frame: {:?} --> {:.0}x speedup, {:.1} agents/min through the crossroads",
        frame,
        DT / frame.as_secs_f64(),
        completed as f64 / (sim.time() / 60.0)
    );

    Ok(())
}
