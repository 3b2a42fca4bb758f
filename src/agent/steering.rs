use super::Navigator;
use crate::actuation::VehicleState;
use crate::config::AgentSettings;
use crate::graph::PathGraph;
use crate::math::{signed_ground_angle, Vector3d};
use crate::pid::PidController;
use crate::segment::PathSample;
use crate::util::Interval;
use cgmath::prelude::*;

/// How the steering controller is currently steering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SteerMode {
    /// Closed-loop tracking of the lateral offset from the path.
    #[default]
    Pid,
    /// Steering to match the path's heading.
    DirectionCorrection,
    /// Steering straight towards the path when far from it.
    DistanceCorrection,
}

/// Computes steering inputs that keep an agent on its path.
#[derive(Clone, Debug)]
pub struct SteeringController {
    pid: PidController,
    mode: SteerMode,
    /// The sample steered towards on the last update.
    target: Option<PathSample>,
}

impl SteeringController {
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            pid: PidController::new(settings.steering_pid),
            mode: SteerMode::Pid,
            target: None,
        }
    }

    /// The mode chosen on the last update.
    pub fn mode(&self) -> SteerMode {
        self.mode
    }

    /// The path sample steered towards on the last update.
    pub fn target(&self) -> Option<&PathSample> {
        self.target.as_ref()
    }

    /// Computes the steering input for this tick, in `[-1, 1]`.
    pub fn update(
        &mut self,
        nav: &Navigator,
        graph: &PathGraph,
        vehicle: &VehicleState,
        settings: &AgentSettings,
        dt: f64,
    ) -> f64 {
        let (Some(sample), Some(extended)) = (nav.current_sample(), nav.extended_sample()) else {
            self.pid.reset();
            self.target = None;
            return 0.0;
        };

        // Halfway between here and the lookahead point, which rounds off waypoint corners
        let lookahead = settings.lookahead_distance + vehicle.speed() * settings.lookahead_speed_gain;
        let ahead = nav
            .sample_from_distance_extended(extended.distance_along_segment + lookahead, graph)
            .unwrap_or(*extended);
        let target = extended.lerp(&ahead, 0.5).with_offset_to(vehicle.position);
        self.target = Some(target);

        let at_boundary = sample.is_at_start() || sample.is_at_end();
        let too_far = sample.distance_from_path > settings.distance_correction_threshold;
        let backwards = vehicle.forward.dot(target.forward) < 0.0;

        self.mode = if at_boundary && settings.use_direction_correction {
            SteerMode::DirectionCorrection
        } else if too_far && settings.use_distance_correction {
            SteerMode::DistanceCorrection
        } else if backwards && settings.use_direction_correction {
            SteerMode::DirectionCorrection
        } else {
            SteerMode::Pid
        };

        let steering = match self.mode {
            SteerMode::Pid => {
                let error = -target.signed_offset;
                let error_rate = -vehicle.velocity.dot(target.right);
                self.pid.evaluate(error, error_rate, dt).total
            }
            SteerMode::DirectionCorrection => steer_towards(vehicle, target.forward, settings),
            SteerMode::DistanceCorrection => {
                steer_towards(vehicle, target.position - vehicle.position, settings)
            }
        };

        // Stale error must not wind up while another mode is in control
        if self.mode != SteerMode::Pid {
            self.pid.reset();
        }

        Interval::disc(0.0, 1.0).clamp(steering)
    }
}

/// The steering input that turns the vehicle's heading towards `direction`.
fn steer_towards(vehicle: &VehicleState, direction: Vector3d, settings: &AgentSettings) -> f64 {
    signed_ground_angle(vehicle.forward, direction) / 360.0 * settings.direction_error_gain
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point3d;
    use crate::segment::Waypoint;
    use crate::SegmentId;

    fn graph() -> (PathGraph, SegmentId) {
        let mut graph = PathGraph::new();
        let id = graph
            .add_segment(vec![
                Waypoint {
                    position: Point3d::new(0.0, 0.0, 0.0),
                    speed_limit: 10.0,
                },
                Waypoint {
                    position: Point3d::new(100.0, 0.0, 0.0),
                    speed_limit: 10.0,
                },
            ])
            .unwrap();
        (graph, id)
    }

    fn vehicle(x: f64, z: f64, forward: Vector3d, speed: f64) -> VehicleState {
        VehicleState {
            position: Point3d::new(x, 0.0, z),
            velocity: forward * speed,
            forward,
        }
    }

    fn steer(state: &VehicleState, settings: &AgentSettings) -> (f64, SteerMode) {
        let (graph, id) = graph();
        let mut nav = Navigator::new(id, None);
        nav.update(state.position, &graph, &mut super::super::routing::FirstConnection);
        let mut controller = SteeringController::new(settings);
        let steering = controller.update(&nav, &graph, state, settings, 0.1);
        (steering, controller.mode())
    }

    #[test]
    fn pid_steers_back_towards_path() {
        let settings = AgentSettings::default();
        // +Z is right of +X, so an agent offset to +Z must steer left
        let (steering, mode) = steer(&vehicle(50.0, 1.0, Vector3d::unit_x(), 5.0), &settings);
        assert_eq!(mode, SteerMode::Pid);
        assert!(steering < 0.0);

        let (steering, _) = steer(&vehicle(50.0, -1.0, Vector3d::unit_x(), 5.0), &settings);
        assert!(steering > 0.0);
    }

    #[test]
    fn far_from_path_uses_distance_correction() {
        let settings = AgentSettings::default();
        let (steering, mode) = steer(&vehicle(50.0, 20.0, Vector3d::unit_x(), 5.0), &settings);
        assert_eq!(mode, SteerMode::DistanceCorrection);
        assert!(steering < 0.0);
    }

    #[test]
    fn facing_backwards_uses_direction_correction() {
        let settings = AgentSettings::default();
        let (_, mode) = steer(&vehicle(50.0, 0.5, -Vector3d::unit_x(), 2.0), &settings);
        assert_eq!(mode, SteerMode::DirectionCorrection);

        let settings = AgentSettings {
            use_direction_correction: false,
            ..Default::default()
        };
        let (_, mode) = steer(&vehicle(50.0, 0.5, -Vector3d::unit_x(), 2.0), &settings);
        assert_eq!(mode, SteerMode::Pid);
    }

    #[test]
    fn segment_start_forces_direction_correction() {
        let settings = AgentSettings::default();
        let heading = Vector3d::new(1.0, 0.0, 1.0).normalize();
        let (steering, mode) = steer(&vehicle(-2.0, 0.0, heading, 3.0), &settings);
        assert_eq!(mode, SteerMode::DirectionCorrection);
        // Heading is 45 degrees right of the path
        assert!(steering < 0.0);
    }

    #[test]
    fn accumulator_is_reset_outside_pid_mode() {
        let settings = AgentSettings::default();
        let (graph, id) = graph();
        let mut nav = Navigator::new(id, None);
        let mut controller = SteeringController::new(&settings);
        let mut router = super::super::routing::FirstConnection;

        let near = vehicle(50.0, 1.0, Vector3d::unit_x(), 5.0);
        nav.update(near.position, &graph, &mut router);
        for _ in 0..20 {
            controller.update(&nav, &graph, &near, &settings, 0.1);
        }
        assert!(controller.pid.integral() != 0.0);

        let far = vehicle(50.0, 20.0, Vector3d::unit_x(), 5.0);
        nav.update(far.position, &graph, &mut router);
        controller.update(&nav, &graph, &far, &settings, 0.1);
        assert_eq!(controller.pid.integral(), 0.0);
    }

    #[test]
    fn idle_navigator_holds_steering() {
        let settings = AgentSettings::default();
        let (graph, _) = graph();
        let mut controller = SteeringController::new(&settings);
        let state = vehicle(0.0, 0.0, Vector3d::unit_x(), 0.0);
        assert_eq!(controller.update(&Navigator::default(), &graph, &state, &settings, 0.1), 0.0);
    }
}
