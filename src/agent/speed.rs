use super::{IntersectionState, Navigator};
use crate::actuation::VehicleState;
use crate::config::AgentSettings;
use crate::pid::PidController;
use crate::sensor::SensorReading;
use crate::util::{clamp01, move_towards};
use cgmath::prelude::*;

/// Computes the combined throttle/brake input of an agent.
///
/// Two inputs are blended conservatively: one tracking the speed limit and one bringing
/// the agent to rest at a stop point. The agent never accelerates harder than either
/// input asks for and brakes as hard as either demands.
#[derive(Clone, Debug)]
pub struct SpeedController {
    stop_pid: PidController,
    /// The rate-limited input from the speed limit, in `[-1, 1]` after clamping.
    speed_limit_input: f64,
    /// The input from the stop point.
    stop_input: f64,
    /// Distance to the stop point on the last update, if there was one.
    stop_distance: Option<f64>,
}

impl SpeedController {
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            stop_pid: PidController::new(settings.stop_pid),
            speed_limit_input: 0.0,
            stop_input: 1.0,
            stop_distance: None,
        }
    }

    /// The input tracking the speed limit.
    pub fn speed_limit_input(&self) -> f64 {
        self.speed_limit_input
    }

    /// The input bringing the agent to rest at its stop point.
    pub fn stop_input(&self) -> f64 {
        self.stop_input
    }

    /// The distance to the stop point, if there is one.
    pub fn stop_distance(&self) -> Option<f64> {
        self.stop_distance
    }

    /// Computes the combined power for this tick, positive for throttle and negative for brake.
    pub fn update(
        &mut self,
        nav: &Navigator,
        vehicle: &VehicleState,
        reading: &SensorReading,
        settings: &AgentSettings,
        dt: f64,
    ) -> f64 {
        let Some(sample) = nav.current_sample() else {
            self.speed_limit_input = 0.0;
            self.stop_input = 1.0;
            self.stop_distance = None;
            self.stop_pid.reset();
            return 0.0;
        };

        // Speed limit
        let speed = vehicle.velocity.dot(sample.forward);
        let gain = if speed > sample.speed_limit {
            settings.speed_limit_brake_gain
        } else {
            settings.speed_limit_throttle_gain
        };
        let target = (sample.speed_limit - speed) * gain;
        self.speed_limit_input = move_towards(
            self.speed_limit_input,
            target,
            settings.speed_limit_max_change_rate * dt,
        );

        // Stop point
        let obstacle = reading
            .is_hit()
            .then(|| reading.distance - settings.stopping_margin());
        let stop_line = (nav.intersection_state() == IntersectionState::Waiting)
            .then(|| sample.distance_to_end - settings.length / 2.0);
        self.stop_distance = match (obstacle, stop_line) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let forward_speed = vehicle.forward_speed();
        self.stop_input = match self.stop_distance {
            None => {
                self.stop_pid.reset();
                1.0
            }
            // Overshot the stop point
            Some(distance) if distance < 0.0 && forward_speed > 0.0 => -1.0,
            Some(distance) => self.stop_pid.evaluate(distance, -forward_speed, dt).total,
        };

        let (l, s) = (self.speed_limit_input, self.stop_input);
        clamp01(l.min(s)) - clamp01((-l).max(-s))
    }
}
