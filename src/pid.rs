use crate::util::Interval;
use serde::{Deserialize, Serialize};

/// The gains and limits of a [PidController].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidSettings {
    /// Acts as a spring, pulling the error back towards zero.
    pub proportional_gain: f64,
    /// Acts as a memory, removing steady state error.
    pub integral_gain: f64,
    /// Acts as a damper, reducing oscillation.
    pub derivative_gain: f64,
    /// The largest magnitude the integral term may reach.
    pub integral_limit: f64,
}

/// The individual terms produced by one [PidController::evaluate] call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PidResult {
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    pub total: f64,
}

/// A proportional-integral-derivative feedback controller with anti-windup.
#[derive(Clone, Debug)]
pub struct PidController {
    settings: PidSettings,
    /// The integral term, already scaled by the integral gain.
    accumulated: f64,
}

impl Default for PidSettings {
    fn default() -> Self {
        Self {
            proportional_gain: 1.0,
            integral_gain: 0.0,
            derivative_gain: 0.0,
            integral_limit: 1.0,
        }
    }
}

impl PidController {
    /// Creates a new controller with an empty accumulator.
    pub fn new(settings: PidSettings) -> Self {
        Self {
            settings,
            accumulated: 0.0,
        }
    }

    /// Gets the controller's settings.
    pub fn settings(&self) -> &PidSettings {
        &self.settings
    }

    /// Clears the accumulated integral term.
    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }

    /// The current integral term.
    pub fn integral(&self) -> f64 {
        self.accumulated
    }

    /// Advances the controller by `dt` seconds.
    ///
    /// # Parameters
    /// * `error` - The current error
    /// * `error_rate` - The rate of change of the error
    /// * `dt` - The time step in s
    pub fn evaluate(&mut self, error: f64, error_rate: f64, dt: f64) -> PidResult {
        let s = &self.settings;
        let proportional = s.proportional_gain * error;
        let derivative = s.derivative_gain * error_rate;

        let limit = Interval::disc(0.0, s.integral_limit.abs());
        self.accumulated = limit.clamp(self.accumulated + error * s.integral_gain * dt);
        let integral = self.accumulated;

        PidResult {
            proportional,
            integral,
            derivative,
            total: proportional + integral + derivative,
        }
    }
}
