//! The boundary between the navigation core and whatever moves the vehicle.

use crate::math::{Point3d, Vector3d};
use crate::util::{clamp01, Interval};
use cgmath::prelude::*;

/// A snapshot of a vehicle's kinematic state, supplied by the physics layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleState {
    /// The world space position of the vehicle's centre.
    pub position: Point3d,
    /// The world space velocity in m/s.
    pub velocity: Vector3d,
    /// A unit vector aligned with the vehicle's heading.
    pub forward: Vector3d,
}

/// Normalised control commands for a vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Actuation {
    /// Steering wheel input, `-1` is full left and `1` is full right.
    pub steering: f64,
    /// Throttle input in `[0, 1]`.
    pub throttle: f64,
    /// Brake input in `[0, 1]`.
    pub brake: f64,
}

/// A vehicle that reports its state and accepts control commands.
///
/// Implemented by the physics layer; the core never integrates motion itself.
pub trait VehicleActuator {
    /// The current kinematic state of the vehicle.
    fn state(&self) -> VehicleState;

    /// Applies a control command for a time step of `dt` seconds.
    fn actuate(&mut self, command: Actuation, dt: f64);
}

impl VehicleState {
    /// The speed along the vehicle's heading in m/s, negative when reversing.
    pub fn forward_speed(&self) -> f64 {
        self.velocity.dot(self.forward)
    }

    /// The magnitude of the velocity in m/s.
    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }
}

impl Actuation {
    /// A command that holds the vehicle still.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Builds a command from a steering input and a combined power input,
    /// where positive power is throttle and negative power is brake.
    pub fn from_power(steering: f64, power: f64) -> Self {
        Self {
            steering: Interval::disc(0.0, 1.0).clamp(steering),
            throttle: clamp01(power),
            brake: clamp01(-power),
        }
    }
}
