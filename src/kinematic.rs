//! A simple kinematic vehicle body, for running the controllers without a physics engine.

use crate::actuation::{Actuation, VehicleActuator, VehicleState};
use crate::math::{normalize_or, right_of, Point3d, Vector3d};
use serde::{Deserialize, Serialize};

/// A kinematic bicycle model moving on the ground plane.
///
/// The rear axle follows the front, so the vehicle turns about a point in line with
/// its rear axle. There is no slip, drag or suspension.
#[derive(Clone, Debug)]
pub struct KinematicVehicle {
    /// The position of the vehicle's centre.
    position: Point3d,
    /// A unit vector in the direction the vehicle is facing.
    heading: Vector3d,
    /// The speed along the heading in m/s, never negative.
    speed: f64,
    attributes: KinematicAttributes,
}

/// The physical limits of a [KinematicVehicle].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicAttributes {
    /// The distance between the front and rear axles in m.
    pub wheel_base: f64,
    /// The steering angle at full lock in degrees.
    pub max_steer_angle: f64,
    /// The acceleration at full throttle in m/s^2.
    pub max_acc: f64,
    /// The deceleration at full brake in m/s^2.
    pub max_dec: f64,
    /// The top speed in m/s.
    pub max_speed: f64,
}

impl Default for KinematicAttributes {
    fn default() -> Self {
        Self {
            wheel_base: 2.7,
            max_steer_angle: 35.0,
            max_acc: 4.0,
            max_dec: 8.0,
            max_speed: 40.0,
        }
    }
}

impl KinematicVehicle {
    /// Creates a stationary vehicle.
    pub fn new(position: Point3d, heading: Vector3d, attributes: KinematicAttributes) -> Self {
        let heading = Vector3d::new(heading.x, 0.0, heading.z);
        Self {
            position,
            heading: normalize_or(heading, Vector3d::unit_x()),
            speed: 0.0,
            attributes,
        }
    }

    /// Sets the vehicle's speed in m/s.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.clamp(0.0, self.attributes.max_speed);
        self
    }

    pub fn position(&self) -> Point3d {
        self.position
    }

    /// A unit vector in the direction the vehicle is facing.
    pub fn heading(&self) -> Vector3d {
        self.heading
    }

    /// The vehicle's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn attributes(&self) -> &KinematicAttributes {
        &self.attributes
    }

    /// Rotates the heading by `angle` radians, positive to the right.
    fn rotate(&mut self, angle: f64) {
        let (sin, cos) = angle.sin_cos();
        let heading = cos * self.heading + sin * right_of(self.heading);
        self.heading = normalize_or(heading, self.heading);
    }
}

impl VehicleActuator for KinematicVehicle {
    fn state(&self) -> VehicleState {
        VehicleState {
            position: self.position,
            velocity: self.speed * self.heading,
            forward: self.heading,
        }
    }

    fn actuate(&mut self, command: Actuation, dt: f64) {
        let attrs = self.attributes;

        let speed = self.speed + command.throttle * attrs.max_acc * dt;
        let speed = speed - command.brake * attrs.max_dec * dt;
        let speed = speed.clamp(0.0, attrs.max_speed);
        let avg_speed = 0.5 * (self.speed + speed);
        self.speed = speed;

        let steer = (command.steering.clamp(-1.0, 1.0) * attrs.max_steer_angle).to_radians();
        let yaw = avg_speed * steer.tan() / attrs.wheel_base * dt;

        // Midpoint integration of the heading
        self.rotate(0.5 * yaw);
        self.position += avg_speed * dt * self.heading;
        self.rotate(0.5 * yaw);
    }
}
