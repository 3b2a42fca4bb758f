use crate::math::Vector3d;

/// The result of probing ahead of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    /// The clear distance ahead in m.
    /// Equal to the probe distance when nothing was hit.
    pub distance: f64,
    /// The velocity of whatever was hit, if anything was.
    pub hit_velocity: Option<Vector3d>,
}

/// Probes the road ahead of a vehicle for obstacles.
///
/// Collision sensing belongs to the physics layer; the speed controller only
/// consumes the reading.
pub trait ForwardSensor {
    /// Probes up to `probe_distance` m ahead.
    fn sense(&mut self, probe_distance: f64) -> SensorReading;
}

/// A sensor that never detects anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoObstacles;

impl SensorReading {
    /// A reading in which nothing was hit.
    pub fn clear(probe_distance: f64) -> Self {
        Self {
            distance: probe_distance,
            hit_velocity: None,
        }
    }

    /// A reading in which an obstacle was hit.
    pub fn hit(distance: f64, velocity: Vector3d) -> Self {
        Self {
            distance,
            hit_velocity: Some(velocity),
        }
    }

    /// Whether something was hit.
    pub fn is_hit(&self) -> bool {
        self.hit_velocity.is_some()
    }
}

impl ForwardSensor for NoObstacles {
    fn sense(&mut self, probe_distance: f64) -> SensorReading {
        SensorReading::clear(probe_distance)
    }
}

impl<F: FnMut(f64) -> SensorReading> ForwardSensor for F {
    fn sense(&mut self, probe_distance: f64) -> SensorReading {
        self(probe_distance)
    }
}
