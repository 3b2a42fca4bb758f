//! Authoring-time configuration.
//!
//! None of these values change while the simulation runs.

use crate::error::{TrafficError, TrafficResult};
use crate::graph::PathGraph;
use crate::intersection::IntersectionSettings;
use crate::math::Point3d;
use crate::pid::PidSettings;
use crate::segment::Waypoint;
use crate::util::Interval;
use crate::SegmentId;
use serde::{Deserialize, Serialize};

/// Per-agent tunables for the steering and speed controllers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// The agent's length in m.
    pub length: f64,

    /// Gains of the lateral path-following controller.
    pub steering_pid: PidSettings,
    /// Converts a heading error (in revolutions) to a steering input.
    pub direction_error_gain: f64,
    /// Distance from the path beyond which the agent steers straight back towards it.
    pub distance_correction_threshold: f64,
    /// Whether to steer directly at the path when far away from it.
    pub use_distance_correction: bool,
    /// Whether to steer by heading when facing away from the path.
    pub use_direction_correction: bool,
    /// The base lookahead distance in m.
    pub lookahead_distance: f64,
    /// Additional lookahead per m/s of speed.
    pub lookahead_speed_gain: f64,

    /// Gains of the stop-point controller.
    pub stop_pid: PidSettings,
    /// The fastest the speed-limit input may change, per second.
    pub speed_limit_max_change_rate: f64,
    /// Gain applied to the speed error while below the speed limit.
    pub speed_limit_throttle_gain: f64,
    /// Gain applied to the speed error while above the speed limit.
    pub speed_limit_brake_gain: f64,
    /// The gap to leave in front of a sensed obstacle, in m.
    pub default_stopping_distance: f64,
    /// The fraction of the agent's length added to the stopping gap.
    pub stopping_distance_length_multiplier: f64,
    /// How far ahead to probe with the forward sensor, in m.
    pub probe_distance: f64,
}

/// An authoring document describing a whole network.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub segments: Vec<SegmentConfig>,
    pub intersections: Vec<IntersectionConfig>,
}

/// An authored segment. Connections refer to other segments by index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub waypoints: Vec<Waypoint>,
    pub connected: Vec<usize>,
}

/// An authored intersection volume.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    /// The minimum corner of the axis-aligned volume.
    pub min: [f64; 3],
    /// The maximum corner of the axis-aligned volume.
    pub max: [f64; 3],
    pub settings: IntersectionSettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            length: 4.5,
            steering_pid: PidSettings {
                proportional_gain: 0.25,
                integral_gain: 0.02,
                derivative_gain: 0.35,
                integral_limit: 0.2,
            },
            direction_error_gain: 5.0,
            distance_correction_threshold: 5.0,
            use_distance_correction: true,
            use_direction_correction: true,
            lookahead_distance: 5.0,
            lookahead_speed_gain: 0.5,
            stop_pid: PidSettings {
                proportional_gain: 0.15,
                integral_gain: 0.0,
                derivative_gain: 0.3,
                integral_limit: 0.5,
            },
            speed_limit_max_change_rate: 1.0,
            speed_limit_throttle_gain: 0.15,
            speed_limit_brake_gain: 0.1,
            default_stopping_distance: 2.0,
            stopping_distance_length_multiplier: 0.5,
            probe_distance: 20.0,
        }
    }
}

impl AgentSettings {
    /// The gap to keep between the agent's centre and a sensed obstacle, in m.
    pub fn stopping_margin(&self) -> f64 {
        self.length * self.stopping_distance_length_multiplier + self.default_stopping_distance
    }
}

impl NetworkConfig {
    /// Parses a network from JSON.
    pub fn from_json(json: &str) -> TrafficResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the path graph, returning the segment IDs in authoring order.
    pub fn build_graph(&self) -> TrafficResult<(PathGraph, Vec<SegmentId>)> {
        let mut graph = PathGraph::new();
        let ids = self
            .segments
            .iter()
            .map(|segment| graph.add_segment(segment.waypoints.clone()))
            .collect::<TrafficResult<Vec<_>>>()?;

        for (from, segment) in self.segments.iter().enumerate() {
            for &to in &segment.connected {
                let to_id = *ids
                    .get(to)
                    .ok_or(TrafficError::InvalidConnection { from, to })?;
                graph.connect(ids[from], to_id)?;
            }
        }

        Ok((graph, ids))
    }
}

impl IntersectionConfig {
    /// The volume's extent along each axis.
    pub fn bounds(&self) -> [Interval<f64>; 3] {
        [0, 1, 2].map(|axis| {
            let (a, b) = (self.min[axis], self.max[axis]);
            Interval::new(a.min(b), a.max(b))
        })
    }

    /// Creates a volume from its centre and half extents.
    pub fn around(centre: Point3d, half_extents: [f64; 3], settings: IntersectionSettings) -> Self {
        Self {
            min: [
                centre.x - half_extents[0],
                centre.y - half_extents[1],
                centre.z - half_extents[2],
            ],
            max: [
                centre.x + half_extents[0],
                centre.y + half_extents[1],
                centre.z + half_extents[2],
            ],
            settings,
        }
    }
}
