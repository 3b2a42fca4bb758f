use crate::error::{TrafficError, TrafficResult};
use crate::math::{normalize_or, right_of, Point3d, Vector3d};
use crate::util::Interval;
use crate::SegmentId;
use cgmath::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Tolerance used against a sample's alpha to decide whether it sits at a segment boundary.
const BOUNDARY_EPSILON: f64 = 1e-6;

/// A point on a segment along with the speed limit from that point onwards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// The world space position.
    pub position: Point3d,
    /// The speed limit in m/s.
    pub speed_limit: f64,
}

/// A directed stretch of path made up of ordered waypoints.
#[derive(Clone, Debug)]
pub struct Segment {
    /// The segment ID.
    id: SegmentId,
    /// The waypoints, in driving order.
    waypoints: Vec<Waypoint>,
    /// The arc length from the first waypoint to each waypoint.
    cumulative: Vec<f64>,
    /// The unit direction of each edge between consecutive waypoints.
    directions: Vec<Vector3d>,
    /// The segments whose first waypoint can be reached from this segment's last waypoint.
    connected: SmallVec<[SegmentId; 4]>,
}

/// The result of sampling a [Segment].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathSample {
    /// The index of the waypoint at the start of the sampled edge.
    pub waypoint_index: usize,
    /// The distance along the segment in m.
    pub distance_along_segment: f64,
    /// The normalised position along the segment, in `[0, 1]`.
    pub alpha: f64,
    /// The remaining distance to the end of the segment in m.
    pub distance_to_end: f64,
    /// The world space position.
    pub position: Point3d,
    /// The unit vector in the direction of travel.
    pub forward: Vector3d,
    /// The unit vector to the right of the direction of travel.
    pub right: Vector3d,
    /// The speed limit in m/s.
    pub speed_limit: f64,
    /// Lateral offset of the queried point from the path, positive to the right.
    /// Zero for samples taken by distance.
    pub signed_offset: f64,
    /// Distance between the queried point and the path.
    /// Zero for samples taken by distance.
    pub distance_from_path: f64,
}

impl PathSample {
    /// Whether the sample lies at the start of its segment.
    pub fn is_at_start(&self) -> bool {
        self.alpha <= BOUNDARY_EPSILON
    }

    /// Whether the sample lies at the end of its segment.
    pub fn is_at_end(&self) -> bool {
        self.alpha >= 1.0 - BOUNDARY_EPSILON
    }

    /// Linearly interpolates between two samples.
    ///
    /// Directions are blended and renormalised; bookkeeping fields
    /// such as the waypoint index are taken from whichever side is nearer.
    pub fn lerp(&self, other: &PathSample, t: f64) -> PathSample {
        let t = Interval::unit().clamp(t);
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        let forward = normalize_or(self.forward.lerp(other.forward, t), self.forward);
        let nearest = if t < 0.5 { self } else { other };
        PathSample {
            waypoint_index: nearest.waypoint_index,
            distance_along_segment: lerp(self.distance_along_segment, other.distance_along_segment),
            alpha: nearest.alpha,
            distance_to_end: nearest.distance_to_end,
            position: self.position + (other.position - self.position) * t,
            forward,
            right: right_of(forward),
            speed_limit: lerp(self.speed_limit, other.speed_limit),
            signed_offset: lerp(self.signed_offset, other.signed_offset),
            distance_from_path: lerp(self.distance_from_path, other.distance_from_path),
        }
    }

    /// Recomputes the lateral offset fields relative to `point`.
    pub(crate) fn with_offset_to(mut self, point: Point3d) -> PathSample {
        let delta = point - self.position;
        self.signed_offset = self.right.dot(delta);
        self.distance_from_path = delta.magnitude();
        self
    }
}

impl Segment {
    /// Creates a new segment, failing if it has fewer than two waypoints
    /// or no length at all.
    pub(crate) fn new(id: SegmentId, waypoints: Vec<Waypoint>) -> TrafficResult<Self> {
        if waypoints.len() < 2 {
            return Err(TrafficError::TooFewWaypoints(waypoints.len()));
        }

        let mut cumulative = Vec::with_capacity(waypoints.len());
        cumulative.push(0.0);
        for pair in waypoints.windows(2) {
            let length = pair[0].position.distance(pair[1].position);
            cumulative.push(cumulative[cumulative.len() - 1] + length);
        }
        if cumulative[cumulative.len() - 1] <= 1e-9 {
            return Err(TrafficError::ZeroLengthSegment);
        }

        // Coincident waypoints borrow the direction of a neighbouring edge
        let mut directions: Vec<Option<Vector3d>> = waypoints
            .windows(2)
            .map(|pair| {
                let edge = pair[1].position - pair[0].position;
                (edge.magnitude2() > 1e-18).then(|| edge.normalize())
            })
            .collect();
        let first_valid = directions.iter().flatten().next().copied();
        let mut last = first_valid;
        for dir in &mut directions {
            if let Some(d) = *dir {
                last = Some(d);
            } else {
                *dir = last;
            }
        }
        let directions = directions
            .into_iter()
            .map(|d| d.unwrap_or_else(Vector3d::unit_x))
            .collect();

        Ok(Self {
            id,
            waypoints,
            cumulative,
            directions,
            connected: SmallVec::new(),
        })
    }

    /// Assigns the segment its key once it has been inserted into a graph.
    pub(crate) fn with_id(mut self, id: SegmentId) -> Self {
        self.id = id;
        self
    }

    /// Gets the segment's ID.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// The waypoints of the segment.
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// The first waypoint.
    pub fn first(&self) -> &Waypoint {
        &self.waypoints[0]
    }

    /// The last waypoint.
    pub fn last(&self) -> &Waypoint {
        &self.waypoints[self.waypoints.len() - 1]
    }

    /// The direction of the first edge.
    pub fn start_direction(&self) -> Vector3d {
        self.directions[0]
    }

    /// The direction of the last edge.
    pub fn end_direction(&self) -> Vector3d {
        self.directions[self.directions.len() - 1]
    }

    /// The length of the segment in m.
    pub fn total_length(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// The arc length from the start of the segment to each waypoint.
    pub fn cumulative_lengths(&self) -> &[f64] {
        &self.cumulative
    }

    /// The segments that can be driven onto from the end of this one.
    pub fn connected_segments(&self) -> &[SegmentId] {
        &self.connected
    }

    /// Adds a successor segment.
    pub(crate) fn add_connection(&mut self, segment_id: SegmentId) {
        if !self.connected.contains(&segment_id) {
            self.connected.push(segment_id);
        }
    }

    /// Samples the segment at a distance from its start.
    /// Distances outside the segment are clamped to its ends.
    pub fn sample_from_distance(&self, distance: f64) -> PathSample {
        let total = self.total_length();
        let distance = Interval::new(0.0, total).clamp(distance);

        // Find the edge containing `distance`
        let idx = self
            .cumulative
            .partition_point(|length| *length < distance)
            .clamp(1, self.waypoints.len() - 1)
            - 1;

        let edge = Interval::new(self.cumulative[idx], self.cumulative[idx + 1]);
        let t = if edge.length() > 1e-12 {
            edge.inv_lerp(distance)
        } else {
            0.0
        };
        self.sample_edge(idx, t, distance)
    }

    /// Samples the segment at a normalised position along it.
    pub fn sample_from_alpha(&self, alpha: f64) -> PathSample {
        self.sample_from_distance(alpha * self.total_length())
    }

    /// Samples the very start of the segment.
    pub fn start_sample(&self) -> PathSample {
        self.sample_from_distance(0.0)
    }

    /// Samples the very end of the segment.
    pub fn end_sample(&self) -> PathSample {
        self.sample_from_distance(self.total_length())
    }

    /// Finds the sample on the segment closest to the given point.
    pub fn sample_from_position(&self, point: Point3d) -> PathSample {
        let mut best: Option<(f64, PathSample)> = None;

        for idx in 0..self.waypoints.len() - 1 {
            let from = self.waypoints[idx].position;
            let edge_len = self.cumulative[idx + 1] - self.cumulative[idx];
            let t = if edge_len > 1e-12 {
                Interval::unit().clamp((point - from).dot(self.directions[idx]) / edge_len)
            } else {
                0.0
            };
            let distance = self.cumulative[idx] + t * edge_len;
            let sample = self.sample_edge(idx, t, distance);
            let dist2 = sample.position.distance2(point);

            if best.map_or(true, |(best_dist2, _)| dist2 < best_dist2) {
                best = Some((dist2, sample));
            }
        }

        // There is always at least one edge
        let (_, sample) = best.unwrap_or_else(|| (0.0, self.start_sample()));
        sample.with_offset_to(point)
    }

    /// Samples the edge starting at waypoint `idx` with interpolation factor `t`.
    fn sample_edge(&self, idx: usize, t: f64, distance: f64) -> PathSample {
        let from = &self.waypoints[idx];
        let to = &self.waypoints[idx + 1];
        let total = self.total_length();
        let forward = self.directions[idx];

        PathSample {
            waypoint_index: idx,
            distance_along_segment: distance,
            alpha: distance / total,
            distance_to_end: total - distance,
            position: from.position + (to.position - from.position) * t,
            forward,
            right: right_of(forward),
            speed_limit: Interval::new(from.speed_limit, to.speed_limit).lerp(t),
            signed_offset: 0.0,
            distance_from_path: 0.0,
        }
    }
}
