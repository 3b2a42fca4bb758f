use self::routing::RoutePolicy;
use crate::graph::PathGraph;
use crate::math::{normalize_or, Point3d};
use crate::segment::{PathSample, Segment};
use crate::{IntersectionId, SegmentId};
use cgmath::prelude::*;
use log::{debug, error};

pub mod routing;
pub mod speed;
pub mod steering;

/// Gaps shorter than this between consecutive segments are treated as joined, in m.
const MIN_GAP: f64 = 1e-6;

/// An agent's standing with respect to the intersection it is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IntersectionState {
    /// Not registered with any intersection.
    #[default]
    None,
    /// Registered and waiting for permission to proceed.
    Waiting,
    /// Granted permission and proceeding through its turn.
    Moving,
}

/// The path-following state of one agent.
#[derive(Clone, Debug, Default)]
pub struct Navigator {
    /// The segment the agent is currently following.
    current: Option<SegmentId>,
    /// The segment the agent will follow after this one.
    next: Option<SegmentId>,
    /// The agent's position projected onto the current segment.
    sample: Option<PathSample>,
    /// The agent's position projected onto the current segment, extended across the
    /// gap to the next one.
    extended: Option<PathSample>,
    /// The intersection the agent is registered with.
    intersection: Option<IntersectionId>,
    /// The agent's state within that intersection.
    intersection_state: IntersectionState,
}

impl Navigator {
    /// Creates a navigator following `current`, then `next`.
    pub fn new(current: SegmentId, next: Option<SegmentId>) -> Self {
        Self {
            current: Some(current),
            next,
            ..Default::default()
        }
    }

    /// Places a navigator on the segment closest to `position`.
    ///
    /// If the graph is empty the navigator is left idle and an error is logged.
    pub fn spawn(position: Point3d, graph: &PathGraph, router: &mut dyn RoutePolicy) -> Self {
        let mut nav = Self::default();
        match graph.closest_segment(position) {
            Some((segment_id, _)) => {
                nav.current = Some(segment_id);
                nav.next = router.pick_next(&graph[segment_id], graph);
                nav.update_samples(position, graph);
            }
            None => error!("No segment found for agent at {:?}", position),
        }
        nav
    }

    /// The segment the agent is currently following.
    pub fn current_segment(&self) -> Option<SegmentId> {
        self.current
    }

    /// The segment the agent will follow after the current one.
    pub fn next_segment(&self) -> Option<SegmentId> {
        self.next
    }

    /// The agent's position projected onto the current segment.
    pub fn current_sample(&self) -> Option<&PathSample> {
        self.sample.as_ref()
    }

    /// The agent's position projected onto the path extended towards the next segment.
    pub fn extended_sample(&self) -> Option<&PathSample> {
        self.extended.as_ref()
    }

    /// Whether the navigator has no segment to follow.
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// The agent's state within its intersection.
    pub fn intersection_state(&self) -> IntersectionState {
        self.intersection_state
    }

    /// The intersection the agent is registered with.
    pub fn intersection(&self) -> Option<IntersectionId> {
        self.intersection
    }

    /// The remaining distance to the end of the current segment, in m.
    pub fn distance_to_end(&self) -> f64 {
        self.sample.map_or(f64::INFINITY, |s| s.distance_to_end)
    }

    pub(crate) fn set_intersection(&mut self, intersection: Option<IntersectionId>, state: IntersectionState) {
        self.intersection = intersection;
        self.intersection_state = state;
    }

    pub(crate) fn set_intersection_state(&mut self, state: IntersectionState) {
        self.intersection_state = state;
    }

    /// Re-projects the agent onto its path and advances to the next segment
    /// once the end of the current one is reached.
    pub fn update(&mut self, position: Point3d, graph: &PathGraph, router: &mut dyn RoutePolicy) {
        let Some(segment_id) = self.current else {
            return;
        };
        self.update_samples(position, graph);

        if self.sample.map_or(false, |s| s.is_at_end()) {
            self.current = self.next;
            self.next = self
                .current
                .and_then(|id| graph.segment(id))
                .and_then(|segment| router.pick_next(segment, graph));
            debug!("Agent left segment {:?} for {:?}", segment_id, self.current);
            self.update_samples(position, graph);
        }
    }

    fn update_samples(&mut self, position: Point3d, graph: &PathGraph) {
        let Some(segment) = self.current.and_then(|id| graph.segment(id)) else {
            self.current = None;
            self.sample = None;
            self.extended = None;
            return;
        };
        let sample = segment.sample_from_position(position);
        self.sample = Some(sample);
        self.extended = Some(self.project_extended(segment, sample, position, graph));
    }

    /// Projects past the end of the current segment onto the gap leading to the next one.
    fn project_extended(&self, segment: &Segment, sample: PathSample, position: Point3d, graph: &PathGraph) -> PathSample {
        let Some(next) = self.next.and_then(|id| graph.segment(id)) else {
            return sample;
        };
        if !sample.is_at_end() {
            return sample;
        }

        let end = segment.last().position;
        let gap = next.first().position - end;
        let gap_len = gap.magnitude();
        if gap_len < MIN_GAP {
            return sample;
        }

        let t = (position - end).dot(gap) / (gap_len * gap_len);
        if t <= 0.0 {
            return sample;
        }
        let distance = segment.total_length() + t.min(1.0) * gap_len;
        Self::extend(segment, Some(next), distance).with_offset_to(position)
    }

    /// Samples the path at `distance` from the start of the current segment, continuing
    /// across the gap onto the next segment when the distance exceeds the current one.
    ///
    /// Samples in the gap interpolate between the end of the current segment and the
    /// start of the next; samples on the next segment are relative to that segment.
    pub fn sample_from_distance_extended(&self, distance: f64, graph: &PathGraph) -> Option<PathSample> {
        let segment = graph.segment(self.current?)?;
        let next = self.next.and_then(|id| graph.segment(id));
        Some(Self::extend(segment, next, distance))
    }

    fn extend(segment: &Segment, next: Option<&Segment>, distance: f64) -> PathSample {
        let total = segment.total_length();
        let Some(next) = next.filter(|_| distance > total) else {
            return segment.sample_from_distance(distance);
        };

        let end = segment.end_sample();
        let start = next.start_sample();
        let gap = end.position.distance(start.position);
        let beyond = distance - total;

        if beyond >= gap {
            return next.sample_from_distance(beyond - gap);
        }

        let t = beyond / gap;
        let mut sample = end.lerp(&start, t);
        sample.forward = normalize_or(end.forward.lerp(start.forward, t), end.forward);
        sample.distance_along_segment = distance;
        sample.distance_to_end = 0.0;
        sample.alpha = 1.0;
        sample.waypoint_index = end.waypoint_index;
        sample
    }
}
