use crate::error::{TrafficError, TrafficResult};
use crate::math::Point3d;
use crate::segment::{PathSample, Segment, Waypoint};
use crate::{SegmentId, SegmentSet};
use slotmap::Key;

/// A static directed graph of path segments.
///
/// Built once while authoring, then shared read-only with the simulation.
#[derive(Clone, Default)]
pub struct PathGraph {
    /// The segments in the graph.
    segments: SegmentSet,
}

impl PathGraph {
    /// Creates an empty path graph.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a segment to the graph.
    pub fn add_segment(&mut self, waypoints: Vec<Waypoint>) -> TrafficResult<SegmentId> {
        let segment = Segment::new(SegmentId::null(), waypoints)?;
        Ok(self
            .segments
            .insert_with_key(|id| segment.with_id(id)))
    }

    /// Specifies that the end of the `from` segment connects to the start of the `to` segment.
    pub fn connect(&mut self, from: SegmentId, to: SegmentId) -> TrafficResult<()> {
        if !self.segments.contains_key(to) {
            return Err(TrafficError::UnknownSegment(to));
        }
        self.segments
            .get_mut(from)
            .ok_or(TrafficError::UnknownSegment(from))?
            .add_connection(to);
        Ok(())
    }

    /// Gets a reference to the segment with the given ID.
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    /// Returns an iterator over all the segments in the graph.
    pub fn iter_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// The number of segments in the graph.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the graph has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Finds the segment passing closest to `point`, along with the projected sample.
    pub fn closest_segment(&self, point: Point3d) -> Option<(SegmentId, PathSample)> {
        self.segments
            .iter()
            .map(|(id, segment)| (id, segment.sample_from_position(point)))
            .min_by(|a, b| a.1.distance_from_path.total_cmp(&b.1.distance_from_path))
    }

    pub(crate) fn segments(&self) -> &SegmentSet {
        &self.segments
    }
}

impl std::ops::Index<SegmentId> for PathGraph {
    type Output = Segment;

    fn index(&self, id: SegmentId) -> &Segment {
        &self.segments[id]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn straight(graph: &mut PathGraph, z: f64) -> SegmentId {
        graph
            .add_segment(vec![
                Waypoint {
                    position: Point3d::new(0.0, 0.0, z),
                    speed_limit: 10.0,
                },
                Waypoint {
                    position: Point3d::new(20.0, 0.0, z),
                    speed_limit: 10.0,
                },
            ])
            .unwrap()
    }

    #[test]
    fn closest_segment_is_found() {
        let mut graph = PathGraph::new();
        let near = straight(&mut graph, 0.0);
        let far = straight(&mut graph, 10.0);

        let (id, sample) = graph.closest_segment(Point3d::new(5.0, 0.0, 3.0)).unwrap();
        assert_eq!(id, near);
        assert_eq!(sample.distance_from_path, 3.0);

        let (id, _) = graph.closest_segment(Point3d::new(5.0, 0.0, 8.0)).unwrap();
        assert_eq!(id, far);
    }

    #[test]
    fn connections_are_validated() {
        let mut graph = PathGraph::new();
        let a = straight(&mut graph, 0.0);
        let b = straight(&mut graph, 10.0);
        graph.connect(a, b).unwrap();
        graph.connect(a, b).unwrap();
        assert_eq!(graph[a].connected_segments(), &[b]);

        assert!(matches!(
            graph.connect(a, SegmentId::null()),
            Err(TrafficError::UnknownSegment(_))
        ));
        assert!(graph.add_segment(vec![]).is_err());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn empty_graph_has_no_closest_segment() {
        assert!(PathGraph::new().closest_segment(Point3d::new(0.0, 0.0, 0.0)).is_none());
    }
}
