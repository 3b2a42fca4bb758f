use crate::graph::PathGraph;
use crate::math::{segments_intersect, signed_ground_angle, to_ground, Point3d, Vector3d};
use crate::segment::Segment;
use crate::util::Interval;
use crate::SegmentId;
use cgmath::prelude::*;
use itertools::Itertools;
use smallvec::SmallVec;

/// A movement from one segment onto a connected segment within an intersection.
#[derive(Clone, Debug)]
pub struct Turn {
    /// The segment the turn starts from.
    from: SegmentId,
    /// The segment the turn leads onto.
    to: SegmentId,
    /// The last waypoint of the origin segment.
    entry: Point3d,
    /// The first waypoint of the destination segment.
    exit: Point3d,
    /// The direction of travel on arrival.
    approach: Vector3d,
    /// The signed angle between arriving and leaving in degrees, positive for right turns.
    angle: f64,
    /// The straight-line distance from entry to exit in m.
    distance: f64,
    /// Indices of the turns in the same intersection whose paths cross this one.
    crossing: SmallVec<[usize; 8]>,
}

impl Turn {
    pub(crate) fn new(from: &Segment, to: &Segment) -> Self {
        let entry = from.last().position;
        let exit = to.first().position;
        Self {
            from: from.id(),
            to: to.id(),
            entry,
            exit,
            approach: from.end_direction(),
            angle: signed_ground_angle(from.end_direction(), to.start_direction()),
            distance: entry.distance(exit),
            crossing: SmallVec::new(),
        }
    }

    /// The segment the turn starts from.
    pub fn from(&self) -> SegmentId {
        self.from
    }

    /// The segment the turn leads onto.
    pub fn to(&self) -> SegmentId {
        self.to
    }

    pub fn entry(&self) -> Point3d {
        self.entry
    }

    pub fn exit(&self) -> Point3d {
        self.exit
    }

    /// The direction of travel on arrival.
    pub fn approach_direction(&self) -> Vector3d {
        self.approach
    }

    /// The signed turn angle in degrees; positive turns right, negative turns left.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// The straight-line distance travelled through the intersection in m.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Indices of the turns whose paths cross this one.
    pub fn crossing_turns(&self) -> &[usize] {
        &self.crossing
    }

    /// Whether the turn at index `other` crosses this one.
    pub fn crosses(&self, other: usize) -> bool {
        self.crossing.contains(&other)
    }

    /// Whether two turns contend for the same space.
    ///
    /// Turns from the same origin are never in conflict, since the path already
    /// orders the agents on them.
    fn conflicts_with(&self, other: &Turn) -> bool {
        if self.from == other.from {
            return false;
        }
        self.to == other.to
            || segments_intersect(
                to_ground(self.entry),
                to_ground(self.exit),
                to_ground(other.entry),
                to_ground(other.exit),
            )
    }
}

/// Whether a point lies within an axis-aligned volume.
pub(crate) fn volume_contains(bounds: &[Interval<f64>; 3], point: Point3d) -> bool {
    bounds[0].contains(point.x) && bounds[1].contains(point.y) && bounds[2].contains(point.z)
}

/// Finds every turn that starts and ends within the given volume and links up the
/// crossing turns.
pub(crate) fn find_turns(bounds: &[Interval<f64>; 3], graph: &PathGraph) -> Vec<Turn> {
    let mut turns = graph
        .iter_segments()
        .filter(|from| volume_contains(bounds, from.last().position))
        .flat_map(|from| {
            from.connected_segments()
                .iter()
                .filter_map(|id| graph.segment(*id))
                .filter(|to| volume_contains(bounds, to.first().position))
                .map(move |to| Turn::new(from, to))
        })
        .collect::<Vec<_>>();

    let crossings = (0..turns.len())
        .tuple_combinations()
        .filter(|&(a, b)| turns[a].conflicts_with(&turns[b]))
        .collect::<Vec<_>>();

    for (a, b) in crossings {
        turns[a].crossing.push(b);
        turns[b].crossing.push(a);
    }

    turns
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::segment::Waypoint;
    use assert_approx_eq::assert_approx_eq;

    fn add(graph: &mut PathGraph, from: (f64, f64), to: (f64, f64)) -> SegmentId {
        graph
            .add_segment(
                [from, to]
                    .map(|(x, z)| Waypoint {
                        position: Point3d::new(x, 0.0, z),
                        speed_limit: 10.0,
                    })
                    .to_vec(),
            )
            .unwrap()
    }

    fn bounds(half: f64) -> [Interval<f64>; 3] {
        [Interval::disc(0.0, half), Interval::disc(0.0, 1.0), Interval::disc(0.0, half)]
    }

    #[test]
    fn turns_are_limited_to_the_volume() {
        let mut graph = PathGraph::new();
        let a = add(&mut graph, (-50.0, 0.0), (-5.0, 0.0));
        let b = add(&mut graph, (5.0, 0.0), (50.0, 0.0));
        let c = add(&mut graph, (50.0, 0.0), (90.0, 0.0));
        graph.connect(a, b).unwrap();
        graph.connect(b, c).unwrap();

        let turns = find_turns(&bounds(10.0), &graph);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].from(), a);
        assert_eq!(turns[0].to(), b);
        assert_approx_eq!(turns[0].distance(), 10.0);
        assert_approx_eq!(turns[0].angle(), 0.0);
    }

    #[test]
    fn crossing_chords_conflict_symmetrically() {
        let mut graph = PathGraph::new();
        // One heading along +X, the other along -Z
        let a = add(&mut graph, (-50.0, 0.0), (-5.0, 0.0));
        let c = add(&mut graph, (5.0, 0.0), (50.0, 0.0));
        let b = add(&mut graph, (0.0, 50.0), (0.0, 5.0));
        let d = add(&mut graph, (0.0, -5.0), (0.0, -50.0));
        graph.connect(a, c).unwrap();
        graph.connect(b, d).unwrap();

        let turns = find_turns(&bounds(10.0), &graph);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].crossing_turns(), &[1]);
        assert_eq!(turns[1].crossing_turns(), &[0]);
    }

    #[test]
    fn shared_destination_conflicts_but_shared_origin_does_not() {
        let mut graph = PathGraph::new();
        let west = add(&mut graph, (-50.0, 1.0), (-5.0, 1.0));
        let east_out = add(&mut graph, (5.0, 1.0), (50.0, 1.0));
        let south_out = add(&mut graph, (-1.0, 5.0), (-1.0, 50.0));
        let north = add(&mut graph, (1.0, -50.0), (1.0, -5.0));
        graph.connect(west, east_out).unwrap();
        graph.connect(west, south_out).unwrap();
        graph.connect(north, east_out).unwrap();

        let turns = find_turns(&bounds(10.0), &graph);
        let index = |from, to| {
            turns
                .iter()
                .position(|t| t.from() == from && t.to() == to)
                .unwrap()
        };
        let straight = index(west, east_out);
        let right = index(west, south_out);
        let merge = index(north, east_out);

        assert!(!turns[straight].crosses(right));
        assert!(turns[straight].crosses(merge));
        assert!(turns[merge].crosses(straight));
        assert!(turns[right].angle() > 0.0);
        assert!(turns[merge].angle() < 0.0);

        for (i, turn) in turns.iter().enumerate() {
            for &j in turn.crossing_turns() {
                assert!(turns[j].crosses(i));
            }
        }
    }
}
