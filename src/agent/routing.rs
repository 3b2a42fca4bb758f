use crate::graph::PathGraph;
use crate::segment::Segment;
use crate::SegmentId;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Chooses the segment an agent will drive onto after its current one.
/// This can be conceptualised as the agent's GPS navigation unit.
pub trait RoutePolicy {
    /// Picks one of `segment`'s connected segments, or `None` if the agent should stop there.
    fn pick_next(&mut self, segment: &Segment, graph: &PathGraph) -> Option<SegmentId>;
}

/// Picks uniformly at random among the connected segments.
#[derive(Clone, Debug)]
pub struct RandomRoute {
    rng: StdRng,
}

/// Always picks the first connected segment.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstConnection;

/// Follows the shortest path (by arc length) towards a destination segment.
#[derive(Clone, Debug)]
pub struct RouteToDestination {
    destination: SegmentId,
}

impl RandomRoute {
    /// Creates a reproducible random router.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a random router seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomRoute {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RoutePolicy for RandomRoute {
    fn pick_next(&mut self, segment: &Segment, _graph: &PathGraph) -> Option<SegmentId> {
        segment.connected_segments().choose(&mut self.rng).copied()
    }
}

impl RoutePolicy for FirstConnection {
    fn pick_next(&mut self, segment: &Segment, _graph: &PathGraph) -> Option<SegmentId> {
        segment.connected_segments().first().copied()
    }
}

impl RouteToDestination {
    pub fn new(destination: SegmentId) -> Self {
        Self { destination }
    }

    /// The segment being routed towards.
    pub fn destination(&self) -> SegmentId {
        self.destination
    }
}

impl RoutePolicy for RouteToDestination {
    fn pick_next(&mut self, segment: &Segment, graph: &PathGraph) -> Option<SegmentId> {
        if segment.id() == self.destination {
            return None;
        }
        let result = pathfinding::directed::dijkstra::dijkstra(
            &segment.id(),
            |id| successors(*id, graph),
            |id| *id == self.destination,
        );
        match result {
            Some((route, _)) => route.get(1).copied(),
            // Unreachable destination: keep driving rather than stranding the agent
            None => segment.connected_segments().first().copied(),
        }
    }
}

/// Successors of a segment, costed by the successor's length in cm.
fn successors(segment_id: SegmentId, graph: &PathGraph) -> impl Iterator<Item = (SegmentId, u64)> + '_ {
    let connected = graph
        .segment(segment_id)
        .map(|segment| segment.connected_segments())
        .unwrap_or(&[]);
    connected.iter().filter_map(move |id| {
        let segment = graph.segment(*id)?;
        Some((*id, (100.0 * segment.total_length()) as u64))
    })
}

impl<F: FnMut(&Segment, &PathGraph) -> Option<SegmentId>> RoutePolicy for F {
    fn pick_next(&mut self, segment: &Segment, graph: &PathGraph) -> Option<SegmentId> {
        self(segment, graph)
    }
}
