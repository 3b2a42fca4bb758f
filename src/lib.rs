pub use actuation::{Actuation, VehicleActuator, VehicleState};
pub use agent::routing::{FirstConnection, RandomRoute, RoutePolicy, RouteToDestination};
pub use agent::speed::SpeedController;
pub use agent::steering::{SteerMode, SteeringController};
pub use agent::{IntersectionState, Navigator};
pub use cgmath;
pub use config::{AgentSettings, IntersectionConfig, NetworkConfig, SegmentConfig};
pub use error::{TrafficError, TrafficResult};
pub use graph::PathGraph;
pub use intersection::{
    HandPriority, Intersection, IntersectionAgent, IntersectionSettings, PriorityPolicy, Turn,
    TurnOccupancy, TurnPreference,
};
pub use kinematic::{KinematicAttributes, KinematicVehicle};
pub use pid::{PidController, PidResult, PidSettings};
pub use segment::{PathSample, Segment, Waypoint};
pub use sensor::{ForwardSensor, NoObstacles, SensorReading};
pub use simulation::Simulation;
pub use trigger::RegionTriggers;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;

mod actuation;
mod agent;
mod config;
mod error;
mod graph;
mod intersection;
mod kinematic;
pub mod math;
mod pid;
mod segment;
mod sensor;
mod simulation;
mod trigger;
mod util;

new_key_type! {
    /// Unique ID of a [Segment].
    pub struct SegmentId;
    /// Unique ID of a simulated agent.
    pub struct AgentId;
    /// Unique ID of an [Intersection].
    pub struct IntersectionId;
}

type SegmentSet = SlotMap<SegmentId, Segment>;
type NavigatorSet = SlotMap<AgentId, Navigator>;
