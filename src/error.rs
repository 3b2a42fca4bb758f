//! Construction-time error type.

use thiserror::Error;

use crate::SegmentId;

/// Errors produced while authoring a path network.
///
/// Nothing in the per-tick simulation returns these; runtime inconsistencies
/// are logged and recovered from instead.
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("a segment needs at least two waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("segment waypoints are all coincident")]
    ZeroLengthSegment,

    #[error("segment {0:?} is not part of the path graph")]
    UnknownSegment(SegmentId),

    #[error("segment {from} connects to segment {to}, which does not exist")]
    InvalidConnection { from: usize, to: usize },

    #[error("invalid network description: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TrafficResult<T> = Result<T, TrafficError>;
