//! Mathematical structs and functions.
//!
//! World space is right-handed with +Y up; the ground plane is XZ.

use cgmath::{Point2, Point3, Vector3};
pub use util::*;

mod util;

/// A 3D point
pub type Point3d = Point3<f64>;

/// A 3D vector
pub type Vector3d = Vector3<f64>;

/// A point on the ground plane
pub type Point2d = Point2<f64>;

/// The world up vector.
pub const UP: Vector3d = Vector3d::new(0.0, 1.0, 0.0);
