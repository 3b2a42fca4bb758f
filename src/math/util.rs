use super::{Point2d, Point3d, Vector3d, UP};
use cgmath::prelude::*;

/// Projects a point onto the ground plane.
pub fn to_ground(point: Point3d) -> Point2d {
    Point2d::new(point.x, point.z)
}

/// Gets the unit vector pointing to the right of `forward`, i.e. `forward × up`.
///
/// Falls back to +X when `forward` is vertical or zero.
pub fn right_of(forward: Vector3d) -> Vector3d {
    let right = forward.cross(UP);
    if right.magnitude2() < 1e-12 {
        Vector3d::unit_x()
    } else {
        right.normalize()
    }
}

/// Normalises a vector, returning `fallback` when it has no length.
pub fn normalize_or(vec: Vector3d, fallback: Vector3d) -> Vector3d {
    if vec.magnitude2() < 1e-12 {
        fallback
    } else {
        vec.normalize()
    }
}

/// Computes the signed angle in degrees on the ground plane that rotates `from` onto `to`.
/// Positive angles turn towards the right of `from`.
pub fn signed_ground_angle(from: Vector3d, to: Vector3d) -> f64 {
    let from = normalize_or(Vector3d::new(from.x, 0.0, from.z), Vector3d::zero());
    let to = Vector3d::new(to.x, 0.0, to.z);
    let x = from.dot(to);
    let y = right_of(from).dot(to);
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }
    y.atan2(x).to_degrees()
}

/// Orientation of the ordered triplet `(p, q, r)`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

fn orientation(p: Point2d, q: Point2d, r: Point2d) -> Orientation {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val.abs() < 1e-9 {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Whether `q` lies within the bounding box of segment `p`–`r`.
fn on_segment(p: Point2d, q: Point2d, r: Point2d) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

/// Tests whether line segments `p1`–`q1` and `p2`–`q2` intersect,
/// including touching endpoints and collinear overlap.
pub fn segments_intersect(p1: Point2d, q1: Point2d, p2: Point2d, q2: Point2d) -> bool {
    use Orientation::Collinear;

    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Collinear && on_segment(p1, p2, q1))
        || (o2 == Collinear && on_segment(p1, q2, q1))
        || (o3 == Collinear && on_segment(p2, p1, q2))
        || (o4 == Collinear && on_segment(p2, q1, q2))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn right_is_forward_cross_up() {
        let right = right_of(Vector3d::unit_x());
        assert_approx_eq!(right.z, 1.0);
        assert_approx_eq!(right.x, 0.0);
    }

    #[test]
    fn signed_angles() {
        let fwd = Vector3d::unit_x();
        assert_approx_eq!(signed_ground_angle(fwd, fwd), 0.0);
        assert_approx_eq!(signed_ground_angle(fwd, right_of(fwd)), 90.0);
        assert_approx_eq!(signed_ground_angle(fwd, -right_of(fwd)), -90.0);
        assert_approx_eq!(signed_ground_angle(fwd, -fwd).abs(), 180.0);
        // Neither length nor height affects the angle
        let diagonal = Vector3d::new(1.0, 0.0, 1.0);
        assert_approx_eq!(signed_ground_angle(5.0 * fwd, diagonal), 45.0);
        assert_approx_eq!(signed_ground_angle(Vector3d::new(0.2, 3.0, 0.0), -diagonal), -135.0);
    }

    #[test]
    fn crossing_segments() {
        let p = |x, y| Point2d::new(x, y);
        assert!(segments_intersect(p(0., 0.), p(10., 10.), p(0., 10.), p(10., 0.)));
        assert!(!segments_intersect(p(0., 0.), p(10., 0.), p(0., 1.), p(10., 1.)));
        // Shared endpoint
        assert!(segments_intersect(p(0., 0.), p(5., 5.), p(10., 0.), p(5., 5.)));
        // Collinear overlap and collinear disjoint
        assert!(segments_intersect(p(0., 0.), p(5., 0.), p(3., 0.), p(8., 0.)));
        assert!(!segments_intersect(p(0., 0.), p(2., 0.), p(3., 0.), p(8., 0.)));
    }
}
