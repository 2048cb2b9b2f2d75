// pitchloc_core/src/geometry.rs

//! Small 2D helpers shared by the field model, the sensor models and the
//! template generator. Poses are `Isometry2<f64>` in field coordinates
//! (metres, radians); observations are points in the robot frame.

use nalgebra::{Isometry2, Point2, Vector2};
use rand::Rng;
use rand_distr::{Distribution, Triangular};
use std::f64::consts::PI;

/// Builds a pose from its components.
pub fn pose(x: f64, y: f64, rotation: f64) -> Isometry2<f64> {
    Isometry2::new(Vector2::new(x, y), rotation)
}

/// Wraps an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle % (2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Heading of a pose in `(-π, π]`.
pub fn heading(pose: &Isometry2<f64>) -> f64 {
    pose.rotation.angle()
}

pub fn position(pose: &Isometry2<f64>) -> Point2<f64> {
    Point2::from(pose.translation.vector)
}

/// Direction of `point` as seen from the origin. `None` for the zero vector.
pub fn angle_of(point: &Vector2<f64>) -> Option<f64> {
    if point.norm_squared() < f64::EPSILON {
        None
    } else {
        Some(point.y.atan2(point.x))
    }
}

/// Draws from a symmetric triangular distribution whose standard deviation is `std_dev`.
pub fn sample_triangular<R: Rng + ?Sized>(rng: &mut R, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    // Var of Tri(-b, b, 0) is b^2 / 6.
    let half_width = std_dev * 6f64.sqrt();
    match Triangular::new(-half_width, half_width, 0.0) {
        Ok(distribution) => distribution.sample(rng),
        Err(_) => 0.0,
    }
}

/// Uniform noise in `[-magnitude, magnitude]`; zero for a non-positive magnitude.
pub fn uniform_noise<R: Rng + ?Sized>(rng: &mut R, magnitude: f64) -> f64 {
    if magnitude > 0.0 {
        rng.gen_range(-magnitude..=magnitude)
    } else {
        0.0
    }
}

/// Intersections of two circles, in a fixed order: the first point lies to the
/// left of the direction from `c1` to `c2`.
///
/// Returns `None` for disjoint, nested or concentric circles. A tangent pair
/// yields the same point twice.
pub fn circle_intersections(
    c1: &Point2<f64>,
    r1: f64,
    c2: &Point2<f64>,
    r2: f64,
) -> Option<[Point2<f64>; 2]> {
    let offset = c2 - c1;
    let d = offset.norm();
    if d < 1e-9 || d > r1 + r2 || d < (r1 - r2).abs() {
        return None;
    }
    let a = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let h = (r1 * r1 - a * a).max(0.0).sqrt();
    let direction = offset / d;
    let base = c1 + direction * a;
    let left = Vector2::new(-direction.y, direction.x);
    Some([base + left * h, base - left * h])
}

/// Closest point to `p` on the segment `a`-`b`.
pub fn closest_point_on_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    let ab = b - a;
    let length_squared = ab.norm_squared();
    if length_squared < f64::EPSILON {
        return *a;
    }
    let t = ((p - a).dot(&ab) / length_squared).clamp(0.0, 1.0);
    a + ab * t
}

/// Distance along the ray `origin + t * direction` (`t >= 0`) to the segment
/// `a`-`b`, if they intersect. `direction` must be a unit vector.
pub fn ray_segment_distance(
    origin: &Point2<f64>,
    direction: &Vector2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
) -> Option<f64> {
    let edge = b - a;
    let denominator = cross(direction, &edge);
    if denominator.abs() < 1e-12 {
        return None;
    }
    let to_start = a - origin;
    let t = cross(&to_start, &edge) / denominator;
    let s = cross(&to_start, direction) / denominator;
    (t >= 0.0 && (0.0..=1.0).contains(&s)).then_some(t)
}

fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Weighted circular mean of a set of angles. `None` if the resultant vanishes.
pub fn circular_mean<I>(angles: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (sin_sum, cos_sum) = angles
        .into_iter()
        .fold((0.0, 0.0), |(s, c), (angle, weight)| {
            (s + weight * angle.sin(), c + weight * angle.cos())
        });
    if sin_sum.abs() < 1e-12 && cos_sum.abs() < 1e-12 {
        None
    } else {
        Some(sin_sum.atan2(cos_sum))
    }
}
