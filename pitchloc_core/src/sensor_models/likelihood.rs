// pitchloc_core/src/sensor_models/likelihood.rs

//! Shared scoring of one landmark: a Gaussian over the bearing discrepancy
//! times a Gaussian over the discrepancy of the distance expressed as the
//! viewing angle below the horizon-perpendicular. Both factors are 1 at zero
//! discrepancy, so the product lies in `[0, 1]`.

use crate::geometry::{angle_of, normalize_angle};
use nalgebra::{Isometry2, Point2};
use std::f64::consts::FRAC_PI_2;

/// Unnormalized Gaussian, 1 at `difference == 0`.
pub fn gaussian_likelihood(difference: f64, std_dev: f64) -> f64 {
    let z = difference / std_dev;
    (-0.5 * z * z).exp()
}

/// Angle between the vertical through the camera and the ray to a ground
/// point at `distance`.
pub fn distance_as_angle(distance: f64, camera_height: f64) -> f64 {
    FRAC_PI_2 - camera_height.atan2(distance)
}

/// Standard deviations for one landmark type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkDeviations {
    pub angle: f64,
    pub distance: f64,
}

/// Likelihood of observing a field landmark at `model` (field frame) as
/// `measured` (robot frame) from `sample_pose`.
///
/// `None` if either vector is degenerate.
pub fn landmark_likelihood(
    sample_pose: &Isometry2<f64>,
    model: &Point2<f64>,
    measured: &Point2<f64>,
    camera_height: f64,
    deviations: LandmarkDeviations,
) -> Option<f64> {
    let expected = sample_pose.inverse_transform_point(model);
    let expected_bearing = angle_of(&expected.coords)?;
    let measured_bearing = angle_of(&measured.coords)?;
    let angle = gaussian_likelihood(
        normalize_angle(expected_bearing - measured_bearing),
        deviations.angle,
    );
    let distance = gaussian_likelihood(
        distance_as_angle(expected.coords.norm(), camera_height)
            - distance_as_angle(measured.coords.norm(), camera_height),
        deviations.distance,
    );
    Some(angle * distance)
}

/// Bearing-only likelihood, for percepts without a usable distance.
pub fn bearing_likelihood(
    sample_pose: &Isometry2<f64>,
    model: &Point2<f64>,
    measured: &Point2<f64>,
    angle_std_dev: f64,
) -> Option<f64> {
    let expected = sample_pose.inverse_transform_point(model);
    let expected_bearing = angle_of(&expected.coords)?;
    let measured_bearing = angle_of(&measured.coords)?;
    Some(gaussian_likelihood(
        normalize_angle(expected_bearing - measured_bearing),
        angle_std_dev,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pose;
    use approx::assert_abs_diff_eq;

    const DEVIATIONS: LandmarkDeviations = LandmarkDeviations {
        angle: 0.1,
        distance: 0.1,
    };

    #[test]
    fn test_perfect_match_scores_one() {
        let robot = pose(1.0, -1.0, 0.3);
        let landmark = Point2::new(3.0, 0.7);
        let measured = robot.inverse_transform_point(&landmark);
        let weight = landmark_likelihood(&robot, &landmark, &measured, 0.5, DEVIATIONS).unwrap();
        assert_abs_diff_eq!(weight, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_likelihood_decreases_with_discrepancy() {
        let robot = pose(0.0, 0.0, 0.0);
        let landmark = Point2::new(2.0, 0.0);
        let close = landmark_likelihood(&robot, &landmark, &Point2::new(2.0, 0.1), 0.5, DEVIATIONS)
            .unwrap();
        let far = landmark_likelihood(&robot, &landmark, &Point2::new(2.0, 1.0), 0.5, DEVIATIONS)
            .unwrap();
        assert!(close < 1.0);
        assert!(far < close);
        assert!(far >= 0.0);
    }

    #[test]
    fn test_bearing_wraps_around() {
        let robot = pose(0.0, 0.0, 0.0);
        let behind_left = Point2::new(-2.0, 0.001);
        let behind_right = Point2::new(-2.0, -0.001);
        let weight = bearing_likelihood(&robot, &behind_left, &behind_right, 0.1).unwrap();
        assert!(weight > 0.99);
    }

    #[test]
    fn test_degenerate_measurement_has_no_likelihood() {
        let robot = pose(0.0, 0.0, 0.0);
        assert!(landmark_likelihood(&robot, &Point2::new(1.0, 0.0), &Point2::origin(), 0.5, DEVIATIONS)
            .is_none());
    }

    #[test]
    fn test_distance_as_angle_grows_with_distance() {
        assert_abs_diff_eq!(distance_as_angle(0.0, 0.5), 0.0, epsilon = 1e-12);
        assert!(distance_as_angle(1.0, 0.5) < distance_as_angle(3.0, 0.5));
        assert!(distance_as_angle(1000.0, 0.5) < FRAC_PI_2);
    }
}
