// pitchloc_sim/src/simulation/core/world.rs

//! Ground truth of the simulated robot and the odometry it reports.

use super::prng::SimulationRng;
use crate::simulation::config::structs::{OdometryNoiseConfig, RobotConfig};
use nalgebra::{Isometry2, Point2, Vector2};
use pitchloc_core::geometry::position;
use std::f64::consts::FRAC_PI_4;

/// The robot only walks forward while the next waypoint is within this
/// bearing; otherwise it turns on the spot.
const WALK_BEARING: f64 = FRAC_PI_4;

#[derive(Debug, Clone)]
pub struct GroundTruth {
    pose: Isometry2<f64>,
    /// Accumulated noisy odometry, starting at the identity.
    odometry: Isometry2<f64>,
    waypoints: Vec<Point2<f64>>,
    next: usize,
    speed: f64,
    turn_rate: f64,
    tolerance: f64,
    noise: OdometryNoiseConfig,
}

impl GroundTruth {
    pub fn new(robot: &RobotConfig, noise: OdometryNoiseConfig) -> Self {
        Self {
            pose: robot.start.to_isometry(),
            odometry: Isometry2::identity(),
            waypoints: robot.waypoints.iter().map(|&[x, y]| Point2::new(x, y)).collect(),
            next: 0,
            speed: robot.speed,
            turn_rate: robot.turn_rate,
            tolerance: robot.waypoint_tolerance,
            noise,
        }
    }

    pub fn pose(&self) -> &Isometry2<f64> {
        &self.pose
    }

    pub fn odometry(&self) -> &Isometry2<f64> {
        &self.odometry
    }

    /// Index of the waypoint the robot is heading for.
    pub fn next_waypoint(&self) -> usize {
        self.next
    }

    /// Moves the robot towards its current waypoint for `dt` seconds and
    /// accumulates the motion, with noise, into the odometry.
    pub fn step(&mut self, dt: f64, rng: &mut SimulationRng) {
        let Some(delta) = self.plan(dt) else {
            return;
        };
        self.pose *= delta;

        let forward = delta.translation.vector.x;
        let turn = delta.rotation.angle();
        let translation_std = self.noise.translation * forward.abs();
        let rotation_std = self.noise.rotation * (turn.abs() + forward.abs());
        let measured = Isometry2::new(
            Vector2::new(
                forward + rng.normal(translation_std),
                rng.normal(translation_std),
            ),
            turn + rng.normal(rotation_std),
        );
        self.odometry *= measured;
    }

    /// Puts the robot somewhere else without any trace in the odometry.
    pub fn teleport(&mut self, pose: Isometry2<f64>) {
        self.pose = pose;
    }

    /// Relative motion for one step, `None` without waypoints.
    fn plan(&mut self, dt: f64) -> Option<Isometry2<f64>> {
        if self.waypoints.is_empty() {
            return None;
        }
        let mut relative = self.pose.inverse_transform_point(&self.waypoints[self.next]);
        if relative.coords.norm() < self.tolerance {
            self.next = (self.next + 1) % self.waypoints.len();
            relative = self.pose.inverse_transform_point(&self.waypoints[self.next]);
        }
        let distance = relative.coords.norm();
        let bearing = if distance > 0.0 {
            relative.y.atan2(relative.x)
        } else {
            0.0
        };
        let max_turn = self.turn_rate * dt;
        let turn = bearing.clamp(-max_turn, max_turn);
        let forward = if bearing.abs() < WALK_BEARING {
            (self.speed * dt).min(distance)
        } else {
            0.0
        };
        Some(Isometry2::new(Vector2::new(forward, 0.0), turn))
    }

    /// Distance between the robot and its current waypoint.
    pub fn distance_to_waypoint(&self) -> Option<f64> {
        let target = self.waypoints.get(self.next)?;
        Some((target - position(&self.pose)).norm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pitchloc_core::config::PoseConfig;

    fn robot(waypoints: Vec<[f64; 2]>) -> RobotConfig {
        RobotConfig {
            start: PoseConfig {
                x: 0.0,
                y: 0.0,
                rotation: 0.0,
            },
            waypoints,
            speed: 0.5,
            turn_rate: 1.0,
            waypoint_tolerance: 0.05,
        }
    }

    fn noise_free() -> OdometryNoiseConfig {
        OdometryNoiseConfig {
            translation: 0.0,
            rotation: 0.0,
        }
    }

    #[test]
    fn test_walks_straight_to_a_waypoint_ahead() {
        let mut truth = GroundTruth::new(&robot(vec![[1.0, 0.0]]), noise_free());
        let mut rng = SimulationRng::from_seed(0);
        for _ in 0..10 {
            truth.step(0.1, &mut rng);
        }
        assert_abs_diff_eq!(truth.pose().translation.vector.x, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(truth.pose().rotation.angle(), 0.0, epsilon = 1e-9);
        // Without noise the odometry is the motion since the start.
        assert_abs_diff_eq!(truth.odometry().translation.vector.x, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_turns_on_the_spot_before_walking() {
        let mut truth = GroundTruth::new(&robot(vec![[0.0, 1.0]]), noise_free());
        let mut rng = SimulationRng::from_seed(0);
        truth.step(0.5, &mut rng);
        assert_abs_diff_eq!(truth.pose().translation.vector.norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(truth.pose().rotation.angle(), 0.5, epsilon = 1e-12);
        for _ in 0..40 {
            truth.step(0.1, &mut rng);
        }
        assert!(truth.distance_to_waypoint().unwrap() < 0.05 + 1e-9);
    }

    #[test]
    fn test_waypoints_are_visited_in_a_loop() {
        let mut truth = GroundTruth::new(&robot(vec![[0.5, 0.0], [0.5, 0.5]]), noise_free());
        let mut rng = SimulationRng::from_seed(0);
        let mut visited = Vec::new();
        for _ in 0..200 {
            truth.step(0.1, &mut rng);
            if visited.last() != Some(&truth.next_waypoint()) {
                visited.push(truth.next_waypoint());
            }
        }
        assert!(visited.starts_with(&[0, 1, 0]));
    }

    #[test]
    fn test_teleport_leaves_odometry_untouched() {
        let mut truth = GroundTruth::new(&robot(vec![[1.0, 0.0]]), noise_free());
        let mut rng = SimulationRng::from_seed(0);
        truth.step(0.2, &mut rng);
        let odometry = *truth.odometry();
        truth.teleport(Isometry2::new(Vector2::new(2.0, 1.0), 1.0));
        assert_eq!(*truth.odometry(), odometry);
        assert_abs_diff_eq!(truth.pose().translation.vector.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_noisy_odometry_drifts_from_the_truth() {
        let noise = OdometryNoiseConfig {
            translation: 0.2,
            rotation: 0.2,
        };
        let mut truth = GroundTruth::new(&robot(vec![[2.0, 0.0], [-2.0, 0.0]]), noise);
        let mut rng = SimulationRng::from_seed(4);
        for _ in 0..100 {
            truth.step(0.1, &mut rng);
        }
        let drift = (truth.odometry().translation.vector - truth.pose().translation.vector).norm();
        assert!(drift > 1e-3);
    }
}
