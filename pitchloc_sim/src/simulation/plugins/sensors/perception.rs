// pitchloc_sim/src/simulation/plugins/sensors/perception.rs

//! Renders the percepts a camera at the true robot pose would deliver.

use crate::simulation::config::structs::PerceptionConfig;
use crate::simulation::core::prng::SimulationRng;
use nalgebra::{Isometry2, Point2};
use pitchloc_core::field::{FieldCorner, FieldDimensions, FieldLine, GoalSide};
use pitchloc_core::geometry::normalize_angle;
use pitchloc_core::messages::{
    CameraInfo, DistanceType, FrameInput, GoalPercept, GoalPostObservation, LinePercept,
    ObservedCircle, ObservedCorner, ObservedLine,
};
use std::f64::consts::FRAC_PI_2;

/// Percepts closer than this are under the robot's feet.
const MIN_DISTANCE: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct PerceptionSynthesizer {
    config: PerceptionConfig,
    field: FieldDimensions,
    /// Straight field lines; the centre circle is reported on its own.
    lines: Vec<FieldLine>,
    corners: Vec<FieldCorner>,
}

impl PerceptionSynthesizer {
    pub fn new(config: PerceptionConfig, field: FieldDimensions) -> Self {
        let radius = field.center_circle_radius;
        let on_circle = |p: &Point2<f64>| (p.coords.norm() - radius).abs() < 1e-6;
        let lines = field
            .field_lines()
            .into_iter()
            .filter(|line| !(on_circle(&line.start) && on_circle(&line.end)))
            .collect();
        let corners = field.field_corners();
        Self {
            config,
            field,
            lines,
            corners,
        }
    }

    /// Everything visible from `truth`, in the robot frame. Odometry, game
    /// state and resets are left at their defaults.
    pub fn render(&self, truth: &Isometry2<f64>, time_ms: u64, rng: &mut SimulationRng) -> FrameInput {
        FrameInput {
            time_ms,
            camera: CameraInfo {
                height: self.config.camera_height,
                is_valid: true,
            },
            goals: self.goals(truth, time_ms, rng),
            lines: LinePercept {
                lines: self.lines(truth, rng),
                corners: self.corners(truth, rng),
                center_circle: self.center_circle(truth, rng),
            },
            ..FrameInput::default()
        }
    }

    fn is_visible(&self, relative: &Point2<f64>) -> bool {
        let distance = relative.coords.norm();
        distance >= MIN_DISTANCE
            && distance <= self.config.max_distance
            && relative.y.atan2(relative.x).abs() <= self.config.field_of_view / 2.0
    }

    /// Applies bearing and relative distance noise to a robot-relative point.
    fn noisy(&self, relative: &Point2<f64>, rng: &mut SimulationRng) -> Point2<f64> {
        let distance = relative.coords.norm();
        let bearing = relative.y.atan2(relative.x) + rng.normal(self.config.bearing_noise);
        let distance = (distance * (1.0 + rng.normal(self.config.distance_noise))).max(MIN_DISTANCE);
        Point2::new(distance * bearing.cos(), distance * bearing.sin())
    }

    fn goals(&self, truth: &Isometry2<f64>, time_ms: u64, rng: &mut SimulationRng) -> GoalPercept {
        let mut percept = GoalPercept::default();
        let radius = self.field.goal_post_radius;
        for side in GoalSide::ALL {
            let seen: Vec<_> = side
                .posts()
                .into_iter()
                .filter_map(|post| {
                    let centre = truth.inverse_transform_point(&self.field.goal_post_position(post));
                    let distance = centre.coords.norm();
                    // The perceptor reports the foot point on the near surface.
                    let foot = Point2::from(centre.coords * ((distance - radius) / distance));
                    self.is_visible(&foot).then_some((post, foot))
                })
                .collect();
            let lone_unknown = seen.len() == 1 && rng.chance(self.config.unknown_post_probability);
            for (post, foot) in seen {
                let observation = GoalPostObservation {
                    position: self.noisy(&foot, rng),
                    distance_type: DistanceType::BearingBased,
                    time_when_last_seen: time_ms,
                };
                if lone_unknown {
                    percept.unknown_posts[side as usize] = Some(observation);
                } else {
                    percept.posts[post as usize] = Some(observation);
                }
            }
        }
        percept
    }

    /// The visible piece of every line, probed at a fixed spacing. Only the
    /// first contiguous visible piece of a line is reported.
    fn lines(&self, truth: &Isometry2<f64>, rng: &mut SimulationRng) -> Vec<ObservedLine> {
        let mut observed = Vec::new();
        for line in &self.lines {
            let steps = (line.length() / self.config.line_sample_spacing).ceil().max(1.0) as usize;
            let probe = |i: usize| {
                let t = i as f64 / steps as f64;
                truth.inverse_transform_point(&(line.start + (line.end - line.start) * t))
            };
            let mut visible = (0..=steps).map(probe).skip_while(|p| !self.is_visible(p));
            let Some(first) = visible.next() else {
                continue;
            };
            let last = visible
                .take_while(|p| self.is_visible(p))
                .last()
                .unwrap_or(first);
            if (last - first).norm() < self.config.min_line_length {
                continue;
            }
            observed.push(ObservedLine {
                start: self.noisy(&first, rng),
                end: self.noisy(&last, rng),
            });
        }
        observed
    }

    fn corners(&self, truth: &Isometry2<f64>, rng: &mut SimulationRng) -> Vec<ObservedCorner> {
        let heading = truth.rotation.angle();
        let mut observed = Vec::new();
        for corner in &self.corners {
            let relative = truth.inverse_transform_point(&corner.position);
            if !self.is_visible(&relative) {
                continue;
            }
            let dir1 = normalize_angle(
                corner.orientation as f64 * FRAC_PI_2 - heading + rng.normal(self.config.bearing_noise),
            );
            observed.push(ObservedCorner {
                position: self.noisy(&relative, rng),
                kind: corner.kind,
                dir1,
                dir2: normalize_angle(dir1 + FRAC_PI_2),
            });
        }
        observed
    }

    fn center_circle(&self, truth: &Isometry2<f64>, rng: &mut SimulationRng) -> Option<ObservedCircle> {
        let relative = truth.inverse_transform_point(&Point2::origin());
        self.is_visible(&relative).then(|| ObservedCircle {
            position: self.noisy(&relative, rng),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pitchloc_core::field::{CornerKind, GoalPost};
    use pitchloc_core::geometry::pose;

    fn noise_free() -> PerceptionConfig {
        PerceptionConfig {
            bearing_noise: 0.0,
            distance_noise: 0.0,
            unknown_post_probability: 0.0,
            ..PerceptionConfig::default()
        }
    }

    fn synthesizer(config: PerceptionConfig) -> PerceptionSynthesizer {
        PerceptionSynthesizer::new(config, FieldDimensions::default())
    }

    #[test]
    fn test_facing_the_opponent_goal_sees_both_posts() {
        let synthesizer = synthesizer(noise_free());
        let mut rng = SimulationRng::from_seed(0);
        let frame = synthesizer.render(&pose(1.0, 0.0, 0.0), 500, &mut rng);

        let left = frame.goals.post_seen_at(GoalPost::LeftOpponent, 500).unwrap();
        let right = frame.goals.post_seen_at(GoalPost::RightOpponent, 500).unwrap();
        assert!(left.position.y > 0.0 && right.position.y < 0.0);
        let centre_distance = (2.0_f64.powi(2) + 0.7_f64.powi(2)).sqrt();
        assert_abs_diff_eq!(left.distance(), centre_distance - 0.05, epsilon = 1e-9);
        assert!(frame.goals.post_seen_at(GoalPost::LeftOwn, 500).is_none());
        assert!(frame.goals.unknown_posts.iter().all(Option::is_none));
        assert!(frame.camera.is_valid);
    }

    #[test]
    fn test_nothing_behind_the_robot_is_seen() {
        let synthesizer = synthesizer(noise_free());
        let mut rng = SimulationRng::from_seed(0);
        let frame = synthesizer.render(&pose(1.0, 0.0, 0.0), 0, &mut rng);
        assert!(frame.lines.center_circle.is_none());
        for corner in &frame.lines.corners {
            assert!(corner.position.x > 0.0);
        }
        for line in &frame.lines.lines {
            assert!(line.start.x > 0.0 && line.end.x > 0.0);
        }
    }

    #[test]
    fn test_lone_post_can_lose_its_side() {
        let config = PerceptionConfig {
            unknown_post_probability: 1.0,
            field_of_view: 0.4,
            ..noise_free()
        };
        let synthesizer = synthesizer(config);
        let mut rng = SimulationRng::from_seed(0);
        // Looking at the left opponent post only.
        let truth = pose(1.0, 0.7, 0.0);
        let frame = synthesizer.render(&truth, 0, &mut rng);
        assert!(frame.goals.posts.iter().all(Option::is_none));
        let unknown = frame.goals.unknown_post_seen_at(GoalSide::Opponent, 0).unwrap();
        assert_abs_diff_eq!(unknown.position.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_corner_directions_follow_the_heading() {
        let synthesizer = synthesizer(noise_free());
        let mut rng = SimulationRng::from_seed(0);
        // Standing in the middle of the opponent half, looking at the corner
        // at (3, 2) whose first arm points along -x.
        let truth = pose(2.0, 1.0, std::f64::consts::FRAC_PI_4);
        let frame = synthesizer.render(&truth, 0, &mut rng);
        let corner = frame
            .lines
            .corners
            .iter()
            .find(|c| {
                c.kind == CornerKind::L && (c.position.coords.norm() - 2f64.sqrt()).abs() < 1e-9
            })
            .unwrap();
        let expected = 3.0 * std::f64::consts::FRAC_PI_4;
        assert_abs_diff_eq!(normalize_angle(corner.direction() - expected), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_centre_circle_and_lines_in_front() {
        let synthesizer = synthesizer(noise_free());
        let mut rng = SimulationRng::from_seed(0);
        let frame = synthesizer.render(&pose(-1.5, 0.0, 0.0), 0, &mut rng);
        let circle = frame.lines.center_circle.unwrap();
        assert_abs_diff_eq!(circle.position.x, 1.5, epsilon = 1e-9);
        // The centre line crosses the view.
        assert!(frame
            .lines
            .lines
            .iter()
            .any(|l| (l.start.x - 1.5).abs() < 1e-9 && (l.end.x - 1.5).abs() < 1e-9));
    }
}
