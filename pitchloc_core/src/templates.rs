// pitchloc_core/src/templates.rs

//! Candidate poses synthesized from recent goal post sightings.
//!
//! Sightings are buffered together with the odometry at the time they were
//! made. When a template is requested, a buffered sighting is triangulated
//! into a pose and carried forward by the odometry accumulated since.

use crate::config::{SensorDeviations, TemplateClipping};
use crate::field::{FieldDimensions, GoalPost, GoalSide};
use crate::geometry::{angle_of, circle_intersections, position, sample_triangular};
use crate::messages::{DistanceType, FrameInput, GoalPostObservation};
use log::debug;
use nalgebra::{Isometry2, Point2, UnitComplex, Vector2};
use rand::Rng;
use std::collections::VecDeque;
use std::f64::consts::PI;

/// Capacity of each sighting buffer.
pub const MAX_PERCEPTS: usize = 10;
/// Sightings older than this are dropped.
pub const MAX_TIME_TO_KEEP_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    FullGoal,
    KnownPost,
    UnknownPost,
    Random,
}

/// A candidate pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Template {
    pub pose: Isometry2<f64>,
    pub timestamp: u64,
    pub source: TemplateSource,
}

/// One buffered post sighting.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PostSighting {
    /// Foot point in the robot frame at `timestamp`.
    seen: Point2<f64>,
    distance_type: DistanceType,
}

impl From<&GoalPostObservation> for PostSighting {
    fn from(observation: &GoalPostObservation) -> Self {
        Self {
            seen: observation.position,
            distance_type: observation.distance_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FullGoal {
    real_left: Point2<f64>,
    real_right: Point2<f64>,
    left: PostSighting,
    right: PostSighting,
    timestamp: u64,
    odometry: Isometry2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct KnownPost {
    real: Point2<f64>,
    sighting: PostSighting,
    timestamp: u64,
    odometry: Isometry2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct UnknownPost {
    candidates: [Point2<f64>; 2],
    sighting: PostSighting,
    timestamp: u64,
    odometry: Isometry2<f64>,
}

trait Timestamped {
    fn timestamp(&self) -> u64;
}

macro_rules! impl_timestamped {
    ($($t:ty),*) => {
        $(impl Timestamped for $t {
            fn timestamp(&self) -> u64 {
                self.timestamp
            }
        })*
    };
}
impl_timestamped!(FullGoal, KnownPost, UnknownPost);

fn push_bounded<T>(buffer: &mut VecDeque<T>, entry: T) {
    if buffer.len() == MAX_PERCEPTS {
        buffer.pop_front();
    }
    buffer.push_back(entry);
}

fn remove_old<T: Timestamped>(buffer: &mut VecDeque<T>, now: u64) {
    while buffer
        .front()
        .is_some_and(|oldest| now.saturating_sub(oldest.timestamp()) > MAX_TIME_TO_KEEP_MS)
    {
        buffer.pop_front();
    }
}

/// Buffers goal post sightings and turns them into candidate poses.
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    field: FieldDimensions,
    clipping: TemplateClipping,
    sample_bearing_distance: f64,
    sample_size_distance: f64,
    full_goals: VecDeque<FullGoal>,
    known_posts: VecDeque<KnownPost>,
    unknown_posts: VecDeque<UnknownPost>,
    now: u64,
    odometry: Isometry2<f64>,
}

impl TemplateGenerator {
    pub fn new(field: &FieldDimensions, deviations: &SensorDeviations, clipping: TemplateClipping) -> Self {
        Self {
            field: field.clone(),
            clipping,
            sample_bearing_distance: deviations.goal_post_sample_bearing_distance,
            sample_size_distance: deviations.goal_post_sample_size_distance,
            full_goals: VecDeque::with_capacity(MAX_PERCEPTS),
            known_posts: VecDeque::with_capacity(MAX_PERCEPTS),
            unknown_posts: VecDeque::with_capacity(MAX_PERCEPTS),
            now: 0,
            odometry: Isometry2::identity(),
        }
    }

    /// Drops every buffered sighting.
    pub fn clear(&mut self) {
        self.full_goals.clear();
        self.known_posts.clear();
        self.unknown_posts.clear();
    }

    pub fn templates_available(&self) -> bool {
        !(self.full_goals.is_empty() && self.known_posts.is_empty() && self.unknown_posts.is_empty())
    }

    /// Number of buffered full goals, known posts and unknown posts.
    pub fn buffered(&self) -> (usize, usize, usize) {
        (self.full_goals.len(), self.known_posts.len(), self.unknown_posts.len())
    }

    /// Records the sightings of the current frame and ages out old ones.
    ///
    /// A completely seen goal (opponent first, then own) is buffered as one
    /// record; otherwise every known post seen this frame is buffered on its
    /// own. Side-ambiguous posts are buffered in either case. Posts whose
    /// distance is only an upper bound are never buffered.
    pub fn buffer_new_perceptions(&mut self, frame: &FrameInput) {
        self.now = frame.time_ms;
        self.odometry = frame.odometry;
        let now = frame.time_ms;
        let usable = |post: GoalPost| {
            frame
                .goals
                .post_seen_at(post, now)
                .filter(|o| o.distance_type != DistanceType::IsCloser)
        };

        let full_goal = GoalSide::ALL.into_iter().find_map(|side| {
            let [left, right] = side.posts();
            let goal = FullGoal {
                real_left: self.field.goal_post_position(left),
                real_right: self.field.goal_post_position(right),
                left: usable(left)?.into(),
                right: usable(right)?.into(),
                timestamp: now,
                odometry: frame.odometry,
            };
            Some(goal)
        });

        match full_goal {
            Some(goal) => {
                // Only keep goals that can be triangulated at all.
                let left = goal.left.seen.coords.norm() + self.field.goal_post_radius;
                let right = goal.right.seen.coords.norm() + self.field.goal_post_radius;
                if self.full_goal_position(&goal, left, right).is_some() {
                    push_bounded(&mut self.full_goals, goal);
                }
            }
            None => {
                for post in GoalPost::ALL {
                    if let Some(observation) = usable(post) {
                        push_bounded(
                            &mut self.known_posts,
                            KnownPost {
                                real: self.field.goal_post_position(post),
                                sighting: observation.into(),
                                timestamp: now,
                                odometry: frame.odometry,
                            },
                        );
                    }
                }
            }
        }

        for side in GoalSide::ALL {
            let Some(observation) = frame
                .goals
                .unknown_post_seen_at(side, now)
                .filter(|o| o.distance_type != DistanceType::IsCloser)
            else {
                continue;
            };
            let [left, right] = side.posts();
            push_bounded(
                &mut self.unknown_posts,
                UnknownPost {
                    candidates: [
                        self.field.goal_post_position(left),
                        self.field.goal_post_position(right),
                    ],
                    sighting: observation.into(),
                    timestamp: now,
                    odometry: frame.odometry,
                },
            );
        }

        remove_old(&mut self.full_goals, now);
        remove_old(&mut self.known_posts, now);
        remove_old(&mut self.unknown_posts, now);
    }

    /// Produces one candidate pose, preferring full goals over known posts
    /// over side-ambiguous posts. Falls back to a random pose when nothing is
    /// buffered or the chosen sighting yields no valid pose.
    pub fn get_new_template<R: Rng + ?Sized>(&self, rng: &mut R) -> Template {
        let generated = if !self.full_goals.is_empty() {
            let goal = &self.full_goals[rng.gen_range(0..self.full_goals.len())];
            self.template_from_full_goal(goal, rng)
                .map(|pose| (pose, TemplateSource::FullGoal))
        } else if !self.known_posts.is_empty() {
            let post = &self.known_posts[rng.gen_range(0..self.known_posts.len())];
            self.template_from_post(&post.sighting, &post.real, &post.odometry, rng)
                .map(|pose| (pose, TemplateSource::KnownPost))
        } else if !self.unknown_posts.is_empty() {
            let post = &self.unknown_posts[rng.gen_range(0..self.unknown_posts.len())];
            let real = post.candidates[rng.gen_range(0..2)];
            self.template_from_post(&post.sighting, &real, &post.odometry, rng)
                .map(|pose| (pose, TemplateSource::UnknownPost))
        } else {
            None
        };

        let (pose, source) = generated.unwrap_or_else(|| (self.random_pose(rng), TemplateSource::Random));
        Template {
            pose,
            timestamp: self.now,
            source,
        }
    }

    fn random_pose<R: Rng + ?Sized>(&self, rng: &mut R) -> Isometry2<f64> {
        if self.clipping.enabled {
            let [min_x, max_x] = self.clipping.range_x;
            let [min_y, max_y] = self.clipping.range_y;
            Isometry2::new(
                Vector2::new(rng.gen_range(min_x..=max_x), rng.gen_range(min_y..=max_y)),
                rng.gen_range(-PI..PI),
            )
        } else {
            self.field.random_pose_on_field(rng)
        }
    }

    fn is_allowed(&self, p: &Point2<f64>) -> bool {
        self.field.is_inside_carpet(p) && self.clipping.contains(p.x, p.y)
    }

    /// Distance to the centre of the post, with sampling noise.
    fn noisy_distance<R: Rng + ?Sized>(&self, sighting: &PostSighting, rng: &mut R) -> f64 {
        let std_dev = match sighting.distance_type {
            DistanceType::HeightBased => self.sample_size_distance,
            DistanceType::BearingBased | DistanceType::IsCloser => self.sample_bearing_distance,
        };
        let mut distance = sighting.seen.coords.norm();
        let noise = sample_triangular(rng, std_dev);
        if distance + noise > std_dev {
            distance += noise;
        }
        distance + self.field.goal_post_radius
    }

    /// Robot position at the time of the sighting. Of the two circle
    /// intersections only the one that sees the posts in the observed
    /// left/right order is a solution.
    fn full_goal_position(&self, goal: &FullGoal, left: f64, right: f64) -> Option<Point2<f64>> {
        let candidates = circle_intersections(&goal.real_left, left, &goal.real_right, right)?;
        let observed_order = goal.left.seen.coords.perp(&goal.right.seen.coords);
        candidates.into_iter().find(|p| {
            let order = (goal.real_left - p).perp(&(goal.real_right - p));
            order * observed_order >= 0.0 && self.is_allowed(p)
        })
    }

    /// Pose with its position at `at` and its heading such that `real` is
    /// seen in the direction of `seen`.
    fn oriented_pose(at: &Point2<f64>, real: &Point2<f64>, seen: &Point2<f64>) -> Option<Isometry2<f64>> {
        let expected = angle_of(&(real - at))?;
        let observed = angle_of(&seen.coords)?;
        Some(Isometry2::from_parts(
            at.coords.into(),
            UnitComplex::new(expected - observed),
        ))
    }

    /// Carries a pose from the time of its sighting to now and re-checks it.
    fn correct_by_odometry(&self, pose: Isometry2<f64>, then: &Isometry2<f64>) -> Option<Isometry2<f64>> {
        let corrected = pose * (then.inverse() * self.odometry);
        self.is_allowed(&position(&corrected)).then_some(corrected)
    }

    fn template_from_full_goal<R: Rng + ?Sized>(&self, goal: &FullGoal, rng: &mut R) -> Option<Isometry2<f64>> {
        let left = self.noisy_distance(&goal.left, rng);
        let right = self.noisy_distance(&goal.right, rng);
        let at = self.full_goal_position(goal, left, right)?;
        let pose = Self::oriented_pose(&at, &goal.real_left, &goal.left.seen)?;
        self.correct_by_odometry(pose, &goal.odometry)
    }

    /// A point on the circle around `real` whose y lies within the carpet,
    /// on the side of the post facing the field centre.
    fn template_from_post<R: Rng + ?Sized>(
        &self,
        sighting: &PostSighting,
        real: &Point2<f64>,
        odometry: &Isometry2<f64>,
        rng: &mut R,
    ) -> Option<Isometry2<f64>> {
        let r = self.noisy_distance(sighting, rng);
        let border = self.field.half_carpet_width();
        let min_y = (real.y - r).max(-border);
        let max_y = (real.y + r).min(border);
        if min_y > max_y {
            return None;
        }
        let y = min_y + rng.gen::<f64>() * (max_y - min_y);
        let x_offset = (r * r - (y - real.y).powi(2)).max(0.0).sqrt();
        let x = if real.x > 0.0 { real.x - x_offset } else { real.x + x_offset };
        let at = Point2::new(x, y);
        if !self.is_allowed(&at) {
            debug!("Post template at ({x:.2}, {y:.2}) rejected");
            return None;
        }
        let pose = Self::oriented_pose(&at, real, &sighting.seen)?;
        self.correct_by_odometry(pose, odometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{heading, normalize_angle, pose};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn exact_deviations() -> SensorDeviations {
        SensorDeviations {
            goal_post_sample_bearing_distance: 0.0,
            goal_post_sample_size_distance: 0.0,
            ..Default::default()
        }
    }

    /// Foot point of `post` as seen from `robot`.
    fn sighting(field: &FieldDimensions, robot: &Isometry2<f64>, post: GoalPost, time: u64) -> GoalPostObservation {
        let centre = robot.inverse_transform_point(&field.goal_post_position(post));
        let distance = centre.coords.norm();
        GoalPostObservation {
            position: centre * ((distance - field.goal_post_radius) / distance),
            distance_type: DistanceType::BearingBased,
            time_when_last_seen: time,
        }
    }

    fn frame_seeing(field: &FieldDimensions, robot: &Isometry2<f64>, posts: &[GoalPost], time: u64) -> FrameInput {
        let mut frame = FrameInput {
            time_ms: time,
            ..Default::default()
        };
        for &post in posts {
            frame.goals.posts[post as usize] = Some(sighting(field, robot, post, time));
        }
        frame
    }

    #[test]
    fn test_full_goal_triangulates_exactly() {
        let field = FieldDimensions::default();
        let mut generator = TemplateGenerator::new(&field, &exact_deviations(), TemplateClipping::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for robot in [pose(1.0, 0.5, 0.2), pose(-0.5, -1.2, -0.4)] {
            generator.clear();
            generator.buffer_new_perceptions(&frame_seeing(
                &field,
                &robot,
                &[GoalPost::LeftOpponent, GoalPost::RightOpponent],
                10,
            ));
            assert_eq!(generator.buffered(), (1, 0, 0));

            let template = generator.get_new_template(&mut rng);
            assert_eq!(template.source, TemplateSource::FullGoal);
            assert_abs_diff_eq!(template.pose.translation.vector.x, robot.translation.vector.x, epsilon = 1e-6);
            assert_abs_diff_eq!(template.pose.translation.vector.y, robot.translation.vector.y, epsilon = 1e-6);
            assert_abs_diff_eq!(normalize_angle(heading(&template.pose) - heading(&robot)), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_own_goal_triangulates_exactly() {
        let field = FieldDimensions::default();
        let mut generator = TemplateGenerator::new(&field, &exact_deviations(), TemplateClipping::default());
        let robot = pose(-1.5, 0.3, 2.9);
        generator.buffer_new_perceptions(&frame_seeing(&field, &robot, &[GoalPost::LeftOwn, GoalPost::RightOwn], 5));
        let template = generator.get_new_template(&mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(template.source, TemplateSource::FullGoal);
        assert_abs_diff_eq!(template.pose.translation.vector.x, -1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(template.pose.translation.vector.y, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_template_follows_odometry() {
        let field = FieldDimensions::default();
        let mut generator = TemplateGenerator::new(&field, &exact_deviations(), TemplateClipping::default());
        let robot = pose(0.0, 0.0, 0.0);
        generator.buffer_new_perceptions(&frame_seeing(
            &field,
            &robot,
            &[GoalPost::LeftOpponent, GoalPost::RightOpponent],
            100,
        ));
        // The robot then walks 0.5 m forward without seeing anything.
        let later = FrameInput {
            time_ms: 200,
            odometry: pose(0.5, 0.0, 0.0),
            ..Default::default()
        };
        generator.buffer_new_perceptions(&later);
        let template = generator.get_new_template(&mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(template.timestamp, 200);
        assert_abs_diff_eq!(template.pose.translation.vector.x, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(template.pose.translation.vector.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_single_post_template_is_on_the_circle() {
        let field = FieldDimensions::default();
        let mut generator = TemplateGenerator::new(&field, &exact_deviations(), TemplateClipping::default());
        let robot = pose(1.5, 1.0, 0.3);
        generator.buffer_new_perceptions(&frame_seeing(&field, &robot, &[GoalPost::LeftOpponent], 1));
        assert_eq!(generator.buffered(), (0, 1, 0));

        let real = field.goal_post_position(GoalPost::LeftOpponent);
        let expected_distance = (real - position(&robot)).norm();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..50 {
            let template = generator.get_new_template(&mut rng);
            assert_eq!(template.source, TemplateSource::KnownPost);
            let at = position(&template.pose);
            assert_abs_diff_eq!((real - at).norm(), expected_distance, epsilon = 1e-9);
            assert!(at.x <= real.x);
            // The post is seen where it was observed.
            let bearing = angle_of(&template.pose.inverse_transform_point(&real).coords).unwrap();
            let observed = angle_of(&robot.inverse_transform_point(&real).coords).unwrap();
            assert_abs_diff_eq!(normalize_angle(bearing - observed), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_closer_posts_are_not_buffered_and_old_ones_expire() {
        let field = FieldDimensions::default();
        let mut generator = TemplateGenerator::new(&field, &exact_deviations(), TemplateClipping::default());
        let robot = pose(0.0, 0.0, 0.0);
        let mut frame = frame_seeing(&field, &robot, &[GoalPost::LeftOpponent], 1000);
        if let Some(post) = frame.goals.posts[GoalPost::LeftOpponent as usize].as_mut() {
            post.distance_type = DistanceType::IsCloser;
        }
        frame.goals.unknown_posts[GoalSide::Own as usize] = Some(sighting(&field, &robot, GoalPost::LeftOwn, 1000));
        generator.buffer_new_perceptions(&frame);
        assert_eq!(generator.buffered(), (0, 0, 1));
        assert!(generator.templates_available());

        generator.buffer_new_perceptions(&FrameInput {
            time_ms: 1000 + MAX_TIME_TO_KEEP_MS + 1,
            ..Default::default()
        });
        assert!(!generator.templates_available());
    }

    #[test]
    fn test_buffers_are_bounded() {
        let field = FieldDimensions::default();
        let mut generator = TemplateGenerator::new(&field, &exact_deviations(), TemplateClipping::default());
        let robot = pose(1.0, 0.0, 0.0);
        for time in 1..=(MAX_PERCEPTS as u64 + 5) {
            generator.buffer_new_perceptions(&frame_seeing(&field, &robot, &[GoalPost::RightOpponent], time));
        }
        assert_eq!(generator.buffered(), (0, MAX_PERCEPTS, 0));
    }

    #[test]
    fn test_templates_respect_clipping() {
        let field = FieldDimensions::default();
        let clipping = TemplateClipping {
            enabled: true,
            range_x: [-3.0, 0.0],
            range_y: [-2.0, 2.0],
        };
        let mut generator = TemplateGenerator::new(&field, &SensorDeviations::default(), clipping);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        // Seen from the own half, the opponent goal produces candidates on both halves.
        let robot = pose(-0.5, 0.5, 0.1);
        generator.buffer_new_perceptions(&frame_seeing(&field, &robot, &[GoalPost::LeftOpponent], 1));
        for _ in 0..200 {
            let template = generator.get_new_template(&mut rng);
            let at = position(&template.pose);
            assert!(clipping.contains(at.x, at.y), "{at:?} outside clipping range");
        }

        generator.clear();
        for _ in 0..200 {
            let template = generator.get_new_template(&mut rng);
            assert_eq!(template.source, TemplateSource::Random);
            let at = position(&template.pose);
            assert!(clipping.contains(at.x, at.y));
        }
    }
}
