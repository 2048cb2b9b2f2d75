// pitchloc_core/src/sensor_models/goal_posts.rs

use super::likelihood::{bearing_likelihood, landmark_likelihood, LandmarkDeviations};
use super::{combine, SensorContext};
use crate::config::SensorDeviations;
use crate::field::{GoalPost, GoalSide};
use crate::messages::{DistanceType, GoalPostObservation};
use crate::sample_set::Sample;
use nalgebra::{Isometry2, Point2};

/// Index of the first side-ambiguous post in the observation numbering.
pub const UNKNOWN_POST_OFFSET: usize = 4;

/// Scores goal post sightings. Known posts are compared with their real
/// position; a side-ambiguous post takes the better of its two candidates.
#[derive(Debug, Clone)]
pub struct GoalPostsSensorModel {
    angle: f64,
    bearing_distance: f64,
    size_distance: f64,
}

impl GoalPostsSensorModel {
    pub fn new(deviations: &SensorDeviations) -> Self {
        Self {
            angle: deviations.goal_post_angle,
            bearing_distance: deviations.goal_post_bearing_distance,
            size_distance: deviations.goal_post_size_distance,
        }
    }

    /// Selected posts seen this frame, each with the real posts it may be.
    fn resolve<'a>(
        selected: &[usize],
        context: &'a SensorContext,
    ) -> Vec<(&'a GoalPostObservation, &'static [GoalPost])> {
        let now = context.frame.time_ms;
        let goals = &context.frame.goals;
        selected
            .iter()
            .filter_map(|&index| {
                if index < UNKNOWN_POST_OFFSET {
                    let post = GoalPost::ALL[index];
                    let candidates: &'static [GoalPost] = match post {
                        GoalPost::LeftOpponent => &[GoalPost::LeftOpponent],
                        GoalPost::RightOpponent => &[GoalPost::RightOpponent],
                        GoalPost::LeftOwn => &[GoalPost::LeftOwn],
                        GoalPost::RightOwn => &[GoalPost::RightOwn],
                    };
                    goals.post_seen_at(post, now).map(|o| (o, candidates))
                } else {
                    let side = *GoalSide::ALL.get(index - UNKNOWN_POST_OFFSET)?;
                    let candidates: &'static [GoalPost] = match side {
                        GoalSide::Opponent => &[GoalPost::LeftOpponent, GoalPost::RightOpponent],
                        GoalSide::Own => &[GoalPost::LeftOwn, GoalPost::RightOwn],
                    };
                    goals.unknown_post_seen_at(side, now).map(|o| (o, candidates))
                }
            })
            .collect()
    }

    fn score(
        &self,
        pose: &Isometry2<f64>,
        real: &Point2<f64>,
        observation: &GoalPostObservation,
        post_radius: f64,
        camera_height: f64,
    ) -> Option<f64> {
        // The perceptor reports the foot point on the near surface of the post.
        let distance = observation.distance();
        if distance <= 0.0 {
            return None;
        }
        let measured_centre = observation.position * ((distance + post_radius) / distance);
        match observation.distance_type {
            DistanceType::IsCloser => bearing_likelihood(pose, real, &measured_centre, self.angle),
            DistanceType::BearingBased | DistanceType::HeightBased => {
                let distance_std = if observation.distance_type == DistanceType::HeightBased {
                    self.size_distance
                } else {
                    self.bearing_distance
                };
                landmark_likelihood(
                    pose,
                    real,
                    &measured_centre,
                    camera_height,
                    LandmarkDeviations {
                        angle: self.angle,
                        distance: distance_std,
                    },
                )
            }
        }
    }

    pub(crate) fn compute_weightings(
        &self,
        samples: &[Sample],
        selected: &[usize],
        context: &SensorContext,
        weightings: &mut [Option<f64>],
    ) {
        let observations = Self::resolve(selected, context);
        if observations.is_empty() {
            return;
        }
        let field = context.field;
        let camera_height = context.frame.camera.height;
        for (sample, weighting) in samples.iter().zip(weightings.iter_mut()) {
            for (observation, candidates) in &observations {
                let best = candidates
                    .iter()
                    .filter_map(|&post| {
                        self.score(
                            &sample.pose,
                            &field.goal_post_position(post),
                            observation,
                            field.goal_post_radius,
                            camera_height,
                        )
                    })
                    .reduce(f64::max);
                *weighting = combine(*weighting, best);
            }
        }
    }
}
