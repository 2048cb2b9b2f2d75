// pitchloc_core/src/sensor_models/corners.rs

use super::likelihood::{landmark_likelihood, LandmarkDeviations};
use super::{combine, SensorContext};
use crate::config::SensorDeviations;
use crate::geometry::{angle_of, heading};
use crate::messages::ObservedCorner;
use crate::sample_set::Sample;

/// Scores line junctions (X, T and L) against the closest model junction of
/// the same kind whose orientation falls in the same quarter-turn class.
#[derive(Debug, Clone)]
pub struct CornersSensorModel {
    deviations: LandmarkDeviations,
}

impl CornersSensorModel {
    pub fn new(deviations: &SensorDeviations) -> Self {
        Self {
            deviations: LandmarkDeviations {
                angle: deviations.corner_angle,
                distance: deviations.corner_distance,
            },
        }
    }

    pub(crate) fn compute_weightings(
        &self,
        samples: &[Sample],
        selected: &[usize],
        context: &SensorContext,
        weightings: &mut [Option<f64>],
    ) {
        let corners: Vec<(&ObservedCorner, f64, f64)> = selected
            .iter()
            .filter_map(|&index| context.frame.lines.corners.get(index))
            .filter_map(|c| Some((c, c.position.coords.norm(), angle_of(&c.position.coords)?)))
            .collect();
        let camera_height = context.frame.camera.height;

        'samples: for (sample, weighting) in samples.iter().zip(weightings.iter_mut()) {
            let direction_offset = heading(&sample.pose);
            let mut product = None;
            for &(corner, distance, bearing) in &corners {
                // A junction seen inside a goal net discards the sample for this cycle.
                if !context.validity.is_plausible(&sample.pose, distance, bearing) {
                    continue 'samples;
                }
                let on_field = sample.pose * corner.position;
                let Some(model) = context.field_model.closest_corner(
                    &on_field,
                    corner.kind,
                    direction_offset + corner.direction(),
                ) else {
                    continue;
                };
                let contribution = landmark_likelihood(
                    &sample.pose,
                    &model,
                    &corner.position,
                    camera_height,
                    self.deviations,
                );
                product = combine(product, contribution);
            }
            *weighting = product;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::CornerKind;
    use crate::geometry::pose;
    use crate::messages::FrameInput;
    use crate::sensor_models::test_support::Fixture;
    use crate::sensor_models::{SensorModel, SensorModelResult};
    use crate::validity::GoalNetValidityChecker;
    use approx::assert_abs_diff_eq;
    use nalgebra::Point2;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_t_junction_ahead() {
        // Robot on the centre line facing the top T junction at (0, 2).
        let robot = pose(0.0, 1.0, FRAC_PI_2);
        let mut frame = FrameInput::default();
        frame.lines.corners.push(ObservedCorner {
            position: Point2::new(1.0, 0.0),
            kind: CornerKind::T,
            // The stem points back at the robot.
            dir1: PI,
            dir2: FRAC_PI_2,
        });
        let fixture = Fixture::new(frame);
        let model = SensorModel::Corners(CornersSensorModel::new(&SensorDeviations::default()));
        let samples = [Sample::new(robot, 0), Sample::new(pose(0.3, 1.0, FRAC_PI_2), 1)];
        let mut weightings = Vec::new();
        let result = model.compute_weightings(&samples, &[0], &fixture.context(), &mut weightings);
        assert_eq!(result, SensorModelResult::FullUpdate);
        assert_abs_diff_eq!(weightings[0].unwrap(), 1.0, epsilon = 1e-9);
        assert!(weightings[1].unwrap() < weightings[0].unwrap());
    }

    #[test]
    fn test_junction_inside_goal_net_leaves_sample_unscored() {
        let mut frame = FrameInput::default();
        // 2 m ahead lies behind the opponent net; 1 m ahead is a plausible junction.
        frame.lines.corners.push(ObservedCorner {
            position: Point2::new(2.0, 0.0),
            kind: CornerKind::T,
            dir1: PI,
            dir2: FRAC_PI_2,
        });
        frame.lines.corners.push(ObservedCorner {
            position: Point2::new(0.5, 1.0),
            kind: CornerKind::L,
            dir1: 0.0,
            dir2: FRAC_PI_2,
        });
        let fixture = Fixture::new(frame);
        let checker = GoalNetValidityChecker::new(&fixture.field, 0.1);
        let context = super::SensorContext {
            validity: &checker,
            ..fixture.context()
        };
        let model = SensorModel::Corners(CornersSensorModel::new(&SensorDeviations::default()));
        let samples = [Sample::new(pose(1.85, 0.05, 0.0), 0)];
        let mut weightings = Vec::new();
        for order in [[0, 1], [1, 0]] {
            let result = model.compute_weightings(&samples, &order, &context, &mut weightings);
            assert_eq!(result, SensorModelResult::NoUpdate);
            assert_eq!(weightings, vec![None]);
        }
    }

    #[test]
    fn test_out_of_range_index_is_no_update() {
        let fixture = Fixture::new(FrameInput::default());
        let model = SensorModel::Corners(CornersSensorModel::new(&SensorDeviations::default()));
        let mut weightings = Vec::new();
        let result = model.compute_weightings(
            &[Sample::new(pose(0.0, 0.0, 0.0), 0)],
            &[3],
            &fixture.context(),
            &mut weightings,
        );
        assert_eq!(result, SensorModelResult::NoUpdate);
    }
}
