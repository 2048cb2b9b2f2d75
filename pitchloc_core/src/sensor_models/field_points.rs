// pitchloc_core/src/sensor_models/field_points.rs

use super::likelihood::{landmark_likelihood, LandmarkDeviations};
use super::{combine, SensorContext};
use crate::config::SensorDeviations;
use crate::geometry::angle_of;
use crate::messages::ObservedLine;
use crate::sample_set::Sample;
use nalgebra::Point2;

/// Scores end points of observed line segments against the closest point on
/// a field line of matching orientation.
#[derive(Debug, Clone)]
pub struct FieldPointsSensorModel {
    deviations: LandmarkDeviations,
}

/// An observed point and the other end of its line, both in the robot frame.
#[derive(Debug, Clone, Copy)]
struct LinePoint {
    point: Point2<f64>,
    neighbour: Point2<f64>,
    distance: f64,
    bearing: f64,
}

impl LinePoint {
    fn from_observation(lines: &[ObservedLine], index: usize) -> Option<Self> {
        let line = lines.get(index / 2)?;
        let (point, neighbour) = if index % 2 == 0 {
            (line.start, line.end)
        } else {
            (line.end, line.start)
        };
        Some(Self {
            point,
            neighbour,
            distance: point.coords.norm(),
            bearing: angle_of(&point.coords)?,
        })
    }
}

impl FieldPointsSensorModel {
    pub fn new(deviations: &SensorDeviations) -> Self {
        Self {
            deviations: LandmarkDeviations {
                angle: deviations.field_point_angle,
                distance: deviations.field_point_distance,
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
        let points: Vec<LinePoint> = selected
            .iter()
            .filter_map(|&index| LinePoint::from_observation(&context.frame.lines.lines, index))
            .collect();
        let camera_height = context.frame.camera.height;

        'samples: for (sample, weighting) in samples.iter().zip(weightings.iter_mut()) {
            let mut product = None;
            for observed in &points {
                // One implausible point disqualifies the whole hypothesis for this cycle.
                if !context
                    .validity
                    .is_plausible(&sample.pose, observed.distance, observed.bearing)
                {
                    continue 'samples;
                }
                let on_field = sample.pose * observed.point;
                let neighbour = sample.pose * observed.neighbour;
                let Some(model) = context.field_model.closest_line_point(&on_field, &neighbour)
                else {
                    continue;
                };
                let contribution = landmark_likelihood(
                    &sample.pose,
                    &model,
                    &observed.point,
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
    use crate::geometry::pose;
    use crate::messages::FrameInput;
    use crate::sensor_models::test_support::Fixture;
    use crate::sensor_models::{SensorModel, SensorModelResult};
    use crate::validity::GoalNetValidityChecker;
    use approx::assert_abs_diff_eq;

    fn frame_with_line(start: Point2<f64>, end: Point2<f64>) -> FrameInput {
        let mut frame = FrameInput::default();
        frame.lines.lines.push(ObservedLine { start, end });
        frame
    }

    #[test]
    fn test_points_on_side_line_score_perfectly() {
        // Robot on the centre line facing the left side line, 1 m away.
        let robot = pose(0.5, 1.0, std::f64::consts::FRAC_PI_2);
        let fixture = Fixture::new(frame_with_line(Point2::new(1.0, 0.5), Point2::new(1.0, -0.5)));
        let model = SensorModel::FieldPoints(FieldPointsSensorModel::new(&SensorDeviations::default()));
        let samples = [Sample::new(robot, 0), Sample::new(pose(0.5, 0.6, std::f64::consts::FRAC_PI_2), 1)];
        let mut weightings = Vec::new();
        let result = model.compute_weightings(&samples, &[0, 1], &fixture.context(), &mut weightings);
        assert_eq!(result, SensorModelResult::FullUpdate);
        assert_abs_diff_eq!(weightings[0].unwrap(), 1.0, epsilon = 1e-9);
        assert!(weightings[1].unwrap() < weightings[0].unwrap());
    }

    #[test]
    fn test_points_inside_goal_net_leave_sample_unscored() {
        let fixture = Fixture::new(frame_with_line(Point2::new(2.0, 0.3), Point2::new(2.0, -0.3)));
        let checker = GoalNetValidityChecker::new(&fixture.field, 0.1);
        let context = super::SensorContext {
            validity: &checker,
            ..fixture.context()
        };
        let model = SensorModel::FieldPoints(FieldPointsSensorModel::new(&SensorDeviations::default()));
        // From here, 2 m straight ahead is behind the opponent goal net.
        let samples = [Sample::new(pose(1.85, 0.05, 0.0), 0)];
        let mut weightings = Vec::new();
        let result = model.compute_weightings(&samples, &[0], &context, &mut weightings);
        assert_eq!(result, SensorModelResult::NoUpdate);
        assert_eq!(weightings, vec![None]);
    }
}
