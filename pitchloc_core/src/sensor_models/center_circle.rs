// pitchloc_core/src/sensor_models/center_circle.rs

use super::likelihood::{landmark_likelihood, LandmarkDeviations};
use super::SensorContext;
use crate::config::SensorDeviations;
use crate::geometry::angle_of;
use crate::sample_set::Sample;
use nalgebra::Point2;

/// Scores a sighting of the centre circle against the centre spot.
#[derive(Debug, Clone)]
pub struct CenterCircleSensorModel {
    deviations: LandmarkDeviations,
}

impl CenterCircleSensorModel {
    pub fn new(deviations: &SensorDeviations) -> Self {
        Self {
            deviations: LandmarkDeviations {
                angle: deviations.center_circle_angle,
                distance: deviations.center_circle_distance,
            },
        }
    }

    pub(crate) fn compute_weightings(
        &self,
        samples: &[Sample],
        _selected: &[usize],
        context: &SensorContext,
        weightings: &mut [Option<f64>],
    ) {
        let Some(circle) = context.frame.lines.center_circle else {
            return;
        };
        let measured = circle.position;
        let Some(bearing) = angle_of(&measured.coords) else {
            return;
        };
        let distance = measured.coords.norm();
        let centre = Point2::origin();
        for (sample, weighting) in samples.iter().zip(weightings.iter_mut()) {
            if !context.validity.is_plausible(&sample.pose, distance, bearing) {
                continue;
            }
            *weighting = landmark_likelihood(
                &sample.pose,
                &centre,
                &measured,
                context.frame.camera.height,
                self.deviations,
            );
        }
    }
}
