// pitchloc_core/src/validity.rs

use crate::field::FieldDimensions;
use crate::geometry::{heading, normalize_angle, position, ray_segment_distance};
use dyn_clone::DynClone;
use nalgebra::{Isometry2, Point2, Vector2};
use std::f64::consts::PI;
use std::fmt::Debug;

// --- Core Abstraction ---

/// Decides whether an observation is trustworthy when interpreted from a
/// given hypothetical robot pose.
pub trait PerceptValidity: Debug + DynClone + Send + Sync {
    /// # Arguments
    /// * `sample_pose` - The pose hypothesis in field coordinates.
    /// * `distance` - Observed distance to the percept in metres.
    /// * `bearing` - Observed bearing in the robot frame.
    ///
    /// # Returns
    /// `false` if the percept should be ignored for this hypothesis.
    fn is_plausible(&self, sample_pose: &Isometry2<f64>, distance: f64, bearing: f64) -> bool;
}
dyn_clone::clone_trait_object!(PerceptValidity);

/// Trusts every percept.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl PerceptValidity for AcceptAll {
    fn is_plausible(&self, _sample_pose: &Isometry2<f64>, _distance: f64, _bearing: f64) -> bool {
        true
    }
}

// --- Goal Net Table ---

/// Number of heading sectors per cell.
pub const ANGLE_SECTORS: usize = 32;

/// Rejects percepts that would lie behind a goal net. Line detections inside
/// the net are a frequent false positive.
///
/// For every grid cell and heading sector the distance along the ray to the
/// first net segment is precomputed; an observation further away than that is
/// probably in the net.
#[derive(Debug, Clone)]
pub struct GoalNetValidityChecker {
    min: Point2<f64>,
    cell_size: f64,
    columns: usize,
    rows: usize,
    /// `f64::INFINITY` where the ray never meets a net.
    free_distance: Vec<f64>,
}

impl GoalNetValidityChecker {
    pub fn new(field: &FieldDimensions, cell_size: f64) -> Self {
        let nets = Self::net_segments(field);
        let min = Point2::new(-field.half_carpet_length(), -field.half_carpet_width());
        let columns = ((2.0 * field.half_carpet_length() / cell_size).ceil() as usize).max(1);
        let rows = ((2.0 * field.half_carpet_width() / cell_size).ceil() as usize).max(1);

        let mut free_distance = Vec::with_capacity(columns * rows * ANGLE_SECTORS);
        for row in 0..rows {
            for column in 0..columns {
                let origin = Point2::new(
                    min.x + (column as f64 + 0.5) * cell_size,
                    min.y + (row as f64 + 0.5) * cell_size,
                );
                for sector in 0..ANGLE_SECTORS {
                    let angle = sector as f64 * 2.0 * PI / ANGLE_SECTORS as f64;
                    let direction = Vector2::new(angle.cos(), angle.sin());
                    let distance = nets
                        .iter()
                        .filter_map(|(a, b)| ray_segment_distance(&origin, &direction, a, b))
                        .fold(f64::INFINITY, f64::min);
                    free_distance.push(distance);
                }
            }
        }

        Self {
            min,
            cell_size,
            columns,
            rows,
            free_distance,
        }
    }

    /// Back and side walls of both goals.
    fn net_segments(field: &FieldDimensions) -> Vec<(Point2<f64>, Point2<f64>)> {
        let x = field.half_field_length;
        let back = x + field.goal_depth;
        let y = field.half_goal_width;
        [1.0, -1.0]
            .into_iter()
            .flat_map(|s: f64| {
                [
                    (Point2::new(s * x, y), Point2::new(s * back, y)),
                    (Point2::new(s * x, -y), Point2::new(s * back, -y)),
                    (Point2::new(s * back, -y), Point2::new(s * back, y)),
                ]
            })
            .collect()
    }

    fn table_index(&self, p: &Point2<f64>, direction: f64) -> usize {
        let column = ((p.x - self.min.x) / self.cell_size).floor().max(0.0) as usize;
        let row = ((p.y - self.min.y) / self.cell_size).floor().max(0.0) as usize;
        let column = column.min(self.columns - 1);
        let row = row.min(self.rows - 1);
        let sector_width = 2.0 * PI / ANGLE_SECTORS as f64;
        let wrapped = normalize_angle(direction).rem_euclid(2.0 * PI);
        let sector = ((wrapped / sector_width + 0.5).floor() as usize) % ANGLE_SECTORS;
        (row * self.columns + column) * ANGLE_SECTORS + sector
    }

    /// True if a percept at `distance`/`bearing` from `pose` lies beyond a goal net.
    pub fn point_is_probably_in_goal_net(
        &self,
        pose: &Isometry2<f64>,
        distance: f64,
        bearing: f64,
    ) -> bool {
        let index = self.table_index(&position(pose), heading(pose) + bearing);
        distance > self.free_distance[index]
    }
}

impl PerceptValidity for GoalNetValidityChecker {
    fn is_plausible(&self, sample_pose: &Isometry2<f64>, distance: f64, bearing: f64) -> bool {
        !self.point_is_probably_in_goal_net(sample_pose, distance, bearing)
    }
}
