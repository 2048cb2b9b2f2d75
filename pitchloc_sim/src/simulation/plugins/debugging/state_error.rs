// pitchloc_sim/src/simulation/plugins/debugging/state_error.rs

use log::{debug, info};
use nalgebra::Isometry2;
use pitchloc_core::messages::RobotPose;

// =========================================================================
// == Pose Error ==
// =========================================================================

/// Difference between the true and the estimated pose.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseError {
    /// Euclidean distance, in metres.
    pub position: f64,
    /// Absolute heading difference in `[0, π]`, in radians.
    pub heading: f64,
}

impl PoseError {
    pub fn between(truth: &Isometry2<f64>, estimate: &Isometry2<f64>) -> Self {
        let position = (truth.translation.vector - estimate.translation.vector).norm();
        // The error rotation that takes the estimate to the truth.
        let heading = (truth.rotation * estimate.rotation.inverse()).angle().abs();
        Self { position, heading }
    }
}

/// Computes and logs the error of one cycle.
pub fn log_pose_error(cycle: usize, truth: &Isometry2<f64>, estimate: &RobotPose) -> PoseError {
    let error = PoseError::between(truth, &estimate.pose);
    debug!(
        "Cycle {} State Error | Pos Err: {:.3}m | Att Err: {:.3}° | validity {:.2}",
        cycle,
        error.position,
        error.heading.to_degrees(),
        estimate.validity
    );
    error
}

// =========================================================================
// == Run Statistics ==
// =========================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorSummary {
    pub cycles: usize,
    sum_position: f64,
    sum_heading: f64,
    pub max_position: f64,
    pub max_heading: f64,
    pub last: Option<PoseError>,
}

impl ErrorSummary {
    pub fn record(&mut self, error: PoseError) {
        self.cycles += 1;
        self.sum_position += error.position;
        self.sum_heading += error.heading;
        self.max_position = self.max_position.max(error.position);
        self.max_heading = self.max_heading.max(error.heading);
        self.last = Some(error);
    }

    pub fn mean_position(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.sum_position / self.cycles as f64
        }
    }

    pub fn mean_heading(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.sum_heading / self.cycles as f64
        }
    }

    pub fn log(&self, name: &str) {
        let last = self.last.unwrap_or_default();
        info!(
            "Scenario '{}' | {} cycles | Pos Err mean {:.3}m max {:.3}m final {:.3}m | Att Err mean {:.2}° max {:.2}° final {:.2}°",
            name,
            self.cycles,
            self.mean_position(),
            self.max_position,
            last.position,
            self.mean_heading().to_degrees(),
            self.max_heading.to_degrees(),
            last.heading.to_degrees()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector2;
    use std::f64::consts::PI;

    #[test]
    fn test_heading_error_wraps_around() {
        let truth = Isometry2::new(Vector2::new(1.0, 0.0), PI - 0.1);
        let estimate = Isometry2::new(Vector2::new(1.0, 0.3), -PI + 0.1);
        let error = PoseError::between(&truth, &estimate);
        assert_abs_diff_eq!(error.position, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(error.heading, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_summary_tracks_mean_and_maximum() {
        let mut summary = ErrorSummary::default();
        assert_eq!(summary.mean_position(), 0.0);
        summary.record(PoseError { position: 1.0, heading: 0.5 });
        summary.record(PoseError { position: 0.2, heading: 0.1 });
        assert_eq!(summary.cycles, 2);
        assert_abs_diff_eq!(summary.mean_position(), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.mean_heading(), 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.max_position, 1.0, epsilon = 1e-12);
        assert_eq!(summary.last.map(|e| e.position), Some(0.2));
    }
}
