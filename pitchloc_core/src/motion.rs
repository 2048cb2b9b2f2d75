// pitchloc_core/src/motion.rs

use crate::config::MotionNoise;
use crate::field::FieldDimensions;
use crate::geometry::uniform_noise;
use crate::sample_set::Sample;
use nalgebra::{Isometry2, Point2, Translation2, UnitComplex, Vector2};
use rand::Rng;

/// Propagates samples by the odometry delta of one cycle.
#[derive(Debug, Clone)]
pub struct MotionModel {
    pub noise: MotionNoise,
}

impl MotionModel {
    pub fn new(noise: MotionNoise) -> Self {
        Self { noise }
    }

    /// Per-axis noise bounds `(x, y, rotation)` in the robot frame for a delta.
    pub fn error_bounds(&self, delta: &Isometry2<f64>) -> (f64, f64, f64) {
        let n = &self.noise;
        let t = delta.translation.vector;
        let moved = t.norm();
        let angle = delta.rotation.angle();
        let rotation = n
            .rotation_noise
            .max(moved * n.moved_dist_weight)
            .max(angle.abs() * n.moved_angle_weight);
        let x = n
            .translation_noise
            .max((t.x * n.major_dir_trans_weight).abs())
            .max((t.y * n.minor_dir_trans_weight).abs());
        let y = n
            .translation_noise
            .max((t.y * n.major_dir_trans_weight).abs())
            .max((t.x * n.minor_dir_trans_weight).abs());
        (x, y, rotation)
    }

    /// Moves every sample by `delta` expressed in its own frame, optionally
    /// with uniform noise, and keeps it on the carpet.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        samples: &mut [Sample],
        delta: &Isometry2<f64>,
        with_noise: bool,
        field: &FieldDimensions,
        rng: &mut R,
    ) {
        let (x_error, y_error, rotation_error) = self.error_bounds(delta);
        for sample in samples {
            let step = if with_noise {
                let t = delta.translation.vector
                    + Vector2::new(uniform_noise(rng, x_error), uniform_noise(rng, y_error));
                let rotation = delta.rotation.angle() + uniform_noise(rng, rotation_error);
                Isometry2::from_parts(Translation2::from(t), UnitComplex::new(rotation))
            } else {
                *delta
            };
            let moved = sample.pose * step;
            let clipped = field.clip_to_carpet(&Point2::from(moved.translation.vector));
            sample.pose = Isometry2::from_parts(Translation2::from(clipped.coords), moved.rotation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pose;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_noise_free_motion_is_applied_in_sample_frame() {
        let model = MotionModel::new(MotionNoise::default());
        let field = FieldDimensions::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut samples = [Sample::new(pose(1.0, 1.0, FRAC_PI_2), 0)];
        model.apply(&mut samples, &pose(0.5, 0.0, 0.1), false, &field, &mut rng);
        assert_abs_diff_eq!(samples[0].position().x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(samples[0].position().y, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(samples[0].heading(), FRAC_PI_2 + 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_noise_stays_within_bounds() {
        let model = MotionModel::new(MotionNoise::default());
        let field = FieldDimensions::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let delta = pose(0.2, 0.0, 0.0);
        let (x_error, y_error, rotation_error) = model.error_bounds(&delta);
        assert_abs_diff_eq!(x_error, 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(y_error, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(rotation_error, 0.02, epsilon = 1e-12);

        let mut samples = vec![Sample::new(Isometry2::identity(), 0); 200];
        model.apply(&mut samples, &delta, true, &field, &mut rng);
        for s in &samples {
            assert!((s.position().x - 0.2).abs() <= x_error + 1e-12);
            assert!(s.position().y.abs() <= y_error + 1e-12);
            assert!(s.heading().abs() <= rotation_error + 1e-12);
        }
    }

    #[test]
    fn test_samples_are_clipped_to_carpet() {
        let model = MotionModel::new(MotionNoise::default());
        let field = FieldDimensions::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut samples = [Sample::new(pose(3.6, 0.0, 0.0), 0)];
        model.apply(&mut samples, &pose(1.0, 0.0, 0.0), false, &field, &mut rng);
        assert_abs_diff_eq!(samples[0].position().x, field.half_carpet_length());
    }
}
