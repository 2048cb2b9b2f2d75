// pitchloc_core/src/pose_calculators/overall_average.rs

use super::{effective_weights, Moments, PoseCalculator, PoseEstimate};
use crate::sample_set::SampleSet;
use rand_chacha::ChaCha8Rng;

/// Weighted mean over the whole population, with a circular mean heading.
///
/// Meaningless for multi-modal beliefs; useful when the filter is known to
/// be tracking and as a reference in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverallAverage;

impl PoseCalculator for OverallAverage {
    fn compute(&mut self, samples: &mut SampleSet, _rng: &mut ChaCha8Rng) -> Option<PoseEstimate> {
        let weights = effective_weights(samples.as_slice());
        let moments = Moments::of(samples.iter().zip(weights.iter().copied()))?;
        Some(PoseEstimate {
            pose: moments.pose,
            confidence: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose_calculators::test_support::sample_set;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use std::f64::consts::PI;

    #[test]
    fn test_weighted_mean_with_wrapped_heading() {
        let mut samples = sample_set(&[(0.0, 0.0, PI - 0.2, 3.0), (4.0, 2.0, -PI + 0.2, 1.0)]);
        let estimate = OverallAverage
            .compute(&mut samples, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap();
        assert_abs_diff_eq!(estimate.pose.translation.vector.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(estimate.pose.translation.vector.y, 0.5, epsilon = 1e-12);
        // The mean heading stays near ±π instead of collapsing to 0.
        assert!(estimate.pose.rotation.angle().abs() > PI - 0.2);
    }
}
