// pitchloc_core/src/pose_calculators/mod.rs

//! Strategies that collapse the weighted sample set into the one pose the
//! engine publishes.

pub mod best_particle;
pub mod binning;
pub mod kmeans;
pub mod overall_average;
pub mod particle_history;

use crate::config::PoseCalculatorKind;
use crate::field::FieldDimensions;
use crate::geometry::circular_mean;
use crate::messages::PoseHypothesis;
use crate::sample_set::{Sample, SampleSet};
use dyn_clone::DynClone;
use nalgebra::{Isometry2, Matrix2, Point2, Vector2};
use rand_chacha::ChaCha8Rng;
use std::fmt::Debug;

pub use best_particle::BestParticle;
pub use binning::Binning2D;
pub use kmeans::KMeansClustering;
pub use overall_average::OverallAverage;
pub use particle_history::ParticleHistory;

/// Result of one pose computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    pub pose: Isometry2<f64>,
    /// Share of the population (by weight) supporting `pose`, in `[0, 1]`.
    pub confidence: f64,
}

// --- Core Abstraction ---

/// The contract for any algorithm that reduces the population to one pose.
pub trait PoseCalculator: Debug + DynClone + Send + Sync {
    /// Computes the representative pose of the current population.
    ///
    /// Calculators that track ancestry may rewrite sample lineages; the
    /// poses and weights are never changed. Returns `None` when the
    /// population supports no pose at all.
    fn compute(&mut self, samples: &mut SampleSet, rng: &mut ChaCha8Rng) -> Option<PoseEstimate>;

    /// Called after the population was reinitialized.
    fn init(&mut self, _samples: &mut SampleSet) {}

    /// Lineage id for a sample injected from a template.
    fn new_lineage(&mut self) -> usize {
        0
    }

    /// The modes found by the last `compute`, heaviest first. Calculators
    /// without a notion of modes return nothing.
    fn hypotheses(&self) -> Vec<PoseHypothesis> {
        Vec::new()
    }
}
dyn_clone::clone_trait_object!(PoseCalculator);

/// Creates the configured calculator.
pub fn create_pose_calculator(
    kind: PoseCalculatorKind,
    field: &FieldDimensions,
    number_of_samples: usize,
) -> Box<dyn PoseCalculator> {
    match kind {
        PoseCalculatorKind::BestParticle => Box::new(BestParticle),
        PoseCalculatorKind::OverallAverage => Box::new(OverallAverage),
        PoseCalculatorKind::Binning => Box::new(Binning2D::new(field)),
        PoseCalculatorKind::KMeans => Box::new(KMeansClustering::new()),
        PoseCalculatorKind::ParticleHistory => Box::new(ParticleHistory::new(number_of_samples)),
    }
}

// --- Shared helpers ---

/// Sample weights, or all ones when the population carries no weight.
pub(crate) fn effective_weights(samples: &[Sample]) -> Vec<f64> {
    let total: f64 = samples.iter().map(|s| s.weight).sum();
    if total > 0.0 {
        samples.iter().map(|s| s.weight).collect()
    } else {
        vec![1.0; samples.len()]
    }
}

/// Weighted first and second moments of a group of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Moments {
    pub pose: Isometry2<f64>,
    pub weight: f64,
    pub covariance: Matrix2<f64>,
}

impl Moments {
    /// `None` for an empty or weightless group. The heading is the weighted
    /// circular mean; it falls back to 0 when the headings cancel out.
    pub fn of<'a, I>(members: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a Sample, f64)> + Clone,
    {
        let mut weight = 0.0;
        let mut sum = Vector2::<f64>::zeros();
        for (sample, w) in members.clone() {
            weight += w;
            sum += sample.pose.translation.vector * w;
        }
        if weight <= 0.0 {
            return None;
        }
        let mean = sum / weight;
        let mut covariance = Matrix2::<f64>::zeros();
        for (sample, w) in members.clone() {
            let d = sample.pose.translation.vector - mean;
            covariance += d * d.transpose() * w;
        }
        covariance /= weight;
        let heading = circular_mean(members.into_iter().map(|(s, w)| (s.heading(), w))).unwrap_or(0.0);
        Some(Self {
            pose: Isometry2::new(mean, heading),
            weight,
            covariance,
        })
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::from(self.pose.translation.vector)
    }

    pub fn hypothesis(&self, total_weight: f64) -> PoseHypothesis {
        PoseHypothesis {
            pose: self.pose,
            weight_share: if total_weight > 0.0 { self.weight / total_weight } else { 0.0 },
            covariance: self.covariance,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::geometry::pose;
    use crate::sample_set::SampleSet;

    /// A population with the given `(x, y, rotation, weight)` samples.
    pub fn sample_set(samples: &[(f64, f64, f64, f64)]) -> SampleSet {
        let mut set = SampleSet::new(samples.len()).unwrap();
        for (i, (sample, &(x, y, rotation, weight))) in set.iter_mut().zip(samples).enumerate() {
            sample.pose = pose(x, y, rotation);
            sample.weight = weight;
            sample.lineage = i;
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pose;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_moments_wrap_heading() {
        let a = Sample::new(pose(1.0, 0.0, PI - 0.1), 0);
        let b = Sample::new(pose(3.0, 2.0, -PI + 0.1), 0);
        let moments = Moments::of([(&a, 1.0), (&b, 1.0)]).unwrap();
        assert_abs_diff_eq!(moments.position().x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(moments.position().y, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(moments.pose.rotation.angle().abs(), PI, epsilon = 1e-9);
        assert_abs_diff_eq!(moments.covariance[(0, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(moments.covariance[(0, 1)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(moments.weight, 2.0);
    }

    #[test]
    fn test_moments_of_weightless_group() {
        let a = Sample::new(pose(1.0, 0.0, 0.0), 0);
        assert!(Moments::of([(&a, 0.0)]).is_none());
        assert!(Moments::of(std::iter::empty::<(&Sample, f64)>()).is_none());
    }

    #[test]
    fn test_effective_weights_fall_back_to_uniform() {
        let mut samples = vec![Sample::new(pose(0.0, 0.0, 0.0), 0); 3];
        for s in &mut samples {
            s.weight = 0.0;
        }
        assert_eq!(effective_weights(&samples), vec![1.0; 3]);
        samples[1].weight = 2.0;
        assert_eq!(effective_weights(&samples), vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_factory_builds_every_kind() {
        let field = FieldDimensions::default();
        for kind in [
            PoseCalculatorKind::BestParticle,
            PoseCalculatorKind::OverallAverage,
            PoseCalculatorKind::Binning,
            PoseCalculatorKind::KMeans,
            PoseCalculatorKind::ParticleHistory,
        ] {
            let mut calculator = create_pose_calculator(kind, &field, 4);
            let mut samples = test_support::sample_set(&[(1.0, 1.0, 0.5, 1.0); 4]);
            calculator.init(&mut samples);
            let mut rng = <ChaCha8Rng as rand::SeedableRng>::seed_from_u64(0);
            let estimate = calculator.compute(&mut samples, &mut rng).unwrap();
            assert_abs_diff_eq!(estimate.pose.translation.vector.x, 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(estimate.pose.rotation.angle(), 0.5, epsilon = 1e-9);
        }
    }
}
