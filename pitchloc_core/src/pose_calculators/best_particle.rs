// pitchloc_core/src/pose_calculators/best_particle.rs

use super::{PoseCalculator, PoseEstimate};
use crate::sample_set::SampleSet;
use rand_chacha::ChaCha8Rng;

/// Publishes the heaviest sample verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestParticle;

impl PoseCalculator for BestParticle {
    fn compute(&mut self, samples: &mut SampleSet, _rng: &mut ChaCha8Rng) -> Option<PoseEstimate> {
        let total: f64 = samples.iter().map(|s| s.weight).sum();
        // Ties resolve to the first sample.
        let best = samples
            .iter()
            .reduce(|best, s| if s.weight > best.weight { s } else { best })?;
        Some(PoseEstimate {
            pose: best.pose,
            confidence: if total > 0.0 { best.weight / total } else { 0.0 },
        })
    }
}
