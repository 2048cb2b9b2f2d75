// pitchloc_core/src/pose_calculators/particle_history.rs

use super::{Moments, PoseCalculator, PoseEstimate};
use crate::messages::PoseHypothesis;
use crate::sample_set::{Sample, SampleSet};
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// A challenger lineage must be this many percent larger than the current
/// one before the published lineage switches.
pub const SWITCH_PERCENTAGE: usize = 50;
/// Lineages need more than this many samples to be reported as hypotheses.
pub const MIN_HYPOTHESIS_SIZE: usize = 3;

/// Publishes the mean of the largest lineage.
///
/// Every sample carries the id of the lineage it descends from; resampled
/// copies inherit the id and injected templates start a new one. Following
/// a lineage instead of a spatial cluster keeps the output stable when the
/// population splits. Each cycle one random sample that lies strictly inside
/// the bounding box of the largest lineage is adopted by it ("bleeding"), so
/// lineages covering the same spot merge over time.
#[derive(Debug, Clone)]
pub struct ParticleHistory {
    counts: Vec<usize>,
    free: Vec<usize>,
    last: Option<usize>,
    hypotheses: Vec<PoseHypothesis>,
}

impl ParticleHistory {
    pub fn new(number_of_samples: usize) -> Self {
        Self {
            counts: vec![0; 2 * number_of_samples],
            free: Vec::new(),
            last: None,
            hypotheses: Vec::new(),
        }
    }

    /// Index of the published lineage after the last `compute`.
    pub fn current_lineage(&self) -> Option<usize> {
        self.last
    }

    fn count_lineages(&mut self, samples: &[Sample]) {
        let needed = (2 * samples.len()).max(samples.iter().map(|s| s.lineage + 1).max().unwrap_or(0));
        if self.counts.len() < needed {
            self.counts.resize(needed, 0);
        }
        self.counts.iter_mut().for_each(|c| *c = 0);
        for sample in samples {
            self.counts[sample.lineage] += 1;
        }
        self.free = (0..self.counts.len()).rev().filter(|&id| self.counts[id] == 0).collect();
    }

    fn largest(&self) -> usize {
        // First maximum wins.
        self.counts
            .iter()
            .enumerate()
            .fold((0, 0), |best, (id, &count)| if count > best.1 { (id, count) } else { best })
            .0
    }

    fn bleed(&mut self, samples: &mut [Sample], target: usize, rng: &mut ChaCha8Rng) {
        let index = rng.gen_range(0..samples.len());
        let candidate = samples[index];
        if candidate.lineage == target {
            return;
        }
        let mut members = samples.iter().filter(|s| s.lineage == target).map(|s| s.position());
        let Some(first) = members.next() else {
            return;
        };
        let (min, max) = members.fold((first, first), |(min, max), p| {
            (min.inf(&p), max.sup(&p))
        });
        let p = candidate.position();
        if p.x > min.x && p.y > min.y && p.x < max.x && p.y < max.y {
            let old = candidate.lineage;
            samples[index].lineage = target;
            self.counts[target] += 1;
            self.counts[old] -= 1;
            if self.counts[old] == 0 {
                self.free.push(old);
            }
        }
    }
}

impl PoseCalculator for ParticleHistory {
    fn compute(&mut self, samples: &mut SampleSet, rng: &mut ChaCha8Rng) -> Option<PoseEstimate> {
        if samples.is_empty() {
            return None;
        }
        self.count_lineages(samples.as_slice());
        let mut best = self.largest();
        self.bleed(samples.as_mut_slice(), best, rng);

        if let Some(last) = self.last.filter(|&last| last != best && self.counts[last] > 0) {
            if self.counts[best] * 100 < self.counts[last] * (100 + SWITCH_PERCENTAGE) {
                best = last;
            } else {
                debug!(
                    "Lineage switch {last} -> {best} ({} vs {} samples)",
                    self.counts[last], self.counts[best]
                );
            }
        }
        self.last = Some(best);

        let n = samples.len() as f64;
        let group = |id: usize| {
            Moments::of(
                samples
                    .iter()
                    .filter(move |s| s.lineage == id)
                    .map(|s| (s, 1.0)),
            )
        };
        let mut lineages: Vec<(usize, Moments)> = (0..self.counts.len())
            .filter(|&id| self.counts[id] > MIN_HYPOTHESIS_SIZE)
            .filter_map(|id| Some((id, group(id)?)))
            .collect();
        lineages.sort_by(|a, b| b.1.weight.total_cmp(&a.1.weight));
        self.hypotheses = lineages.iter().map(|(_, m)| m.hypothesis(n)).collect();

        let moments = group(best)?;
        Some(PoseEstimate {
            pose: moments.pose,
            confidence: moments.weight / n,
        })
    }

    /// Every sample starts its own lineage; the upper half of the id range
    /// is kept free for injected templates.
    fn init(&mut self, samples: &mut SampleSet) {
        let n = samples.len();
        self.counts = vec![0; 2 * n];
        for (id, sample) in samples.iter_mut().enumerate() {
            sample.lineage = id;
            self.counts[id] = 1;
        }
        self.free = (n..2 * n).rev().collect();
        self.last = None;
        self.hypotheses.clear();
    }

    fn new_lineage(&mut self) -> usize {
        match self.free.pop() {
            Some(id) => {
                self.counts[id] = 1;
                id
            }
            // Only reachable if more samples are injected than exist.
            None => self.last.unwrap_or(0),
        }
    }

    fn hypotheses(&self) -> Vec<PoseHypothesis> {
        self.hypotheses.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose_calculators::test_support::sample_set;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    fn set_lineages(samples: &mut SampleSet, lineages: &[usize]) {
        for (sample, &lineage) in samples.iter_mut().zip(lineages) {
            sample.lineage = lineage;
        }
    }

    #[test]
    fn test_init_assigns_own_lineages_and_free_ids() {
        let mut samples = sample_set(&[(0.0, 0.0, 0.0, 1.0); 4]);
        let mut history = ParticleHistory::new(4);
        history.init(&mut samples);
        let lineages: Vec<usize> = samples.iter().map(|s| s.lineage).collect();
        assert_eq!(lineages, vec![0, 1, 2, 3]);
        assert_eq!(history.new_lineage(), 4);
        assert_eq!(history.new_lineage(), 5);
    }

    #[test]
    fn test_publishes_mean_of_largest_lineage() {
        let mut samples = sample_set(&[
            (1.0, 1.0, 0.2, 1.0),
            (1.2, 1.0, 0.2, 1.0),
            (1.1, 1.3, 0.2, 1.0),
            (-2.0, 0.0, 1.0, 1.0),
        ]);
        set_lineages(&mut samples, &[2, 2, 2, 5]);
        let mut history = ParticleHistory::new(4);
        let estimate = history
            .compute(&mut samples, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap();
        assert_eq!(history.current_lineage(), Some(2));
        assert_abs_diff_eq!(estimate.pose.translation.vector.x, 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(estimate.pose.rotation.angle(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(estimate.confidence, 0.75, epsilon = 1e-12);
        // Three samples are not enough for a hypothesis.
        assert!(history.hypotheses().is_empty());
    }

    #[test]
    fn test_lineage_switch_needs_a_clear_majority() {
        let positions: Vec<(f64, f64, f64, f64)> = (0..12)
            .map(|i| if i < 6 { (-2.0, 0.0, 0.0, 1.0) } else { (2.0, 0.0, 0.0, 1.0) })
            .collect();
        let mut samples = sample_set(&positions);
        let mut history = ParticleHistory::new(12);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        set_lineages(&mut samples, &[0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1]);
        history.compute(&mut samples, &mut rng);
        assert_eq!(history.current_lineage(), Some(0));

        // 7 vs 5 is less than 50 % more.
        set_lineages(&mut samples, &[0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1]);
        let estimate = history.compute(&mut samples, &mut rng).unwrap();
        assert_eq!(history.current_lineage(), Some(0));
        assert!(estimate.pose.translation.vector.x < 0.0);

        // 8 vs 4 is enough.
        set_lineages(&mut samples, &[0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1]);
        history.compute(&mut samples, &mut rng);
        assert_eq!(history.current_lineage(), Some(1));
        let hypotheses = history.hypotheses();
        assert_eq!(hypotheses.len(), 2);
        assert_abs_diff_eq!(hypotheses[0].weight_share, 8.0 / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bleeding_adopts_samples_inside_the_largest_lineage() {
        // Lineage 0 spans a square; lineage 1 sits in its middle.
        let mut samples = sample_set(&[
            (0.0, 0.0, 0.0, 1.0),
            (1.0, 0.0, 0.0, 1.0),
            (0.0, 1.0, 0.0, 1.0),
            (1.0, 1.0, 0.0, 1.0),
            (0.5, 0.5, 0.0, 1.0),
        ]);
        set_lineages(&mut samples, &[0, 0, 0, 0, 1]);
        let mut history = ParticleHistory::new(5);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..200 {
            history.compute(&mut samples, &mut rng);
        }
        assert!(samples.iter().all(|s| s.lineage == 0));
    }
}
