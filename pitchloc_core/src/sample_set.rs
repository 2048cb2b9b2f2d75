// pitchloc_core/src/sample_set.rs

use crate::error::LocalizationError;
use crate::geometry::{heading, position};
use nalgebra::{Isometry2, Point2};

/// One pose hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub pose: Isometry2<f64>,
    /// Importance weight, never negative.
    pub weight: f64,
    /// Lineage id used by the particle history pose calculator.
    pub lineage: usize,
}

impl Sample {
    pub fn new(pose: Isometry2<f64>, lineage: usize) -> Self {
        Self {
            pose,
            weight: 1.0,
            lineage,
        }
    }

    pub fn position(&self) -> Point2<f64> {
        position(&self.pose)
    }

    pub fn heading(&self) -> f64 {
        heading(&self.pose)
    }
}

/// Aggregate weight bookkeeping of the population.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeightStatistics {
    /// Sum of all weights after the last sensor update.
    pub total: f64,
    /// Long-term average weight.
    pub slow: f64,
    /// Short-term average weight.
    pub fast: f64,
}

impl WeightStatistics {
    /// `fast / slow`, once a long-term average exists.
    pub fn ratio(&self) -> Option<f64> {
        (self.slow > 0.0).then(|| self.fast / self.slow)
    }
}

/// Read-only copy of the population for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSetSnapshot {
    pub samples: Vec<Sample>,
    pub statistics: WeightStatistics,
}

/// The population of pose hypotheses, double-buffered for resampling.
///
/// Both buffers always hold `len()` samples. A new generation is written into
/// the back buffer while the previous one stays readable, then the buffers
/// trade places; no per-cycle allocation happens.
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<Sample>,
    back: Vec<Sample>,
    pending_size: Option<usize>,
    statistics: WeightStatistics,
}

impl SampleSet {
    /// A population of `size` samples at the origin.
    pub fn new(size: usize) -> Result<Self, LocalizationError> {
        if size == 0 {
            return Err(LocalizationError::InvalidSampleCount(size));
        }
        let initial = Sample::new(Isometry2::identity(), 0);
        Ok(Self {
            samples: vec![initial; size],
            back: vec![initial; size],
            pending_size: None,
            statistics: WeightStatistics::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Sample> {
        self.samples.iter_mut()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    pub fn statistics(&self) -> WeightStatistics {
        self.statistics
    }

    /// Schedules a size change. It takes effect at the next
    /// [`apply_pending_size`](Self::apply_pending_size), never mid-cycle.
    pub fn request_size(&mut self, size: usize) -> Result<(), LocalizationError> {
        if size == 0 {
            return Err(LocalizationError::InvalidSampleCount(size));
        }
        self.pending_size = (size != self.len()).then_some(size);
        Ok(())
    }

    /// Applies a scheduled size change. Returns `true` if the population was
    /// resized; its content is then undefined and must be reinitialized.
    pub fn apply_pending_size(&mut self) -> bool {
        let Some(size) = self.pending_size.take() else {
            return false;
        };
        let initial = Sample::new(Isometry2::identity(), 0);
        self.samples.resize(size, initial);
        self.back.resize(size, initial);
        self.statistics = WeightStatistics::default();
        true
    }

    /// Swaps the buffers and returns `(previous generation, next generation)`.
    /// The caller overwrites every slot of the next generation.
    pub fn swap_generations(&mut self) -> (&[Sample], &mut [Sample]) {
        std::mem::swap(&mut self.samples, &mut self.back);
        (&self.back, &mut self.samples)
    }

    pub fn set_all_weights(&mut self, weight: f64) {
        for sample in &mut self.samples {
            sample.weight = weight;
        }
    }

    /// Recomputes the total weight of the current generation.
    pub fn update_total_weight(&mut self) -> f64 {
        self.statistics.total = self.samples.iter().map(|s| s.weight).sum();
        self.statistics.total
    }

    /// Folds the current mean weight into the slow and fast averages.
    ///
    /// Nothing changes while the total weight is zero. The first evidence
    /// seeds the slow average; the fast average is seeded as well when
    /// `seed_fast` is set, otherwise it starts from zero and the first cycles
    /// inject templates aggressively.
    pub fn adapt_weightings(&mut self, alpha_slow: f64, alpha_fast: f64, seed_fast: bool) {
        let total = self.update_total_weight();
        if total <= 0.0 {
            return;
        }
        let mean = total / self.len() as f64;
        let stats = &mut self.statistics;
        if stats.slow > 0.0 {
            stats.slow += alpha_slow * (mean - stats.slow);
            stats.fast += alpha_fast * (mean - stats.fast);
        } else {
            stats.slow = mean;
            if seed_fast {
                stats.fast = mean;
            }
        }
    }

    pub fn snapshot(&self) -> SampleSetSnapshot {
        SampleSetSnapshot {
            samples: self.samples.clone(),
            statistics: self.statistics,
        }
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pose;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_empty_sample_set_is_rejected() {
        assert_eq!(
            SampleSet::new(0).unwrap_err(),
            LocalizationError::InvalidSampleCount(0)
        );
    }

    #[test]
    fn test_size_change_waits_for_apply() {
        let mut set = SampleSet::new(10).unwrap();
        set.request_size(20).unwrap();
        assert_eq!(set.len(), 10);
        assert!(set.apply_pending_size());
        assert_eq!(set.len(), 20);
        assert!(!set.apply_pending_size());
        assert!(set.request_size(0).is_err());
    }

    #[test]
    fn test_swap_generations_keeps_previous_readable() {
        let mut set = SampleSet::new(3).unwrap();
        for (i, sample) in set.iter_mut().enumerate() {
            sample.pose = pose(i as f64, 0.0, 0.0);
        }
        let (previous, next) = set.swap_generations();
        for (slot, old) in next.iter_mut().zip(previous.iter().rev()) {
            *slot = *old;
        }
        let xs: Vec<f64> = set.iter().map(|s| s.position().x).collect();
        assert_eq!(xs, vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_adapt_weightings_seeds_then_smooths() {
        let mut set = SampleSet::new(4).unwrap();
        set.set_all_weights(0.5);
        set.adapt_weightings(0.1, 0.5, false);
        let stats = set.statistics();
        assert_abs_diff_eq!(stats.total, 2.0);
        assert_abs_diff_eq!(stats.slow, 0.5);
        assert_abs_diff_eq!(stats.fast, 0.0);
        assert_abs_diff_eq!(stats.ratio().unwrap(), 0.0);

        set.set_all_weights(1.0);
        set.adapt_weightings(0.1, 0.5, false);
        let stats = set.statistics();
        assert_abs_diff_eq!(stats.slow, 0.55, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.fast, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_adapt_weightings_ignores_zero_total() {
        let mut set = SampleSet::new(4).unwrap();
        set.set_all_weights(1.0);
        set.adapt_weightings(0.1, 0.5, true);
        set.set_all_weights(0.0);
        set.adapt_weightings(0.1, 0.5, true);
        let stats = set.statistics();
        assert_abs_diff_eq!(stats.slow, 1.0);
        assert_abs_diff_eq!(stats.fast, 1.0);
        assert_abs_diff_eq!(stats.total, 0.0);
    }
}
