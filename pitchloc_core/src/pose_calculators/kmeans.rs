// pitchloc_core/src/pose_calculators/kmeans.rs

use super::{effective_weights, Moments, PoseCalculator, PoseEstimate};
use crate::messages::PoseHypothesis;
use crate::sample_set::SampleSet;
use nalgebra::{Point2, Vector2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Maximum number of clusters.
pub const K: usize = 5;
/// Minimum distance between two initial cluster centres, in metres.
pub const MIN_SEED_DISTANCE: f64 = 1.0;
pub const MAX_ITERATIONS: usize = 10;

/// k-means clustering of the sample positions.
///
/// The first centre is always the previously published position, so a
/// tracked mode keeps its cluster between cycles. The remaining centres are
/// samples at least [`MIN_SEED_DISTANCE`] away from every centre chosen so
/// far, scanned from a random start index.
#[derive(Debug, Clone, Default)]
pub struct KMeansClustering {
    previous: Option<Point2<f64>>,
    clusters: Vec<PoseHypothesis>,
}

impl KMeansClustering {
    pub fn new() -> Self {
        Self::default()
    }

    fn seeds(&self, positions: &[Point2<f64>], rng: &mut ChaCha8Rng) -> Vec<Point2<f64>> {
        let mut seeds = Vec::with_capacity(K);
        seeds.push(self.previous.unwrap_or(positions[0]));
        let start = rng.gen_range(0..positions.len());
        for offset in 1..=positions.len() {
            if seeds.len() == K {
                break;
            }
            let candidate = positions[(start + offset) % positions.len()];
            if seeds
                .iter()
                .all(|seed| (candidate - seed).norm() >= MIN_SEED_DISTANCE)
            {
                seeds.push(candidate);
            }
        }
        seeds
    }
}

fn closest(centres: &[Point2<f64>], p: &Point2<f64>) -> usize {
    centres
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - p).norm_squared().total_cmp(&(*b - p).norm_squared()))
        .map_or(0, |(index, _)| index)
}

impl PoseCalculator for KMeansClustering {
    fn compute(&mut self, samples: &mut SampleSet, rng: &mut ChaCha8Rng) -> Option<PoseEstimate> {
        if samples.is_empty() {
            return None;
        }
        let weights = effective_weights(samples.as_slice());
        let total: f64 = weights.iter().sum();
        let positions: Vec<Point2<f64>> = samples.iter().map(|s| s.position()).collect();

        let mut centres = self.seeds(&positions, rng);
        let mut assignment = vec![usize::MAX; positions.len()];
        for _ in 0..MAX_ITERATIONS {
            let mut changed = false;
            for (slot, p) in assignment.iter_mut().zip(&positions) {
                let cluster = closest(&centres, p);
                if *slot != cluster {
                    *slot = cluster;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            for (k, centre) in centres.iter_mut().enumerate() {
                let (sum, weight) = positions
                    .iter()
                    .zip(&weights)
                    .zip(&assignment)
                    .filter(|(_, &a)| a == k)
                    .fold((Vector2::<f64>::zeros(), 0.0), |(sum, weight), ((p, &w), _)| {
                        (sum + p.coords * w, weight + w)
                    });
                if weight > 0.0 {
                    *centre = Point2::from(sum / weight);
                }
            }
        }

        let mut clusters: Vec<Moments> = (0..centres.len())
            .filter_map(|k| {
                Moments::of(
                    samples
                        .iter()
                        .zip(weights.iter().copied())
                        .zip(&assignment)
                        .filter(move |&(_, &a)| a == k)
                        .map(|(member, _)| member),
                )
            })
            .collect();
        clusters.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        self.clusters = clusters.iter().map(|c| c.hypothesis(total)).collect();

        let best = clusters.first()?;
        self.previous = Some(best.position());
        Some(PoseEstimate {
            pose: best.pose,
            confidence: best.hypothesis(total).weight_share,
        })
    }

    fn init(&mut self, _samples: &mut SampleSet) {
        self.previous = None;
        self.clusters.clear();
    }

    fn hypotheses(&self) -> Vec<PoseHypothesis> {
        self.clusters.clone()
    }
}
