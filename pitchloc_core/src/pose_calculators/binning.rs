// pitchloc_core/src/pose_calculators/binning.rs

use super::{effective_weights, Moments, PoseCalculator, PoseEstimate};
use crate::field::FieldDimensions;
use crate::messages::PoseHypothesis;
use crate::sample_set::{Sample, SampleSet};
use rand_chacha::ChaCha8Rng;

/// Cells per axis.
pub const GRID_CELLS: usize = 10;

/// Spatial binning over the playing field.
///
/// Samples are sorted into a `GRID_CELLS` × `GRID_CELLS` grid. The 2 × 2
/// window with the largest accumulated weight wins and the pose is the mean
/// of the samples inside it, so a multi-modal belief publishes one of its
/// modes instead of a point in between.
#[derive(Debug, Clone)]
pub struct Binning2D {
    half_length: f64,
    half_width: f64,
    last: Option<PoseHypothesis>,
}

impl Binning2D {
    pub fn new(field: &FieldDimensions) -> Self {
        Self {
            half_length: field.half_field_length,
            half_width: field.half_field_width,
            last: None,
        }
    }

    /// Grid cell of a sample; positions off the field use the border cells.
    fn cell(&self, sample: &Sample) -> (usize, usize) {
        let index = |value: f64, half: f64| {
            let scaled = ((value + half) / (2.0 * half) * GRID_CELLS as f64).floor();
            scaled.clamp(0.0, (GRID_CELLS - 1) as f64) as usize
        };
        let p = sample.position();
        (index(p.x, self.half_length), index(p.y, self.half_width))
    }
}

/// Start of the 2-cell window along one axis covering the occupied span
/// `[min, max]`; a single occupied column is widened towards the grid
/// interior.
fn window_range(min: usize, max: usize) -> std::ops::RangeInclusive<usize> {
    let (min, max) = if min == max {
        if max == GRID_CELLS - 1 { (min - 1, max) } else { (min, max + 1) }
    } else {
        (min, max)
    };
    min..=(max - 1)
}

impl PoseCalculator for Binning2D {
    fn compute(&mut self, samples: &mut SampleSet, _rng: &mut ChaCha8Rng) -> Option<PoseEstimate> {
        let weights = effective_weights(samples.as_slice());
        let total: f64 = weights.iter().sum();
        let mut grid = [[0.0_f64; GRID_CELLS]; GRID_CELLS];
        let cells: Vec<(usize, usize)> = samples.iter().map(|s| self.cell(s)).collect();

        let (mut min_x, mut max_x, mut min_y, mut max_y) = (GRID_CELLS, 0, GRID_CELLS, 0);
        for (&(x, y), &w) in cells.iter().zip(&weights) {
            if w <= 0.0 {
                continue;
            }
            grid[y][x] += w;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if min_x > max_x {
            self.last = None;
            return None;
        }

        let mut best: Option<(usize, usize, f64)> = None;
        for y in window_range(min_y, max_y) {
            for x in window_range(min_x, max_x) {
                let weight = grid[y][x] + grid[y][x + 1] + grid[y + 1][x] + grid[y + 1][x + 1];
                if best.map_or(true, |(_, _, w)| weight > w) {
                    best = Some((x, y, weight));
                }
            }
        }
        let (wx, wy, _) = best?;

        let inside = |&(x, y): &(usize, usize)| (wx..=wx + 1).contains(&x) && (wy..=wy + 1).contains(&y);
        let members = samples
            .iter()
            .zip(weights.iter().copied())
            .zip(cells.iter())
            .filter(|&(_, cell)| inside(cell))
            .map(|(member, _)| member);
        let moments = Moments::of(members)?;
        let hypothesis = moments.hypothesis(total);
        self.last = Some(hypothesis);
        Some(PoseEstimate {
            pose: moments.pose,
            confidence: hypothesis.weight_share,
        })
    }

    fn hypotheses(&self) -> Vec<PoseHypothesis> {
        self.last.into_iter().collect()
    }
}
