// pitchloc_core/src/field/model.rs

//! Precomputed "closest feature" lookups used by the field point and corner
//! sensor models. Every table is a regular grid over the carpet whose cells
//! store the index of the nearest candidate feature; the exact closest point
//! is then computed against that single feature.

use crate::field::dimensions::{CornerKind, FieldCorner, FieldDimensions, FieldLine};
use crate::geometry::closest_point_on_segment;
use nalgebra::Point2;
use std::f64::consts::FRAC_PI_2;

/// A grid over a rectangle storing the nearest candidate per cell.
#[derive(Debug, Clone)]
struct NearestTable {
    min: Point2<f64>,
    cell_size: f64,
    columns: usize,
    rows: usize,
    cells: Vec<Option<usize>>,
}

impl NearestTable {
    /// Builds the grid. `nearest` maps a cell centre to the candidate index
    /// closest to it, or `None` when no candidate qualifies.
    fn build<F>(min: Point2<f64>, max: Point2<f64>, cell_size: f64, mut nearest: F) -> Self
    where
        F: FnMut(&Point2<f64>) -> Option<usize>,
    {
        let columns = (((max.x - min.x) / cell_size).ceil() as usize).max(1);
        let rows = (((max.y - min.y) / cell_size).ceil() as usize).max(1);
        let mut cells = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for column in 0..columns {
                let centre = Point2::new(
                    min.x + (column as f64 + 0.5) * cell_size,
                    min.y + (row as f64 + 0.5) * cell_size,
                );
                cells.push(nearest(&centre));
            }
        }
        Self {
            min,
            cell_size,
            columns,
            rows,
            cells,
        }
    }

    /// Candidate stored for the cell containing `p`; points outside the grid
    /// use the nearest border cell.
    fn lookup(&self, p: &Point2<f64>) -> Option<usize> {
        let column = ((p.x - self.min.x) / self.cell_size).floor();
        let row = ((p.y - self.min.y) / self.cell_size).floor();
        if !column.is_finite() || !row.is_finite() {
            return None;
        }
        let column = (column.max(0.0) as usize).min(self.columns - 1);
        let row = (row.max(0.0) as usize).min(self.rows - 1);
        self.cells[row * self.columns + column]
    }
}

fn nearest_index<I>(p: &Point2<f64>, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, Point2<f64>)>,
{
    candidates
        .into_iter()
        .map(|(index, closest)| (index, (closest - p).norm_squared()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Quarter-turn class of a direction: `floor(direction / (π/2) + 0.5) mod 4`.
pub fn orientation_class(direction: f64) -> usize {
    ((direction / FRAC_PI_2 + 0.5).floor() as i64).rem_euclid(4) as usize
}

/// Read-only lookups over the field lines and junctions.
#[derive(Debug, Clone)]
pub struct FieldModel {
    lines: Vec<FieldLine>,
    corners: Vec<FieldCorner>,
    max_crossing_length: f64,
    /// Indexed by `[observed line is long][observed line runs along y]`.
    line_tables: [[NearestTable; 2]; 2],
    /// Indexed by `[T = 0, L = 1][orientation class]`.
    corner_tables: [[NearestTable; 4]; 2],
    x_corners: Vec<Point2<f64>>,
}

impl FieldModel {
    /// Builds every lookup table for `field`.
    ///
    /// Observed lines longer than `max_crossing_length` are only matched
    /// against model lines that are longer as well, so short crossing pieces
    /// and centre circle segments can't attract them.
    pub fn new(field: &FieldDimensions, cell_size: f64, max_crossing_length: f64) -> Self {
        let lines = field.field_lines();
        let corners = field.field_corners();
        let min = Point2::new(-field.half_carpet_length(), -field.half_carpet_width());
        let max = Point2::new(field.half_carpet_length(), field.half_carpet_width());

        let line_table = |long: bool, along_y: bool| {
            NearestTable::build(min, max, cell_size, |p| {
                nearest_index(
                    p,
                    lines
                        .iter()
                        .enumerate()
                        .filter(|(_, line)| line.is_along_x() != along_y)
                        .filter(|(_, line)| !long || line.length() > max_crossing_length)
                        .map(|(i, line)| (i, closest_point_on_segment(p, &line.start, &line.end))),
                )
            })
        };
        let line_tables = [
            [line_table(false, false), line_table(false, true)],
            [line_table(true, false), line_table(true, true)],
        ];

        let corner_table = |kind: CornerKind, orientation: usize| {
            NearestTable::build(min, max, cell_size, |p| {
                nearest_index(
                    p,
                    corners
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| c.kind == kind && c.orientation == orientation)
                        .map(|(i, c)| (i, c.position)),
                )
            })
        };
        let corner_tables = [
            [0, 1, 2, 3].map(|o| corner_table(CornerKind::T, o)),
            [0, 1, 2, 3].map(|o| corner_table(CornerKind::L, o)),
        ];

        let x_corners = corners
            .iter()
            .filter(|c| c.kind == CornerKind::X)
            .map(|c| c.position)
            .collect();

        Self {
            lines,
            corners,
            max_crossing_length,
            line_tables,
            corner_tables,
            x_corners,
        }
    }

    pub fn lines(&self) -> &[FieldLine] {
        &self.lines
    }

    pub fn corners(&self) -> &[FieldCorner] {
        &self.corners
    }

    /// Closest point on a model line to an observed line point, in field
    /// coordinates. `neighbour` is the other end of the observed line; it
    /// decides which table (orientation, length) is consulted.
    pub fn closest_line_point(
        &self,
        point: &Point2<f64>,
        neighbour: &Point2<f64>,
    ) -> Option<Point2<f64>> {
        let diff = neighbour - point;
        let long = diff.norm_squared() > self.max_crossing_length * self.max_crossing_length;
        let along_y = diff.y.abs() > diff.x.abs();
        let index = self.line_tables[long as usize][along_y as usize].lookup(point)?;
        let line = &self.lines[index];
        Some(closest_point_on_segment(point, &line.start, &line.end))
    }

    /// Closest model junction of the same kind and orientation class.
    /// `direction` is the observed orientation in field coordinates.
    pub fn closest_corner(
        &self,
        point: &Point2<f64>,
        kind: CornerKind,
        direction: f64,
    ) -> Option<Point2<f64>> {
        let table = match kind {
            CornerKind::X => {
                return self
                    .x_corners
                    .iter()
                    .min_by(|a, b| (*a - point).norm_squared().total_cmp(&(*b - point).norm_squared()))
                    .copied();
            }
            CornerKind::T => &self.corner_tables[0],
            CornerKind::L => &self.corner_tables[1],
        };
        let index = table[orientation_class(direction)].lookup(point)?;
        Some(self.corners[index].position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn model() -> FieldModel {
        FieldModel::new(&FieldDimensions::default(), 0.1, 0.3)
    }

    #[test]
    fn test_orientation_class_rounds_to_nearest_quarter_turn() {
        assert_eq!(orientation_class(0.1), 0);
        assert_eq!(orientation_class(PI / 2.0 - 0.2), 1);
        assert_eq!(orientation_class(PI), 2);
        assert_eq!(orientation_class(-PI / 2.0), 3);
        assert_eq!(orientation_class(-0.3), 0);
    }

    #[test]
    fn test_long_vertical_line_matches_centre_line_not_circle() {
        let model = model();
        // Inside the centre circle, next to the centre line, observed line along y.
        let closest = model
            .closest_line_point(&Point2::new(0.15, 0.2), &Point2::new(0.15, 1.2))
            .unwrap();
        assert_abs_diff_eq!(closest.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(closest.y, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_horizontal_line_matches_side_line() {
        let model = model();
        let closest = model
            .closest_line_point(&Point2::new(1.0, 1.9), &Point2::new(2.0, 1.95))
            .unwrap();
        assert_abs_diff_eq!(closest.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(closest.y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_closest_corner_respects_kind_and_orientation() {
        let model = model();
        // Near the top end of the centre line: the T there points towards -y.
        let t = model
            .closest_corner(&Point2::new(0.2, 1.8), CornerKind::T, -PI / 2.0)
            .unwrap();
        assert_abs_diff_eq!(t.x, 0.0);
        assert_abs_diff_eq!(t.y, 2.0);

        // Same query with the opposite orientation ends up at the bottom T.
        let t = model
            .closest_corner(&Point2::new(0.2, 1.8), CornerKind::T, PI / 2.0)
            .unwrap();
        assert_abs_diff_eq!(t.y, -2.0);

        let x = model
            .closest_corner(&Point2::new(0.3, -0.5), CornerKind::X, 1.0)
            .unwrap();
        assert_abs_diff_eq!(x.y, -0.6);
    }
}
