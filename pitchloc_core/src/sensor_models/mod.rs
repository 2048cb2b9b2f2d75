// pitchloc_core/src/sensor_models/mod.rs

//! One scoring strategy per landmark type. The engine selects which
//! observations to score, hands each model the indices of its type, and
//! multiplies the returned per-sample contributions into the weights.

pub mod center_circle;
pub mod corners;
pub mod field_points;
pub mod goal_posts;
pub mod likelihood;

use crate::config::SensorDeviations;
use crate::field::{FieldDimensions, FieldModel};
use crate::messages::FrameInput;
use crate::sample_set::Sample;
use crate::validity::PerceptValidity;

pub use center_circle::CenterCircleSensorModel;
pub use corners::CornersSensorModel;
pub use field_points::FieldPointsSensorModel;
pub use goal_posts::GoalPostsSensorModel;

// --- Core Abstractions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    FieldPoint,
    Corner,
    GoalPost,
    CenterCircle,
}

/// Identifies one percept of the current frame.
///
/// Index conventions: field point `2 * line + end` (end 0 = start point);
/// corner = index into the observed corners; goal post 0..4 = known posts in
/// [`GoalPost`](crate::field::GoalPost) order, 4..6 = side-ambiguous posts in
/// [`GoalSide`](crate::field::GoalSide) order; centre circle 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Observation {
    pub kind: ObservationKind,
    pub index: usize,
}

impl Observation {
    pub fn new(kind: ObservationKind, index: usize) -> Self {
        Self { kind, index }
    }
}

/// What a sensor model contributed in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorModelResult {
    /// No usable observation; the weights must not be touched.
    NoUpdate,
    /// Some samples were not scored (their entry is `None`).
    PartialUpdate,
    FullUpdate,
}

impl SensorModelResult {
    /// Classifies a finished weighting buffer.
    pub fn from_weightings(weightings: &[Option<f64>]) -> Self {
        let scored = weightings.iter().filter(|w| w.is_some()).count();
        if scored == 0 {
            SensorModelResult::NoUpdate
        } else if scored < weightings.len() {
            SensorModelResult::PartialUpdate
        } else {
            SensorModelResult::FullUpdate
        }
    }
}

/// Read-only world context for one scoring pass.
pub struct SensorContext<'a> {
    pub field: &'a FieldDimensions,
    pub field_model: &'a FieldModel,
    pub validity: &'a dyn PerceptValidity,
    pub frame: &'a FrameInput,
}

/// Multiplies `contribution` into an optional running product.
pub(crate) fn combine(current: Option<f64>, contribution: Option<f64>) -> Option<f64> {
    match (current, contribution) {
        (Some(a), Some(b)) => Some(a * b),
        (None, b) => b,
        (a, None) => a,
    }
}

// --- The closed set of models ---

#[derive(Debug, Clone)]
pub enum SensorModel {
    GoalPosts(GoalPostsSensorModel),
    CenterCircle(CenterCircleSensorModel),
    FieldPoints(FieldPointsSensorModel),
    Corners(CornersSensorModel),
}

impl SensorModel {
    /// One model per landmark type.
    pub fn all(deviations: &SensorDeviations) -> Vec<SensorModel> {
        vec![
            SensorModel::GoalPosts(GoalPostsSensorModel::new(deviations)),
            SensorModel::CenterCircle(CenterCircleSensorModel::new(deviations)),
            SensorModel::FieldPoints(FieldPointsSensorModel::new(deviations)),
            SensorModel::Corners(CornersSensorModel::new(deviations)),
        ]
    }

    pub fn kind(&self) -> ObservationKind {
        match self {
            SensorModel::GoalPosts(_) => ObservationKind::GoalPost,
            SensorModel::CenterCircle(_) => ObservationKind::CenterCircle,
            SensorModel::FieldPoints(_) => ObservationKind::FieldPoint,
            SensorModel::Corners(_) => ObservationKind::Corner,
        }
    }

    /// Scores every sample against the selected observations of this model's type.
    ///
    /// # Arguments
    /// * `samples` - The current population.
    /// * `selected` - Observation indices of this model's type.
    /// * `context` - Field geometry, validity oracle and the current frame.
    /// * `weightings` - Output, resized to one entry per sample; `None` marks
    ///   a sample this model has no opinion about.
    pub fn compute_weightings(
        &self,
        samples: &[Sample],
        selected: &[usize],
        context: &SensorContext,
        weightings: &mut Vec<Option<f64>>,
    ) -> SensorModelResult {
        weightings.clear();
        weightings.resize(samples.len(), None);
        if selected.is_empty() || !context.frame.camera.is_valid {
            return SensorModelResult::NoUpdate;
        }
        match self {
            SensorModel::GoalPosts(m) => m.compute_weightings(samples, selected, context, weightings),
            SensorModel::CenterCircle(m) => {
                m.compute_weightings(samples, selected, context, weightings)
            }
            SensorModel::FieldPoints(m) => {
                m.compute_weightings(samples, selected, context, weightings)
            }
            SensorModel::Corners(m) => m.compute_weightings(samples, selected, context, weightings),
        }
        SensorModelResult::from_weightings(weightings)
    }
}
