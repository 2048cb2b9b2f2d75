// pitchloc_core/src/messages.rs

//! Data exchanged with the collaborators of the localization engine: the
//! per-cycle inputs (odometry, percepts, game state) and the published
//! outputs. All observed positions are in the robot frame (x forward, y left).

use crate::field::{CornerKind, GoalPost, GoalSide};
use nalgebra::{Isometry2, Matrix2, Point2};
use serde::{Deserialize, Serialize};

// =========================================================================
// == Percepts ==
// =========================================================================

/// How the distance to a goal post was estimated by the perceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceType {
    /// From the apparent height of the post.
    HeightBased,
    /// From the bearing to the foot point.
    BearingBased,
    /// The foot point was hidden; the post is at least this close.
    IsCloser,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalPostObservation {
    /// Foot point of the post in the robot frame.
    pub position: Point2<f64>,
    pub distance_type: DistanceType,
    pub time_when_last_seen: u64,
}

impl GoalPostObservation {
    pub fn distance(&self) -> f64 {
        self.position.coords.norm()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalPercept {
    /// Indexed by [`GoalPost`].
    pub posts: [Option<GoalPostObservation>; 4],
    /// Posts whose side within the goal is unknown, indexed by [`GoalSide`].
    pub unknown_posts: [Option<GoalPostObservation>; 2],
}

impl GoalPercept {
    /// The known post if it was seen at `now`.
    pub fn post_seen_at(&self, post: GoalPost, now: u64) -> Option<&GoalPostObservation> {
        self.posts[post as usize]
            .as_ref()
            .filter(|p| p.time_when_last_seen == now)
    }

    /// The side-ambiguous post of a goal if it was seen at `now`.
    pub fn unknown_post_seen_at(&self, side: GoalSide, now: u64) -> Option<&GoalPostObservation> {
        self.unknown_posts[side as usize]
            .as_ref()
            .filter(|p| p.time_when_last_seen == now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedLine {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedCorner {
    pub position: Point2<f64>,
    pub kind: CornerKind,
    /// For a T the stem direction, for an L the first arm.
    pub dir1: f64,
    /// For a T one bar direction, for an L the second arm.
    pub dir2: f64,
}

impl ObservedCorner {
    /// Orientation of the junction in the robot frame, comparable with the
    /// quarter-turn orientation of the field corners.
    pub fn direction(&self) -> f64 {
        match self.kind {
            CornerKind::X => 0.0,
            CornerKind::T => self.dir1,
            CornerKind::L => {
                let sum_x = self.dir1.cos() + self.dir2.cos();
                let sum_y = self.dir1.sin() + self.dir2.sin();
                sum_y.atan2(sum_x) - std::f64::consts::FRAC_PI_4
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedCircle {
    pub position: Point2<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinePercept {
    pub lines: Vec<ObservedLine>,
    pub corners: Vec<ObservedCorner>,
    pub center_circle: Option<ObservedCircle>,
}

/// What the engine needs from the camera geometry provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    /// Height of the camera above the ground in metres.
    pub height: f64,
    /// `false` while the camera matrix can't be trusted (e.g. robot falling).
    pub is_valid: bool,
}

impl Default for CameraInfo {
    fn default() -> Self {
        Self {
            height: 0.5,
            is_valid: true,
        }
    }
}

// =========================================================================
// == Game State ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    #[default]
    Initial,
    Ready,
    Set,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameInfo {
    pub state: GameState,
    pub penalty_shootout: bool,
    /// Whether this robot is currently penalized.
    pub penalized: bool,
}

/// Standard deviation of a pose seed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoseDeviation {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

impl PoseDeviation {
    pub fn new(x: f64, y: f64, rotation: f64) -> Self {
        Self { x, y, rotation }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedPose {
    pub pose: Isometry2<f64>,
    pub deviation: PoseDeviation,
}

/// An external request to reset the belief, e.g. after the robot was
/// carried to a new position by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum ResetRequest {
    Uniform,
    AroundPoses(Vec<SeedPose>),
}

// =========================================================================
// == Cycle Input ==
// =========================================================================

/// Everything the engine reads in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    pub time_ms: u64,
    /// Accumulated odometry; the engine tracks the delta itself.
    pub odometry: Isometry2<f64>,
    pub camera: CameraInfo,
    pub goals: GoalPercept,
    pub lines: LinePercept,
    pub game: GameInfo,
    pub reset: Option<ResetRequest>,
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            time_ms: 0,
            odometry: Isometry2::identity(),
            camera: CameraInfo::default(),
            goals: GoalPercept::default(),
            lines: LinePercept::default(),
            game: GameInfo::default(),
            reset: None,
        }
    }
}

// =========================================================================
// == Outputs ==
// =========================================================================

/// The published estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotPose {
    pub pose: Isometry2<f64>,
    /// Derived from the fast/slow weight ratio; low means "possibly lost".
    pub validity: f64,
    /// Share of the population that supports `pose`, as reported by the pose calculator.
    pub confidence: f64,
    pub time_ms: u64,
}

/// One mode of the sample distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseHypothesis {
    pub pose: Isometry2<f64>,
    /// Share of the population belonging to this mode.
    pub weight_share: f64,
    /// Position covariance of the samples in this mode.
    pub covariance: Matrix2<f64>,
}
