// pitchloc_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::estimation::PoseEstimator;
pub use crate::pose_calculators::PoseCalculator;
pub use crate::validity::PerceptValidity;

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::config::{LocalizerConfig, PoseCalculatorKind};
pub use crate::error::LocalizationError;
pub use crate::field::{CornerKind, FieldDimensions, GoalPost, GoalSide};
pub use crate::messages::{
    CameraInfo, DistanceType, FrameInput, GameInfo, GameState, GoalPercept, GoalPostObservation,
    LinePercept, ObservedCircle, ObservedCorner, ObservedLine, PoseDeviation, PoseHypothesis,
    ResetRequest, RobotPose, SeedPose,
};
pub use crate::sample_set::{Sample, SampleSetSnapshot};

// --- The Engine ---
pub use crate::estimation::SelfLocator;
