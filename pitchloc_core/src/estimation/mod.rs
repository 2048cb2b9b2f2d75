// pitchloc_core/src/estimation/mod.rs

use crate::messages::{FrameInput, PoseHypothesis, RobotPose};

pub mod self_locator;

pub use self_locator::SelfLocator;

/// The contract for any algorithm that performs the "self localization" role.
/// Its sole responsibility is to estimate the robot's pose on the field.
pub trait PoseEstimator: Send + Sync {
    /// Runs one complete cycle on the inputs of a frame and returns the
    /// published pose.
    fn process(&mut self, frame: &FrameInput) -> RobotPose;

    /// The pose published by the last cycle.
    fn pose(&self) -> &RobotPose;

    /// Modes of the belief, heaviest first. Empty for estimators that don't
    /// track more than one mode.
    fn hypotheses(&self) -> Vec<PoseHypothesis>;
}
