// pitchloc_sim/src/simulation/config/structs.rs

//! Data structures a scenario TOML file deserializes into. Every section is
//! optional; missing values fall back to the `Default` impls below.

use pitchloc_core::config::{LocalizerConfig, PoseConfig};
use pitchloc_core::field::FieldDimensions;
use serde::{Deserialize, Serialize};

// =========================================================================
// == Top-Level Scenario Configuration ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub simulation: SimulationSettings,
    pub field: FieldDimensions,
    pub localizer: LocalizerConfig,
    pub robot: RobotConfig,
    pub odometry: OdometryNoiseConfig,
    pub perception: PerceptionConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    pub name: String,
    /// Overrides the localizer seed and drives the world noise.
    pub seed: Option<u64>,
    pub cycles: usize,
    pub cycle_period_ms: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            seed: None,
            cycles: 300,
            cycle_period_ms: 33,
        }
    }
}

// =========================================================================
// == World ==
// =========================================================================

/// The ground-truth walk: the robot turns towards the next waypoint and
/// walks once it roughly faces it. Waypoints are visited in a loop.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobotConfig {
    pub start: PoseConfig,
    /// Field positions `[x, y]` in metres.
    pub waypoints: Vec<[f64; 2]>,
    /// m/s
    pub speed: f64,
    /// rad/s
    pub turn_rate: f64,
    /// A waypoint counts as reached this close to it, in metres.
    pub waypoint_tolerance: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            start: PoseConfig {
                x: -2.0,
                y: 0.0,
                rotation: 0.0,
            },
            waypoints: vec![
                [1.5, 0.0],
                [1.5, 1.2],
                [-1.5, 1.2],
                [-1.5, -1.2],
                [1.5, -1.2],
            ],
            speed: 0.2,
            turn_rate: 1.0,
            waypoint_tolerance: 0.1,
        }
    }
}

/// Odometry error, relative to the motion of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OdometryNoiseConfig {
    /// Std of the translation error per metre walked.
    pub translation: f64,
    /// Std of the rotation error per radian turned and per metre walked.
    pub rotation: f64,
}

impl Default for OdometryNoiseConfig {
    fn default() -> Self {
        Self {
            translation: 0.1,
            rotation: 0.1,
        }
    }
}

// =========================================================================
// == Perception ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerceptionConfig {
    /// Full horizontal opening angle of the camera, in radians.
    pub field_of_view: f64,
    /// Landmarks further away are not seen, in metres.
    pub max_distance: f64,
    pub camera_height: f64,
    /// Std of the bearing of every percept, in radians.
    pub bearing_noise: f64,
    /// Std of the distance of every percept, relative to the distance.
    pub distance_noise: f64,
    /// Chance that a post seen without its partner is reported without a side.
    pub unknown_post_probability: f64,
    /// Spacing of the points a field line is probed at, in metres.
    pub line_sample_spacing: f64,
    /// Shorter visible line pieces are dropped, in metres.
    pub min_line_length: f64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            field_of_view: 1.0,
            max_distance: 5.0,
            camera_height: 0.5,
            bearing_noise: 0.02,
            distance_noise: 0.05,
            unknown_post_probability: 0.3,
            line_sample_spacing: 0.05,
            min_line_length: 0.2,
        }
    }
}

// =========================================================================
// == Scheduled Events ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    pub kidnap: Option<KidnapEvent>,
    pub penalty: Option<PenaltyEvent>,
}

/// Teleports the robot without any odometry trace.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KidnapEvent {
    pub at_cycle: usize,
    pub to: PoseConfig,
}

/// The robot is taken off the field for `[from_cycle, to_cycle)` and put
/// back at one of the side-line re-entry points.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PenaltyEvent {
    pub from_cycle: usize,
    pub to_cycle: usize,
}

impl PenaltyEvent {
    pub fn is_penalized(&self, cycle: usize) -> bool {
        (self.from_cycle..self.to_cycle).contains(&cycle)
    }
}
