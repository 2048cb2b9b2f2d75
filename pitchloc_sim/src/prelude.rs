// pitchloc_sim/src/prelude.rs

// Re-export the entire pitchloc_core prelude so you can easily access
// pure types like `FrameInput`, `RobotPose`, `SelfLocator`, etc.
pub use pitchloc_core::prelude::*;

// Re-export common simulation-specific types.
pub use crate::simulation::config::structs::*;
pub use crate::simulation::config::{discover_scenarios, load_scenario, ScenarioError};
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::core::world::GroundTruth;
pub use crate::simulation::plugins::debugging::state_error::{ErrorSummary, PoseError};
pub use crate::simulation::plugins::sensors::perception::PerceptionSynthesizer;
pub use crate::simulation::runner::{CycleReport, RunSummary, Simulation};
