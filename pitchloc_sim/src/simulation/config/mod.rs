// pitchloc_sim/src/simulation/config/mod.rs

//! Loading and validating scenario configuration from disk.

mod catalog;

pub mod structs;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use log::info;
use pitchloc_core::error::LocalizationError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use catalog::discover_scenarios;
pub use structs::ScenarioConfig;

/// Prefix of environment variables overriding scenario values, e.g.
/// `PITCHLOC_SIMULATION__CYCLES=100`.
pub const ENV_PREFIX: &str = "PITCHLOC_";

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to load scenario: {0}")]
    Load(#[from] figment::Error),

    #[error("failed to read scenario directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to write scenario: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),

    #[error(transparent)]
    Localization(#[from] LocalizationError),
}

/// Reads a scenario file, then applies `PITCHLOC_`-prefixed environment
/// overrides. Nested keys are separated by a double underscore.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, ScenarioError> {
    if !path.is_file() {
        return Err(ScenarioError::NotFound(path.to_path_buf()));
    }
    info!("Loading scenario from: {:?}", path);
    let scenario: ScenarioConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    scenario.validate()?;
    Ok(scenario)
}

/// Parses a scenario from TOML text, without environment overrides.
pub fn scenario_from_str(toml: &str) -> Result<ScenarioConfig, ScenarioError> {
    let scenario: ScenarioConfig = Figment::new().merge(Toml::string(toml)).extract()?;
    scenario.validate()?;
    Ok(scenario)
}

impl ScenarioConfig {
    /// Checks the simulation-side values. The localizer and field sections
    /// are validated by the engine itself on construction.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |reason: &str| Err(ScenarioError::Invalid(reason.to_string()));
        if self.simulation.cycle_period_ms == 0 {
            return invalid("simulation.cycle_period_ms must be positive");
        }
        if !(self.robot.speed >= 0.0 && self.robot.turn_rate >= 0.0) {
            return invalid("robot speed and turn rate must be non-negative");
        }
        if !(self.robot.waypoint_tolerance > 0.0) {
            return invalid("robot.waypoint_tolerance must be positive");
        }
        let p = &self.perception;
        if !(p.field_of_view > 0.0 && p.field_of_view <= 2.0 * std::f64::consts::PI) {
            return invalid("perception.field_of_view must lie in (0, 2π]");
        }
        if !(p.max_distance > 0.0 && p.line_sample_spacing > 0.0) {
            return invalid("perception distances must be positive");
        }
        if !(0.0..=1.0).contains(&p.unknown_post_probability) {
            return invalid("perception.unknown_post_probability must lie in [0, 1]");
        }
        if let Some(penalty) = &self.events.penalty {
            if penalty.from_cycle >= penalty.to_cycle {
                return invalid("events.penalty must end after it starts");
            }
        }
        Ok(())
    }

    /// The fully resolved scenario as TOML.
    pub fn to_toml(&self) -> Result<String, ScenarioError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
