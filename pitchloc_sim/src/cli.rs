// pitchloc_sim/src/cli.rs

use crate::simulation::config::ScenarioConfig;
use clap::Parser;
use std::path::PathBuf;

/// Pitchloc: headless scenario runner for the soccer-field self-localizer.
///
/// This struct defines the command-line arguments of the `pitchloc_sim` binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/walk_and_kidnap.toml")]
    pub scenario: PathBuf,

    /// Run every scenario below this directory instead of `--scenario`.
    #[arg(long)]
    pub scenario_dir: Option<PathBuf>,

    /// Overrides the seed of every scenario.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overrides the number of cycles of every scenario.
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Print the resolved scenario as TOML instead of running it.
    #[arg(long, default_value_t = false)]
    pub dump_config: bool,
}

impl Cli {
    /// Applies the command-line overrides to a loaded scenario.
    pub fn apply_overrides(&self, scenario: &mut ScenarioConfig) {
        if let Some(seed) = self.seed {
            scenario.simulation.seed = Some(seed);
        }
        if let Some(cycles) = self.cycles {
            scenario.simulation.cycles = cycles;
        }
    }
}
