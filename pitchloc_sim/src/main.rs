// pitchloc_sim/src/main.rs

use clap::Parser;
use log::error;
use pitchloc_sim::cli::Cli;
use pitchloc_sim::simulation::config::{discover_scenarios, load_scenario, ScenarioError};
use pitchloc_sim::simulation::runner::Simulation;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), ScenarioError> {
    let paths = match &cli.scenario_dir {
        Some(dir) => discover_scenarios(dir)?,
        None => vec![cli.scenario.clone()],
    };
    for path in paths {
        let mut scenario = load_scenario(&path)?;
        cli.apply_overrides(&mut scenario);
        if cli.dump_config {
            println!("# {}\n{}", path.display(), scenario.to_toml()?);
            continue;
        }
        Simulation::new(scenario)?.run();
    }
    Ok(())
}
