// pitchloc_sim/src/simulation/runner.rs

//! Drives one scenario: moves the ground truth, renders percepts, feeds the
//! localizer and scores its output.

use crate::simulation::config::{ScenarioConfig, ScenarioError};
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::core::world::GroundTruth;
use crate::simulation::plugins::debugging::state_error::{log_pose_error, ErrorSummary, PoseError};
use crate::simulation::plugins::sensors::perception::PerceptionSynthesizer;
use log::info;
use nalgebra::Isometry2;
use pitchloc_core::estimation::{PoseEstimator, SelfLocator};
use pitchloc_core::geometry::pose;
use pitchloc_core::messages::{FrameInput, GameInfo, GameState, RobotPose};
use std::f64::consts::FRAC_PI_2;

/// Everything that happened in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: usize,
    pub time_ms: u64,
    pub truth: Isometry2<f64>,
    pub estimate: RobotPose,
    pub error: PoseError,
    pub penalized: bool,
    pub injected_templates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub name: String,
    pub errors: ErrorSummary,
    pub final_pose: RobotPose,
}

pub struct Simulation {
    scenario: ScenarioConfig,
    locator: SelfLocator,
    truth: GroundTruth,
    perception: PerceptionSynthesizer,
    rng: SimulationRng,
    cycle: usize,
    summary: ErrorSummary,
}

impl Simulation {
    /// Builds the world and the localizer. A scenario seed replaces the
    /// localizer seed; the world noise uses a stream derived from it.
    pub fn new(scenario: ScenarioConfig) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let seed = scenario.simulation.seed.unwrap_or(scenario.localizer.seed);
        let mut localizer = scenario.localizer.clone();
        localizer.seed = seed;
        let locator = SelfLocator::new(localizer, scenario.field.clone())?;
        let truth = GroundTruth::new(&scenario.robot, scenario.odometry);
        let perception = PerceptionSynthesizer::new(scenario.perception, scenario.field.clone());
        info!(
            "Scenario '{}' | seed {} | {} samples | {} cycles",
            scenario.simulation.name, seed, scenario.localizer.number_of_samples, scenario.simulation.cycles
        );
        Ok(Self {
            locator,
            truth,
            perception,
            rng: SimulationRng::from_seed(seed.wrapping_add(1)),
            cycle: 0,
            summary: ErrorSummary::default(),
            scenario,
        })
    }

    pub fn locator(&self) -> &SelfLocator {
        &self.locator
    }

    pub fn truth(&self) -> &GroundTruth {
        &self.truth
    }

    pub fn summary(&self) -> &ErrorSummary {
        &self.summary
    }

    /// Advances the world by one cycle period and runs one localizer cycle.
    pub fn step(&mut self) -> CycleReport {
        let cycle = self.cycle;
        self.cycle += 1;
        let period_ms = self.scenario.simulation.cycle_period_ms;
        let time_ms = (cycle as u64 + 1) * period_ms;

        self.apply_events(cycle);
        let penalized = self
            .scenario
            .events
            .penalty
            .is_some_and(|penalty| penalty.is_penalized(cycle));

        let mut frame = if penalized {
            // Off the field: no motion and nothing to see.
            FrameInput {
                time_ms,
                ..FrameInput::default()
            }
        } else {
            self.truth.step(period_ms as f64 / 1000.0, &mut self.rng);
            self.perception.render(self.truth.pose(), time_ms, &mut self.rng)
        };
        frame.odometry = *self.truth.odometry();
        frame.game = GameInfo {
            state: GameState::Playing,
            penalty_shootout: false,
            penalized,
        };

        let estimate = self.locator.process(&frame);
        let error = log_pose_error(cycle, self.truth.pose(), &estimate);
        if !penalized {
            self.summary.record(error);
        }
        CycleReport {
            cycle,
            time_ms,
            truth: *self.truth.pose(),
            estimate,
            error,
            penalized,
            injected_templates: self.locator.injected_templates(),
        }
    }

    /// Runs the remaining cycles of the scenario.
    pub fn run(&mut self) -> RunSummary {
        while self.cycle < self.scenario.simulation.cycles {
            self.step();
        }
        self.summary.log(&self.scenario.simulation.name);
        RunSummary {
            name: self.scenario.simulation.name.clone(),
            errors: self.summary.clone(),
            final_pose: *self.locator.pose(),
        }
    }

    fn apply_events(&mut self, cycle: usize) {
        if let Some(kidnap) = self.scenario.events.kidnap.filter(|k| k.at_cycle == cycle) {
            info!("Cycle {}: kidnapping robot to {:?}", cycle, kidnap.to);
            self.truth.teleport(kidnap.to.to_isometry());
        }
        if let Some(penalty) = self.scenario.events.penalty.filter(|p| p.to_cycle == cycle) {
            // Robots come back at the centre line, facing into the field.
            let half_width = self.scenario.field.half_field_width;
            let reentry = if self.rng.chance(0.5) {
                pose(0.0, half_width, -FRAC_PI_2)
            } else {
                pose(0.0, -half_width, FRAC_PI_2)
            };
            info!(
                "Cycle {}: penalty over after {} cycles, robot re-enters at y = {:.1}",
                cycle,
                penalty.to_cycle - penalty.from_cycle,
                reentry.translation.vector.y
            );
            self.truth.teleport(reentry);
        }
    }
}
