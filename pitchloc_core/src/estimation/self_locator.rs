// pitchloc_core/src/estimation/self_locator.rs

use super::PoseEstimator;
use crate::config::{LocalizerConfig, ObservationBudget};
use crate::error::LocalizationError;
use crate::field::{FieldDimensions, FieldModel, GoalPost, GoalSide};
use crate::geometry::{heading, pose, position, sample_triangular};
use crate::messages::{
    FrameInput, GameInfo, GameState, PoseDeviation, PoseHypothesis, ResetRequest, RobotPose,
    SeedPose,
};
use crate::motion::MotionModel;
use crate::pose_calculators::{create_pose_calculator, PoseCalculator};
use crate::sample_set::{Sample, SampleSet, SampleSetSnapshot};
use crate::sensor_models::goal_posts::UNKNOWN_POST_OFFSET;
use crate::sensor_models::{
    Observation, ObservationKind, SensorContext, SensorModel, SensorModelResult,
};
use crate::templates::TemplateGenerator;
use crate::validity::{AcceptAll, GoalNetValidityChecker, PerceptValidity};
use log::{debug, info, warn};
use nalgebra::Isometry2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::FRAC_PI_2;

/// Spread of the samples placed at the side line when a penalty ends.
pub const REENTRY_DEVIATION: PoseDeviation = PoseDeviation {
    x: 0.2,
    y: 0.2,
    rotation: 0.2,
};

/// Augmented Monte Carlo localization.
///
/// One call to [`process`](PoseEstimator::process) runs the full cycle:
/// bookkeeping and resets, odometry propagation, sensor weighting, weight
/// statistics, resampling with template injection and pose extraction.
/// The engine owns every piece of mutable state and is `Clone`, so a copy
/// can be replayed or inspected without touching the live filter.
#[derive(Debug, Clone)]
pub struct SelfLocator {
    config: LocalizerConfig,
    field: FieldDimensions,
    field_model: FieldModel,
    validity: Box<dyn PerceptValidity>,
    samples: SampleSet,
    sensor_models: Vec<SensorModel>,
    templates: TemplateGenerator,
    pose_calculator: Box<dyn PoseCalculator>,
    motion: MotionModel,
    rng: ChaCha8Rng,

    /// Accumulated odometry of the current frame.
    odometry: Isometry2<f64>,
    /// Accumulated odometry the samples were last propagated to.
    last_odometry: Option<Isometry2<f64>>,
    updated_by_sensors: bool,
    previous_game: GameInfo,
    pending_config: Option<LocalizerConfig>,
    robot_pose: RobotPose,
    injected_templates: usize,

    // Per-cycle buffers, kept to avoid reallocation.
    weightings: Vec<Option<f64>>,
    /// Product of this cycle's weightings per sample, `None` while unscored.
    likelihoods: Vec<Option<f64>>,
    selected: Vec<Observation>,
    indices: Vec<usize>,
}

impl SelfLocator {
    /// Creates an engine and initializes its population around the start pose
    /// (if known) or uniformly over the field.
    pub fn new(config: LocalizerConfig, field: FieldDimensions) -> Result<Self, LocalizationError> {
        config.validate()?;
        field.validate()?;

        let samples = SampleSet::new(config.number_of_samples)?;
        let field_model = FieldModel::new(
            &field,
            config.field_model.cell_size,
            config.field_model.max_crossing_length,
        );
        let mut locator = Self {
            validity: build_validity(&config, &field),
            sensor_models: SensorModel::all(&config.sensors),
            templates: TemplateGenerator::new(&field, &config.sensors, config.template_clipping),
            pose_calculator: create_pose_calculator(
                config.pose_calculator,
                &field,
                config.number_of_samples,
            ),
            motion: MotionModel::new(config.motion.clone()),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            field_model,
            samples,
            odometry: Isometry2::identity(),
            last_odometry: None,
            updated_by_sensors: false,
            previous_game: GameInfo::default(),
            pending_config: None,
            robot_pose: RobotPose {
                pose: Isometry2::identity(),
                validity: 0.0,
                confidence: 0.0,
                time_ms: 0,
            },
            injected_templates: 0,
            weightings: Vec::with_capacity(config.number_of_samples),
            likelihoods: Vec::with_capacity(config.number_of_samples),
            selected: Vec::new(),
            indices: Vec::new(),
            config,
            field,
        };
        locator.init();
        info!(
            "Self locator ready: {} samples, {:?} pose calculator",
            locator.samples.len(),
            locator.config.pose_calculator
        );
        Ok(locator)
    }

    // --- Accessors ---

    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    pub fn field(&self) -> &FieldDimensions {
        &self.field
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn templates(&self) -> &TemplateGenerator {
        &self.templates
    }

    /// Read-only copy of the population for diagnostics.
    pub fn snapshot(&self) -> SampleSetSnapshot {
        self.samples.snapshot()
    }

    /// Number of samples replaced by templates in the last resampling step.
    pub fn injected_templates(&self) -> usize {
        self.injected_templates
    }

    /// Whether the last cycle changed any weight.
    pub fn updated_by_sensors(&self) -> bool {
        self.updated_by_sensors
    }

    // --- Reconfiguration ---

    /// Stages a new configuration. It is validated immediately and applied at
    /// the start of the next cycle.
    pub fn set_config(&mut self, config: LocalizerConfig) -> Result<(), LocalizationError> {
        config.validate()?;
        self.pending_config = Some(config);
        Ok(())
    }

    /// Schedules a new population size for the start of the next cycle.
    pub fn set_number_of_samples(&mut self, number_of_samples: usize) -> Result<(), LocalizationError> {
        self.samples.request_size(number_of_samples)?;
        self.config.number_of_samples = number_of_samples;
        Ok(())
    }

    fn apply_config(&mut self, config: LocalizerConfig) {
        if config.seed != self.config.seed {
            warn!("RNG seed changes only take effect when the engine is created");
        }
        if config.field_model != self.config.field_model {
            self.field_model = FieldModel::new(
                &self.field,
                config.field_model.cell_size,
                config.field_model.max_crossing_length,
            );
            self.validity = build_validity(&config, &self.field);
        }
        if config.sensors != self.config.sensors || config.template_clipping != self.config.template_clipping {
            // Buffered sightings are dropped with the old generator.
            self.templates = TemplateGenerator::new(&self.field, &config.sensors, config.template_clipping);
        }
        if config.pose_calculator != self.config.pose_calculator {
            info!(
                "Switching pose calculator {:?} -> {:?}",
                self.config.pose_calculator, config.pose_calculator
            );
            self.pose_calculator =
                create_pose_calculator(config.pose_calculator, &self.field, config.number_of_samples);
            self.pose_calculator.init(&mut self.samples);
        }
        if let Err(error) = self.samples.request_size(config.number_of_samples) {
            warn!("Ignoring sample count of new configuration: {error}");
        }
        self.sensor_models = SensorModel::all(&config.sensors);
        self.motion = MotionModel::new(config.motion.clone());
        self.config = config;
    }

    // --- Initialization ---

    /// Places the population around the start pose if one is known, otherwise
    /// uniformly over the field.
    fn init(&mut self) {
        if self.config.start.known {
            let seed = SeedPose {
                pose: self.config.start.pose.to_isometry(),
                deviation: self.config.start.deviation,
            };
            self.init_samples_at_given_positions(&[seed]);
        } else {
            self.init_uniform();
        }
    }

    /// Spreads the samples round-robin over `seeds`, each with triangular
    /// noise of the seed's standard deviation. No seeds means uniform.
    pub fn init_samples_at_given_positions(&mut self, seeds: &[SeedPose]) {
        if seeds.is_empty() {
            self.init_uniform();
            return;
        }
        for (sample, seed) in self.samples.iter_mut().zip(seeds.iter().cycle()) {
            let p = position(&seed.pose);
            let d = &seed.deviation;
            sample.pose = pose(
                p.x + sample_triangular(&mut self.rng, d.x),
                p.y + sample_triangular(&mut self.rng, d.y),
                heading(&seed.pose) + sample_triangular(&mut self.rng, d.rotation),
            );
            sample.weight = 1.0;
        }
        self.after_init();
    }

    /// Draws every sample uniformly over the field.
    pub fn init_uniform(&mut self) {
        for sample in self.samples.iter_mut() {
            sample.pose = self.field.random_pose_on_field(&mut self.rng);
            sample.weight = 1.0;
        }
        self.after_init();
    }

    fn after_init(&mut self) {
        self.last_odometry = Some(self.odometry);
        self.pose_calculator.init(&mut self.samples);
    }

    // --- The cycle ---

    /// Bookkeeping before the update: applies staged configuration, buffers
    /// goal sightings for templates and performs requested or game-state
    /// driven resets. Returns `true` if the population was reinitialized.
    pub fn pre_execution(&mut self, frame: &FrameInput) -> bool {
        self.odometry = frame.odometry;
        if let Some(config) = self.pending_config.take() {
            self.apply_config(config);
        }

        let mut reset = false;
        if self.samples.apply_pending_size() {
            info!("Sample set resized to {}", self.samples.len());
            self.init();
            reset = true;
        }

        self.templates.buffer_new_perceptions(frame);

        match &frame.reset {
            Some(ResetRequest::Uniform) => {
                info!("Reset requested: uniform");
                self.init_uniform();
                reset = true;
            }
            Some(ResetRequest::AroundPoses(seeds)) => {
                info!("Reset requested around {} pose(s)", seeds.len());
                self.init_samples_at_given_positions(seeds);
                reset = true;
            }
            None => {}
        }

        if self.config.consider_game_state {
            reset |= self.consider_game_state(&frame.game);
        }
        self.previous_game = frame.game;
        reset
    }

    fn consider_game_state(&mut self, game: &GameInfo) -> bool {
        let previous = self.previous_game;
        if game.penalty_shootout {
            if previous.state == GameState::Set && game.state == GameState::Playing {
                info!("Penalty shootout started, reinitializing");
                self.init();
                return true;
            }
        } else if previous.penalized && !game.penalized {
            let y = self.field.half_field_width;
            info!("Penalty over, placing samples at the side lines");
            self.init_samples_at_given_positions(&[
                SeedPose {
                    pose: pose(0.0, y, -FRAC_PI_2),
                    deviation: REENTRY_DEVIATION,
                },
                SeedPose {
                    pose: pose(0.0, -y, FRAC_PI_2),
                    deviation: REENTRY_DEVIATION,
                },
            ]);
            return true;
        }
        let entering_set = matches!(previous.state, GameState::Initial | GameState::Ready)
            && game.state == GameState::Set;
        if entering_set && self.config.start.known {
            info!("Entering set, reseeding at the start pose");
            self.init();
            return true;
        }
        false
    }

    /// Propagates every sample by the odometry delta since the last update.
    pub fn motion_update(&mut self, noise: bool) {
        let delta = self
            .last_odometry
            .map_or_else(Isometry2::identity, |last| last.inverse() * self.odometry);
        self.last_odometry = Some(self.odometry);
        self.motion
            .apply(self.samples.as_mut_slice(), &delta, noise, &self.field, &mut self.rng);
    }

    /// Weights the samples with the observations selected for this frame.
    /// A scored sample's weight becomes the product of this cycle's
    /// weightings; unscored samples keep theirs. Returns `true` if any
    /// weight changed.
    pub fn apply_sensor_models(&mut self, frame: &FrameInput) -> bool {
        if !frame.camera.is_valid {
            return false;
        }
        select_observations(frame, &self.config.observations, &mut self.rng, &mut self.selected);
        if self.selected.is_empty() {
            return false;
        }

        let context = SensorContext {
            field: &self.field,
            field_model: &self.field_model,
            validity: &*self.validity,
            frame,
        };
        self.likelihoods.clear();
        self.likelihoods.resize(self.samples.len(), None);
        let mut applied = false;
        for model in &self.sensor_models {
            self.indices.clear();
            self.indices.extend(
                self.selected
                    .iter()
                    .filter(|o| o.kind == model.kind())
                    .map(|o| o.index),
            );
            let result = model.compute_weightings(
                self.samples.as_slice(),
                &self.indices,
                &context,
                &mut self.weightings,
            );
            if result == SensorModelResult::NoUpdate {
                continue;
            }
            for (likelihood, weighting) in self.likelihoods.iter_mut().zip(&self.weightings) {
                if let Some(w) = weighting {
                    *likelihood = Some(likelihood.unwrap_or(1.0) * w);
                }
            }
            applied = true;
        }
        for (sample, likelihood) in self.samples.iter_mut().zip(&self.likelihoods) {
            if let Some(likelihood) = likelihood {
                sample.weight = *likelihood;
            }
        }
        debug!(
            "Scored {} observation(s), update applied: {applied}",
            self.selected.len()
        );
        applied
    }

    /// Folds this cycle's mean weight into the slow and fast averages.
    pub fn adapt_weightings(&mut self) {
        let weighting = &self.config.weighting;
        self.samples
            .adapt_weightings(weighting.alpha_slow, weighting.alpha_fast, self.config.start.known);
    }

    /// Share of the next generation that is drawn from templates.
    fn injection_fraction(&self) -> f64 {
        if self.config.disable_sensor_resetting || !self.templates.templates_available() {
            return 0.0;
        }
        self.samples
            .statistics()
            .ratio()
            .map_or(0.0, |ratio| self.config.weighting.injection.fraction(ratio))
    }

    /// Draws the next generation by systematic resampling and replaces the
    /// rest with templates. Copies keep their parent's weight, so the pose
    /// calculator still ranks them; templates start at zero until scored.
    pub fn resampling(&mut self) {
        let n = self.samples.len();
        let total = self.samples.update_total_weight();
        if total <= 0.0 {
            self.recover_from_zero_weight();
            return;
        }

        let fraction = self.injection_fraction();
        let resampled = n as f64 * (1.0 - fraction);
        let threshold = self.config.weighting.resampling_threshold * total / n as f64;
        let mut filled = 0;
        if resampled > 0.0 {
            let step = (total + threshold * n as f64) / resampled;
            let mut next = self.rng.gen::<f64>() * step;
            let mut sum = 0.0;
            let (previous, generation) = self.samples.swap_generations();
            for parent in previous {
                sum += parent.weight + threshold;
                while sum > next && filled < n {
                    generation[filled] = *parent;
                    filled += 1;
                    next += step;
                }
            }
        } else {
            // Every slot is overwritten by a template below.
            self.samples.swap_generations();
        }

        let generation = self.samples.as_mut_slice();
        self.injected_templates = 0;
        if fraction > 0.0 {
            for slot in &mut generation[filled..] {
                let template = self.templates.get_new_template(&mut self.rng);
                *slot = Sample {
                    weight: 0.0,
                    ..Sample::new(template.pose, self.pose_calculator.new_lineage())
                };
            }
            self.injected_templates = n - filled;
        } else if filled > 0 {
            for index in filled..n {
                generation[index] = generation[self.rng.gen_range(0..filled)];
            }
        } else {
            warn!("Resampling drew no sample, reinitializing uniformly");
            self.init_uniform();
            return;
        }
        debug!(
            "Resampled {filled} sample(s), injected {} template(s)",
            self.injected_templates
        );
    }

    /// Every sample was ruled out: start over from templates, or uniformly
    /// if there is nothing to build them from.
    fn recover_from_zero_weight(&mut self) {
        if self.templates.templates_available() {
            warn!("All sample weights are zero, replacing the population by templates");
            for index in 0..self.samples.len() {
                let template = self.templates.get_new_template(&mut self.rng);
                let lineage = self.pose_calculator.new_lineage();
                self.samples.as_mut_slice()[index] = Sample::new(template.pose, lineage);
            }
            self.injected_templates = self.samples.len();
        } else {
            warn!("All sample weights are zero, reinitializing uniformly");
            self.injected_templates = 0;
            self.init_uniform();
        }
    }

    /// Runs the pose calculator and publishes its estimate. If the population
    /// supports no pose, the previous one is kept with zero confidence.
    pub fn compute_pose(&mut self, time_ms: u64) -> RobotPose {
        let validity = self
            .samples
            .statistics()
            .ratio()
            .map_or(0.0, |ratio| ratio.clamp(0.0, 1.0));
        let estimate = self.pose_calculator.compute(&mut self.samples, &mut self.rng);
        self.robot_pose = match estimate {
            Some(estimate) => RobotPose {
                pose: estimate.pose,
                validity,
                confidence: estimate.confidence,
                time_ms,
            },
            None => {
                warn!("Pose calculator found no pose, keeping the previous one");
                RobotPose {
                    validity,
                    confidence: 0.0,
                    time_ms,
                    ..self.robot_pose
                }
            }
        };
        self.robot_pose
    }
}

impl PoseEstimator for SelfLocator {
    fn process(&mut self, frame: &FrameInput) -> RobotPose {
        let reset = self.pre_execution(frame);
        // No noise right after a reset or while observations are missing.
        self.motion_update(self.updated_by_sensors && !reset);
        self.updated_by_sensors = self.apply_sensor_models(frame);
        if self.updated_by_sensors {
            self.adapt_weightings();
            self.resampling();
        } else {
            self.injected_templates = 0;
        }
        let published = self.compute_pose(frame.time_ms);
        debug!(
            "t={} pose=({:.2}, {:.2}, {:.2}) validity={:.2}",
            frame.time_ms,
            published.pose.translation.vector.x,
            published.pose.translation.vector.y,
            published.pose.rotation.angle(),
            published.validity
        );
        published
    }

    fn pose(&self) -> &RobotPose {
        &self.robot_pose
    }

    fn hypotheses(&self) -> Vec<PoseHypothesis> {
        self.pose_calculator.hypotheses()
    }
}

fn build_validity(config: &LocalizerConfig, field: &FieldDimensions) -> Box<dyn PerceptValidity> {
    if config.field_model.goal_net_filter {
        Box::new(GoalNetValidityChecker::new(field, config.field_model.cell_size))
    } else {
        Box::new(AcceptAll)
    }
}

/// Picks the observations to score this frame.
///
/// Goal posts seen now and the centre circle are always taken, up to their
/// caps; side-ambiguous posts only if no known post was seen. Field points
/// and corners are drawn at random without replacement until the budget is
/// used up, each type limited by its own cap.
pub(crate) fn select_observations<R: Rng + ?Sized>(
    frame: &FrameInput,
    budget: &ObservationBudget,
    rng: &mut R,
    selected: &mut Vec<Observation>,
) {
    selected.clear();
    let now = frame.time_ms;
    let goals = &frame.goals;

    let known = GoalPost::ALL
        .into_iter()
        .filter(|&post| goals.post_seen_at(post, now).is_some())
        .map(|post| Observation::new(ObservationKind::GoalPost, post as usize));
    selected.extend(known.take(budget.max_goal_posts));
    if selected.is_empty() {
        let unknown = GoalSide::ALL
            .into_iter()
            .filter(|&side| goals.unknown_post_seen_at(side, now).is_some())
            .map(|side| Observation::new(ObservationKind::GoalPost, UNKNOWN_POST_OFFSET + side as usize));
        selected.extend(unknown.take(budget.max_goal_posts));
    }
    if frame.lines.center_circle.is_some() && budget.max_center_circles > 0 {
        selected.push(Observation::new(ObservationKind::CenterCircle, 0));
    }

    let mut optional: Vec<Observation> = (0..2 * frame.lines.lines.len())
        .map(|index| Observation::new(ObservationKind::FieldPoint, index))
        .chain(
            (0..frame.lines.corners.len())
                .map(|index| Observation::new(ObservationKind::Corner, index)),
        )
        .collect();
    let (mut points, mut corners) = (0, 0);
    while selected.len() < budget.number_of_observations && !optional.is_empty() {
        let observation = optional.swap_remove(rng.gen_range(0..optional.len()));
        let (taken, cap) = if observation.kind == ObservationKind::FieldPoint {
            (&mut points, budget.max_field_points)
        } else {
            (&mut corners, budget.max_corners)
        };
        if *taken < cap {
            *taken += 1;
            selected.push(observation);
        }
    }
}
