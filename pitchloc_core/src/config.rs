// pitchloc_core/src/config.rs

use crate::error::{ensure_non_negative, ensure_positive, LocalizationError};
use crate::geometry::pose;
use crate::messages::PoseDeviation;
use nalgebra::Isometry2;
use serde::{Deserialize, Serialize};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # LocalizerConfig
/// Every tunable of the localization engine. Usually loaded from the
/// `[localizer]` table of a scenario file; missing fields use the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalizerConfig {
    pub number_of_samples: usize,
    /// Seed of the engine's pseudo-random number generator.
    pub seed: u64,
    pub sensors: SensorDeviations,
    pub weighting: WeightingConfig,
    pub motion: MotionNoise,
    pub observations: ObservationBudget,
    /// Never inject templates during resampling.
    pub disable_sensor_resetting: bool,
    /// Reinitialize on penalty and game phase transitions.
    pub consider_game_state: bool,
    pub start: StartPoseConfig,
    pub template_clipping: TemplateClipping,
    pub pose_calculator: PoseCalculatorKind,
    pub field_model: FieldModelConfig,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            number_of_samples: 100,
            seed: 0,
            sensors: SensorDeviations::default(),
            weighting: WeightingConfig::default(),
            motion: MotionNoise::default(),
            observations: ObservationBudget::default(),
            disable_sensor_resetting: false,
            consider_game_state: true,
            start: StartPoseConfig::default(),
            template_clipping: TemplateClipping::default(),
            pose_calculator: PoseCalculatorKind::default(),
            field_model: FieldModelConfig::default(),
        }
    }
}

impl LocalizerConfig {
    /// Rejects configurations the engine can't run with.
    pub fn validate(&self) -> Result<(), LocalizationError> {
        if self.number_of_samples == 0 {
            return Err(LocalizationError::InvalidSampleCount(0));
        }
        self.sensors.validate()?;
        self.weighting.validate()?;
        self.motion.validate()?;
        self.observations.validate()?;
        self.start.validate()?;
        self.template_clipping.validate()?;
        self.field_model.validate()?;
        Ok(())
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

/// Standard deviations of the sensor models. Angles and distance-as-angle
/// terms in radians, template sampling noise in metres.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorDeviations {
    pub goal_post_angle: f64,
    pub goal_post_bearing_distance: f64,
    pub goal_post_size_distance: f64,
    /// Distance noise added to bearing-based posts when building templates.
    pub goal_post_sample_bearing_distance: f64,
    /// Distance noise added to size-based posts when building templates.
    pub goal_post_sample_size_distance: f64,
    pub center_circle_angle: f64,
    pub center_circle_distance: f64,
    pub field_point_angle: f64,
    pub field_point_distance: f64,
    pub corner_angle: f64,
    pub corner_distance: f64,
}

impl Default for SensorDeviations {
    fn default() -> Self {
        Self {
            goal_post_angle: 0.1,
            goal_post_bearing_distance: 0.1,
            goal_post_size_distance: 0.15,
            goal_post_sample_bearing_distance: 0.1,
            goal_post_sample_size_distance: 0.2,
            center_circle_angle: 0.15,
            center_circle_distance: 0.15,
            field_point_angle: 0.1,
            field_point_distance: 0.1,
            corner_angle: 0.1,
            corner_distance: 0.1,
        }
    }
}

impl SensorDeviations {
    fn validate(&self) -> Result<(), LocalizationError> {
        ensure_positive("sensors.goal_post_angle", self.goal_post_angle)?;
        ensure_positive("sensors.goal_post_bearing_distance", self.goal_post_bearing_distance)?;
        ensure_positive("sensors.goal_post_size_distance", self.goal_post_size_distance)?;
        ensure_non_negative(
            "sensors.goal_post_sample_bearing_distance",
            self.goal_post_sample_bearing_distance,
        )?;
        ensure_non_negative(
            "sensors.goal_post_sample_size_distance",
            self.goal_post_sample_size_distance,
        )?;
        ensure_positive("sensors.center_circle_angle", self.center_circle_angle)?;
        ensure_positive("sensors.center_circle_distance", self.center_circle_distance)?;
        ensure_positive("sensors.field_point_angle", self.field_point_angle)?;
        ensure_positive("sensors.field_point_distance", self.field_point_distance)?;
        ensure_positive("sensors.corner_angle", self.corner_angle)?;
        ensure_positive("sensors.corner_distance", self.corner_distance)
    }
}

/// Weight bookkeeping and the resampling mixture.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightingConfig {
    /// Decay rate of the long-term average weight.
    pub alpha_slow: f64,
    /// Decay rate of the short-term average weight.
    pub alpha_fast: f64,
    /// Added to every sample's draw weight, as a multiple of the mean weight.
    pub resampling_threshold: f64,
    pub injection: InjectionMap,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            alpha_slow: 0.01,
            alpha_fast: 0.1,
            resampling_threshold: 0.1,
            injection: InjectionMap::default(),
        }
    }
}

impl WeightingConfig {
    fn validate(&self) -> Result<(), LocalizationError> {
        for (name, alpha) in [
            ("weighting.alpha_slow", self.alpha_slow),
            ("weighting.alpha_fast", self.alpha_fast),
        ] {
            ensure_positive(name, alpha)?;
            if alpha > 1.0 {
                return Err(LocalizationError::parameter(name, "must not exceed 1"));
            }
        }
        ensure_non_negative("weighting.resampling_threshold", self.resampling_threshold)?;
        self.injection.validate()
    }
}

/// Maps the fast/slow weight ratio to the share of template samples:
/// `clamp(gain * (1 - fast / slow) + offset, 0, max_fraction)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InjectionMap {
    pub gain: f64,
    pub offset: f64,
    pub max_fraction: f64,
}

impl Default for InjectionMap {
    fn default() -> Self {
        Self {
            gain: 1.0,
            offset: 0.0,
            max_fraction: 1.0,
        }
    }
}

impl InjectionMap {
    /// Template share for a given `fast / slow` ratio.
    pub fn fraction(&self, ratio: f64) -> f64 {
        let fraction = self.gain * (1.0 - ratio) + self.offset;
        if fraction.is_nan() {
            return 0.0;
        }
        fraction.clamp(0.0, self.max_fraction)
    }

    fn validate(&self) -> Result<(), LocalizationError> {
        if !self.gain.is_finite() || !self.offset.is_finite() {
            return Err(LocalizationError::parameter(
                "weighting.injection",
                "gain and offset must be finite",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_fraction) {
            return Err(LocalizationError::parameter(
                "weighting.injection.max_fraction",
                format!("must lie in [0, 1], got {}", self.max_fraction),
            ));
        }
        Ok(())
    }
}

/// Odometry noise model. Translations in metres, rotations in radians.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionNoise {
    /// Minimum translational noise per cycle.
    pub translation_noise: f64,
    /// Minimum rotational noise per cycle.
    pub rotation_noise: f64,
    /// Rotational noise per metre moved.
    pub moved_dist_weight: f64,
    /// Rotational noise per radian turned.
    pub moved_angle_weight: f64,
    /// Translational noise along the direction of motion, per metre moved.
    pub major_dir_trans_weight: f64,
    /// Translational noise across the direction of motion, per metre moved.
    pub minor_dir_trans_weight: f64,
}

impl Default for MotionNoise {
    fn default() -> Self {
        Self {
            translation_noise: 0.005,
            rotation_noise: 0.005,
            moved_dist_weight: 0.1,
            moved_angle_weight: 0.1,
            major_dir_trans_weight: 0.1,
            minor_dir_trans_weight: 0.05,
        }
    }
}

impl MotionNoise {
    fn validate(&self) -> Result<(), LocalizationError> {
        ensure_non_negative("motion.translation_noise", self.translation_noise)?;
        ensure_non_negative("motion.rotation_noise", self.rotation_noise)?;
        ensure_non_negative("motion.moved_dist_weight", self.moved_dist_weight)?;
        ensure_non_negative("motion.moved_angle_weight", self.moved_angle_weight)?;
        ensure_non_negative("motion.major_dir_trans_weight", self.major_dir_trans_weight)?;
        ensure_non_negative("motion.minor_dir_trans_weight", self.minor_dir_trans_weight)
    }
}

/// How many observations are scored per cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservationBudget {
    /// Total number of observations; mandatory ones (goal posts, centre
    /// circle) may exceed it, optional ones fill up to it.
    pub number_of_observations: usize,
    pub max_goal_posts: usize,
    pub max_center_circles: usize,
    pub max_field_points: usize,
    pub max_corners: usize,
}

impl Default for ObservationBudget {
    fn default() -> Self {
        Self {
            number_of_observations: 6,
            max_goal_posts: 4,
            max_center_circles: 1,
            max_field_points: 6,
            max_corners: 3,
        }
    }
}

impl ObservationBudget {
    fn validate(&self) -> Result<(), LocalizationError> {
        if self.number_of_observations == 0 {
            return Err(LocalizationError::parameter(
                "observations.number_of_observations",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// A pose as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoseConfig {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

impl PoseConfig {
    pub fn to_isometry(self) -> Isometry2<f64> {
        pose(self.x, self.y, self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StartPoseConfig {
    /// Start around `pose` instead of uniformly over the field.
    pub known: bool,
    pub pose: PoseConfig,
    pub deviation: PoseDeviation,
}

impl Default for StartPoseConfig {
    fn default() -> Self {
        Self {
            known: false,
            pose: PoseConfig {
                x: -2.5,
                y: 0.0,
                rotation: 0.0,
            },
            deviation: PoseDeviation::new(0.2, 0.2, 0.2),
        }
    }
}

impl StartPoseConfig {
    fn validate(&self) -> Result<(), LocalizationError> {
        ensure_non_negative("start.deviation.x", self.deviation.x)?;
        ensure_non_negative("start.deviation.y", self.deviation.y)?;
        ensure_non_negative("start.deviation.rotation", self.deviation.rotation)
    }
}

/// Restricts template generation to a rectangle of the field.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateClipping {
    pub enabled: bool,
    /// `[min, max]` in metres.
    pub range_x: [f64; 2],
    pub range_y: [f64; 2],
}

impl Default for TemplateClipping {
    fn default() -> Self {
        Self {
            enabled: false,
            range_x: [-3.0, 0.0],
            range_y: [-2.0, 2.0],
        }
    }
}

impl TemplateClipping {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        !self.enabled
            || ((self.range_x[0]..=self.range_x[1]).contains(&x)
                && (self.range_y[0]..=self.range_y[1]).contains(&y))
    }

    fn validate(&self) -> Result<(), LocalizationError> {
        if self.enabled && (self.range_x[0] >= self.range_x[1] || self.range_y[0] >= self.range_y[1]) {
            return Err(LocalizationError::parameter(
                "template_clipping",
                "ranges must be non-empty [min, max] pairs",
            ));
        }
        Ok(())
    }
}

/// Which strategy collapses the sample set into the published pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseCalculatorKind {
    BestParticle,
    OverallAverage,
    #[default]
    Binning,
    KMeans,
    ParticleHistory,
}

/// Resolution of the precomputed field lookups.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldModelConfig {
    pub cell_size: f64,
    /// Observed lines up to this length may also match centre circle segments.
    pub max_crossing_length: f64,
    /// Reject percepts that would lie inside a goal net.
    pub goal_net_filter: bool,
}

impl Default for FieldModelConfig {
    fn default() -> Self {
        Self {
            cell_size: 0.1,
            max_crossing_length: 0.3,
            goal_net_filter: true,
        }
    }
}

impl FieldModelConfig {
    fn validate(&self) -> Result<(), LocalizationError> {
        ensure_positive("field_model.cell_size", self.cell_size)?;
        ensure_non_negative("field_model.max_crossing_length", self.max_crossing_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LocalizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_samples_is_fatal() {
        let config = LocalizerConfig {
            number_of_samples: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(LocalizationError::InvalidSampleCount(0)));
    }

    #[test]
    fn test_alpha_above_one_is_rejected() {
        let mut config = LocalizerConfig::default();
        config.weighting.alpha_fast = 1.5;
        assert!(matches!(
            config.validate(),
            Err(LocalizationError::InvalidParameter { name: "weighting.alpha_fast", .. })
        ));
    }

    #[test]
    fn test_injection_map_is_clamped_linear() {
        let map = InjectionMap::default();
        assert_abs_diff_eq!(map.fraction(1.0), 0.0);
        assert_abs_diff_eq!(map.fraction(0.25), 0.75);
        assert_abs_diff_eq!(map.fraction(2.0), 0.0);
        assert_abs_diff_eq!(map.fraction(-1.0), 1.0);

        let capped = InjectionMap {
            gain: 2.0,
            offset: 0.0,
            max_fraction: 0.5,
        };
        assert_abs_diff_eq!(capped.fraction(0.9), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(capped.fraction(0.0), 0.5);
    }

    #[test]
    fn test_clipping_only_applies_when_enabled() {
        let mut clipping = TemplateClipping::default();
        assert!(clipping.contains(2.5, 0.0));
        clipping.enabled = true;
        assert!(!clipping.contains(2.5, 0.0));
        assert!(clipping.contains(-1.0, 0.5));
    }
}
