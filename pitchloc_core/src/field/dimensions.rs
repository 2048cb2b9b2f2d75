// pitchloc_core/src/field/dimensions.rs

use crate::error::{ensure_positive, LocalizationError};
use crate::geometry::pose;
use nalgebra::{Isometry2, Point2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// =========================================================================
// == Landmark Identifiers ==
// =========================================================================

/// The four goal posts with a known identity. "Left" and "right" are seen
/// from a robot standing in front of the goal and looking into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalPost {
    LeftOpponent = 0,
    RightOpponent = 1,
    LeftOwn = 2,
    RightOwn = 3,
}

impl GoalPost {
    pub const ALL: [GoalPost; 4] = [
        GoalPost::LeftOpponent,
        GoalPost::RightOpponent,
        GoalPost::LeftOwn,
        GoalPost::RightOwn,
    ];

    pub fn side(self) -> GoalSide {
        match self {
            GoalPost::LeftOpponent | GoalPost::RightOpponent => GoalSide::Opponent,
            GoalPost::LeftOwn | GoalPost::RightOwn => GoalSide::Own,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalSide {
    Opponent = 0,
    Own = 1,
}

impl GoalSide {
    pub const ALL: [GoalSide; 2] = [GoalSide::Opponent, GoalSide::Own];

    /// The (left, right) posts of this goal.
    pub fn posts(self) -> [GoalPost; 2] {
        match self {
            GoalSide::Opponent => [GoalPost::LeftOpponent, GoalPost::RightOpponent],
            GoalSide::Own => [GoalPost::LeftOwn, GoalPost::RightOwn],
        }
    }
}

/// Shape of a line junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CornerKind {
    X,
    T,
    L,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLine {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
}

impl FieldLine {
    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            start: Point2::new(x1, y1),
            end: Point2::new(x2, y2),
        }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// True if the line runs closer to the x axis than to the y axis.
    pub fn is_along_x(&self) -> bool {
        let d = self.end - self.start;
        d.x.abs() >= d.y.abs()
    }
}

/// A line junction on the field.
///
/// `orientation` is a quarter-turn index (`orientation * π/2`): for a T the
/// direction of the stem pointing away from the junction, for an L the
/// direction of the first arm (the second arm is a quarter turn further).
/// X junctions always carry orientation 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldCorner {
    pub position: Point2<f64>,
    pub kind: CornerKind,
    pub orientation: usize,
}

// =========================================================================
// == Field Dimensions ==
// =========================================================================

/// Static geometry of the playing field. The origin is the centre spot, the
/// opponent goal lies on the positive x axis. All values in metres.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldDimensions {
    /// Distance from the centre to a ground line.
    pub half_field_length: f64,
    /// Distance from the centre to a side line.
    pub half_field_width: f64,
    pub penalty_area_depth: f64,
    pub half_penalty_area_width: f64,
    /// Distance from the centre line of the field to a goal post centre.
    pub half_goal_width: f64,
    pub goal_depth: f64,
    pub goal_post_radius: f64,
    pub center_circle_radius: f64,
    /// Number of segments used to approximate the centre circle.
    pub center_circle_segments: usize,
    /// Width of the carpet strip outside the field lines.
    pub carpet_margin: f64,
}

impl Default for FieldDimensions {
    fn default() -> Self {
        Self {
            half_field_length: 3.0,
            half_field_width: 2.0,
            penalty_area_depth: 0.6,
            half_penalty_area_width: 1.1,
            half_goal_width: 0.7,
            goal_depth: 0.5,
            goal_post_radius: 0.05,
            center_circle_radius: 0.6,
            center_circle_segments: 16,
            carpet_margin: 0.7,
        }
    }
}

impl FieldDimensions {
    pub fn validate(&self) -> Result<(), LocalizationError> {
        let checks = [
            ("half_field_length", self.half_field_length),
            ("half_field_width", self.half_field_width),
            ("penalty_area_depth", self.penalty_area_depth),
            ("half_penalty_area_width", self.half_penalty_area_width),
            ("half_goal_width", self.half_goal_width),
            ("goal_depth", self.goal_depth),
            ("goal_post_radius", self.goal_post_radius),
            ("center_circle_radius", self.center_circle_radius),
            ("carpet_margin", self.carpet_margin),
        ];
        for (name, value) in checks {
            ensure_positive(name, value)
                .map_err(|e| LocalizationError::InvalidFieldDimensions(e.to_string()))?;
        }
        if self.penalty_area_depth >= self.half_field_length {
            return Err(LocalizationError::InvalidFieldDimensions(
                "penalty area reaches past the centre line".into(),
            ));
        }
        if self.half_goal_width >= self.half_penalty_area_width
            || self.half_penalty_area_width >= self.half_field_width
        {
            return Err(LocalizationError::InvalidFieldDimensions(
                "goal, penalty area and field widths must be strictly nested".into(),
            ));
        }
        if self.center_circle_radius >= self.half_field_width {
            return Err(LocalizationError::InvalidFieldDimensions(
                "centre circle does not fit between the side lines".into(),
            ));
        }
        if self.center_circle_segments < 4 {
            return Err(LocalizationError::InvalidFieldDimensions(
                "centre circle needs at least 4 segments".into(),
            ));
        }
        Ok(())
    }

    pub fn half_carpet_length(&self) -> f64 {
        self.half_field_length + self.carpet_margin
    }

    pub fn half_carpet_width(&self) -> f64 {
        self.half_field_width + self.carpet_margin
    }

    /// Real-world position of a goal post centre. The own goal is mirrored, so
    /// its left post lies on the negative y side.
    pub fn goal_post_position(&self, post: GoalPost) -> Point2<f64> {
        let x = self.half_field_length;
        let y = self.half_goal_width;
        match post {
            GoalPost::LeftOpponent => Point2::new(x, y),
            GoalPost::RightOpponent => Point2::new(x, -y),
            GoalPost::LeftOwn => Point2::new(-x, -y),
            GoalPost::RightOwn => Point2::new(-x, y),
        }
    }

    /// Legal robot positions.
    pub fn is_inside_carpet(&self, p: &Point2<f64>) -> bool {
        p.x.abs() <= self.half_carpet_length() && p.y.abs() <= self.half_carpet_width()
    }

    /// Positions inside the field lines.
    pub fn is_inside_field(&self, p: &Point2<f64>) -> bool {
        p.x.abs() <= self.half_field_length && p.y.abs() <= self.half_field_width
    }

    pub fn clip_to_carpet(&self, p: &Point2<f64>) -> Point2<f64> {
        let hx = self.half_carpet_length();
        let hy = self.half_carpet_width();
        Point2::new(p.x.clamp(-hx, hx), p.y.clamp(-hy, hy))
    }

    /// A uniformly drawn pose inside the field lines.
    pub fn random_pose_on_field<R: Rng + ?Sized>(&self, rng: &mut R) -> Isometry2<f64> {
        pose(
            rng.gen_range(-self.half_field_length..=self.half_field_length),
            rng.gen_range(-self.half_field_width..=self.half_field_width),
            rng.gen_range(-PI..PI),
        )
    }

    /// All painted lines, with the centre circle approximated by a polygon.
    pub fn field_lines(&self) -> Vec<FieldLine> {
        let l = self.half_field_length;
        let w = self.half_field_width;
        let p = l - self.penalty_area_depth;
        let pw = self.half_penalty_area_width;
        let mut lines = vec![
            FieldLine::new(-l, -w, l, -w),
            FieldLine::new(-l, w, l, w),
            FieldLine::new(-l, -w, -l, w),
            FieldLine::new(l, -w, l, w),
            FieldLine::new(0.0, -w, 0.0, w),
            // Own penalty area.
            FieldLine::new(-l, pw, -p, pw),
            FieldLine::new(-l, -pw, -p, -pw),
            FieldLine::new(-p, -pw, -p, pw),
            // Opponent penalty area.
            FieldLine::new(l, pw, p, pw),
            FieldLine::new(l, -pw, p, -pw),
            FieldLine::new(p, -pw, p, pw),
        ];
        let n = self.center_circle_segments;
        let r = self.center_circle_radius;
        lines.extend((0..n).map(|i| {
            let a1 = 2.0 * PI * i as f64 / n as f64;
            let a2 = 2.0 * PI * (i + 1) as f64 / n as f64;
            FieldLine::new(r * a1.cos(), r * a1.sin(), r * a2.cos(), r * a2.sin())
        }));
        lines
    }

    /// All line junctions with their kind and orientation.
    pub fn field_corners(&self) -> Vec<FieldCorner> {
        let l = self.half_field_length;
        let w = self.half_field_width;
        let p = l - self.penalty_area_depth;
        let pw = self.half_penalty_area_width;
        let r = self.center_circle_radius;
        let corner = |x: f64, y: f64, kind: CornerKind, orientation: usize| FieldCorner {
            position: Point2::new(x, y),
            kind,
            orientation,
        };
        vec![
            // Centre line crossing the centre circle.
            corner(0.0, r, CornerKind::X, 0),
            corner(0.0, -r, CornerKind::X, 0),
            // Centre line meeting the side lines.
            corner(0.0, w, CornerKind::T, 3),
            corner(0.0, -w, CornerKind::T, 1),
            // Penalty areas meeting the ground lines.
            corner(-l, pw, CornerKind::T, 0),
            corner(-l, -pw, CornerKind::T, 0),
            corner(l, pw, CornerKind::T, 2),
            corner(l, -pw, CornerKind::T, 2),
            // Field corners.
            corner(-l, -w, CornerKind::L, 0),
            corner(l, -w, CornerKind::L, 1),
            corner(l, w, CornerKind::L, 2),
            corner(-l, w, CornerKind::L, 3),
            // Penalty area corners.
            corner(-p, pw, CornerKind::L, 2),
            corner(-p, -pw, CornerKind::L, 1),
            corner(p, pw, CornerKind::L, 3),
            corner(p, -pw, CornerKind::L, 0),
        ]
    }
}
