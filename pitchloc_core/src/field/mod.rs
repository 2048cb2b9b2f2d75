// pitchloc_core/src/field/mod.rs

//! Static field geometry and the lookups derived from it.

pub mod dimensions;
pub mod model;

pub use dimensions::{CornerKind, FieldCorner, FieldDimensions, FieldLine, GoalPost, GoalSide};
pub use model::{orientation_class, FieldModel};
