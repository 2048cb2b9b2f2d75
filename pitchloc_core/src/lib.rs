// pitchloc_core/src/lib.rs

// This file defines the public modules of the library.
pub mod config;
pub mod error;
pub mod estimation;
pub mod field;
pub mod geometry;
pub mod messages;
pub mod motion;
pub mod pose_calculators;
pub mod prelude;
pub mod sample_set;
pub mod sensor_models;
pub mod templates;
pub mod validity;
