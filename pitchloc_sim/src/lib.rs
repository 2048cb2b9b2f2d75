// pitchloc_sim/src/lib.rs

//! Headless scenario runner for the `pitchloc_core` localizer.
//!
//! A scenario walks a simulated robot along waypoints, renders the landmarks
//! its camera would see, and feeds percepts and noisy odometry to a
//! [`SelfLocator`](pitchloc_core::estimation::SelfLocator) every cycle.

// This prelude is for convenience for other files WITHIN the pitchloc_sim crate.
pub mod prelude;

pub mod cli;
pub mod simulation;
