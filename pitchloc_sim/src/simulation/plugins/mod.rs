// pitchloc_sim/src/simulation/plugins/mod.rs

pub mod debugging;
pub mod sensors;
