// pitchloc_sim/src/simulation/config/catalog.rs

//! Enumerates the scenario files below a directory.

use super::ScenarioError;
use log::{info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every `.toml` file below `dir`, sorted by path so batch runs are
/// reproducible.
pub fn discover_scenarios(dir: &Path) -> Result<Vec<PathBuf>, ScenarioError> {
    if !dir.is_dir() {
        return Err(ScenarioError::NotFound(dir.to_path_buf()));
    }
    let mut scenarios = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_dir()
            && entry.path().extension().map_or(false, |ext| ext == "toml")
        {
            scenarios.push(entry.into_path());
        }
    }
    if scenarios.is_empty() {
        warn!("No scenario files found in {:?}", dir);
    } else {
        info!("Found {} scenario(s) in {:?}", scenarios.len(), dir);
    }
    Ok(scenarios)
}
