//! Model State Persistence
//!
//! JSON on disk with a parameter checksum verified on load. Schema
//! compatibility is deliberately NOT decided here; the lifecycle
//! manager owns that call so an incompatible state can still be
//! reported as stale instead of vanishing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::logic::model::ModelState;

/// Get default model state path
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleet-analytics")
        .join("model_state_v1.json")
}

/// Save model state to disk
pub fn save_state(state: &ModelState, path: &Path) -> EngineResult<()> {
    // Ensure directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(state)?;
    fs::write(path, json)?;
    log::info!("model state {} saved to {}", state.version_id, path.display());
    Ok(())
}

/// Load model state from disk with integrity validation
pub fn load_state(path: &Path) -> EngineResult<ModelState> {
    if !path.exists() {
        return Err(EngineError::Storage(format!(
            "model state file not found: {}",
            path.display()
        )));
    }

    let data = fs::read(path)?;
    let state: ModelState = serde_json::from_slice(&data)?;

    state.verify_checksum()?;

    Ok(state)
}

// ============================================================================
// TESTS
// ============================================================================
