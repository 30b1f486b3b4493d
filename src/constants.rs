//! Central Configuration Constants
//!
//! Single source of truth for all engine defaults.
//! To change a default threshold or window, only edit this file.

/// Rolling window size for per-vehicle feature statistics
pub const DEFAULT_ROLLING_WINDOW: usize = 5;

/// Expected fraction of anomalous records
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Minimum records required before a model can be trained
pub const DEFAULT_MIN_TRAINING_SAMPLES: usize = 10;

/// Random seed for model training (fixed for reproducibility)
pub const DEFAULT_TRAINING_SEED: u64 = 42;

/// Trees in the isolation forest
pub const DEFAULT_TREE_COUNT: usize = 100;

/// Subsample size per tree (capped at the training set size)
pub const DEFAULT_SUBSAMPLE_SIZE: usize = 256;

/// Model age (seconds) after which the current model counts as stale
pub const DEFAULT_MODEL_TTL_SECS: i64 = 24 * 3600;

/// Record growth ratio since training that marks the model stale
/// (1.5 = half again as many records as the model was trained on)
pub const DEFAULT_STALE_GROWTH_RATIO: f64 = 1.5;

/// Sentinel efficiency for degenerate (zero-fuel) records
pub const EFFICIENCY_SENTINEL: f64 = 0.0;

/// Records at the tail of a window treated as "recent" by the rule engine
pub const RECENT_TRIP_COUNT: usize = 5;

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const ENGINE_NAME: &str = "FleetFuel-Analytics";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get rolling window size from environment or use default
pub fn get_rolling_window() -> usize {
    std::env::var("FLEET_ROLLING_WINDOW")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_ROLLING_WINDOW)
}

/// Get contamination rate from environment or use default
pub fn get_contamination() -> f64 {
    std::env::var("FLEET_CONTAMINATION")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CONTAMINATION)
}

/// Get minimum training sample count from environment or use default
pub fn get_min_training_samples() -> usize {
    std::env::var("FLEET_MIN_TRAINING_SAMPLES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MIN_TRAINING_SAMPLES)
}

/// Get model TTL (seconds) from environment or use default
pub fn get_model_ttl_secs() -> i64 {
    std::env::var("FLEET_MODEL_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MODEL_TTL_SECS)
}
