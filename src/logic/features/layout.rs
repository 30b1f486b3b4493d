//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! The trained model stores the layout version + hash it was fitted
//! against; scoring with a drifted layout must fail, never reshape.

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when layout changes
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
/// This is the SINGLE SOURCE OF TRUTH for feature layout
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Raw trip values (0-2) ===
    "efficiency",            // 0: km per litre (sentinel 0.0 when degenerate)
    "fuel_used",             // 1: litres consumed this trip
    "distance_km",           // 2: kilometres driven this trip

    // === Time of record (3-5) ===
    "hour",                  // 3: Hour of day 0-23
    "day_of_week",           // 4: 0=Mon .. 6=Sun
    "is_weekend",            // 5: 0.0 or 1.0

    // === Rolling statistics, window W (6-10) ===
    "efficiency_roll_mean",  // 6: rolling mean of efficiency
    "efficiency_roll_std",   // 7: rolling population std of efficiency
    "efficiency_zscore",     // 8: (efficiency - roll_mean) / roll_std
    "fuel_used_roll_mean",   // 9: rolling mean of fuel used
    "distance_roll_mean",    // 10: rolling mean of distance

    // === Derived ratios & context (11-15) ===
    "fuel_per_km",           // 11: litres per km (sentinel 0.0 when distance is 0)
    "fleet_deviation",       // 12: efficiency minus fleet mean at/before timestamp
    "trend_slope",           // 13: short-term efficiency trend over the window
    "fuel_used_delta",       // 14: fuel change vs previous record
    "distance_delta",        // 15: distance change vs previous record
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 16;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
/// Used to detect layout mismatches at runtime
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    // Include version in hash
    hasher.update(&[FEATURE_VERSION]);

    // Hash all feature names in order
    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

static LAYOUT_HASH: Lazy<u32> = Lazy::new(compute_layout_hash);

/// Get layout hash (computed once; inputs are const)
pub fn layout_hash() -> u32 {
    *LAYOUT_HASH
}

// ============================================================================
// FEATURE SCHEMA
// ============================================================================

/// Snapshot of the layout a model was trained against.
/// Stored inside ModelState and compared at every scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u8,
    pub hash: u32,
    pub feature_names: Vec<String>,
}

impl FeatureSchema {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Compare against the live layout. Any drift is an error that
    /// forces a retrain, never a tolerated reshape.
    pub fn validate_against_current(&self) -> EngineResult<()> {
        validate_layout(self.version, self.hash)
    }

    pub fn is_current(&self) -> bool {
        self.validate_against_current().is_ok()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Validate that incoming data matches the current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> EngineResult<()> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(EngineError::SchemaMismatch {
            model_version: incoming_version,
            model_hash: incoming_hash,
            live_version: FEATURE_VERSION,
            live_hash: current_hash,
        });
    }

    Ok(())
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name (O(n) but features are few)
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Get feature name by index
pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

// ============================================================================
// TESTS
// ============================================================================
