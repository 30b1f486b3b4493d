//! Recommendation Rule Thresholds
//!
//! Thresholds only - no evaluation logic here. The rule order and shape
//! are fixed contracts in `engine.rs`; these numbers are the tunable
//! part.

use serde::{Deserialize, Serialize};

// ============================================================================
// THRESHOLDS (Defaults)
// ============================================================================

/// Recent-vs-baseline efficiency drop (%) that triggers a decline advisory
pub const EFFICIENCY_DROP_PCT: f64 = 20.0;

/// Drop (%) at which the decline advisory escalates to HIGH
pub const EFFICIENCY_DROP_HIGH_PCT: f64 = 30.0;

/// Consumption increase (L/100km) that reads as a fuel-leak pattern
pub const FUEL_LEAK_L_PER_100KM: f64 = 5.0;

/// Per-vehicle anomaly rate that triggers a cluster advisory
pub const ANOMALY_RATE_THRESHOLD: f64 = 0.25;

/// Coefficient of variation of efficiency that reads as erratic
pub const EFFICIENCY_CV_THRESHOLD: f64 = 0.35;

/// Fleet-wide anomaly rate that triggers a fleet advisory
/// (2x the default model contamination)
pub const FLEET_ANOMALY_RATE_THRESHOLD: f64 = 0.10;

/// Records a vehicle needs before rules 1-4 apply to it
pub const MIN_RECORDS_FOR_RULES: usize = 5;

// ============================================================================
// CONFIGURABLE THRESHOLDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    pub efficiency_drop_pct: f64,
    pub efficiency_drop_high_pct: f64,
    pub fuel_leak_l_per_100km: f64,
    pub anomaly_rate_threshold: f64,
    pub efficiency_cv_threshold: f64,
    pub fleet_anomaly_rate_threshold: f64,
    pub min_records_for_rules: usize,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            efficiency_drop_pct: EFFICIENCY_DROP_PCT,
            efficiency_drop_high_pct: EFFICIENCY_DROP_HIGH_PCT,
            fuel_leak_l_per_100km: FUEL_LEAK_L_PER_100KM,
            anomaly_rate_threshold: ANOMALY_RATE_THRESHOLD,
            efficiency_cv_threshold: EFFICIENCY_CV_THRESHOLD,
            fleet_anomaly_rate_threshold: FLEET_ANOMALY_RATE_THRESHOLD,
            min_records_for_rules: MIN_RECORDS_FOR_RULES,
        }
    }
}

impl RuleThresholds {
    /// High sensitivity - lower thresholds, more advisories
    pub fn high_sensitivity() -> Self {
        Self {
            efficiency_drop_pct: 10.0,
            efficiency_drop_high_pct: 20.0,
            fuel_leak_l_per_100km: 3.0,
            anomaly_rate_threshold: 0.15,
            efficiency_cv_threshold: 0.25,
            ..Default::default()
        }
    }

    /// Low sensitivity - higher thresholds, fewer advisories
    pub fn low_sensitivity() -> Self {
        Self {
            efficiency_drop_pct: 30.0,
            efficiency_drop_high_pct: 45.0,
            fuel_leak_l_per_100km: 8.0,
            anomaly_rate_threshold: 0.40,
            efficiency_cv_threshold: 0.50,
            ..Default::default()
        }
    }
}
