//! Engine Configuration
//!
//! Typed knobs for the analytics pipeline. Defaults live in
//! `crate::constants`; this struct is what callers actually pass around.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{EngineError, EngineResult};

/// Configuration for feature engineering and model training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rolling window size W for per-vehicle statistics
    pub rolling_window: usize,

    /// Expected fraction of anomalous records, open interval (0, 0.5)
    pub contamination: f64,

    /// Minimum records required for training
    pub min_training_samples: usize,

    /// Random seed for deterministic training
    pub training_seed: u64,

    /// Isolation forest size
    pub tree_count: usize,

    /// Subsample size per tree
    pub subsample_size: usize,

    /// Model age (seconds) before the lifecycle manager reports it stale
    pub model_ttl_secs: i64,

    /// Record growth ratio since training that marks the model stale
    pub stale_growth_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rolling_window: constants::get_rolling_window(),
            contamination: constants::get_contamination(),
            min_training_samples: constants::get_min_training_samples(),
            training_seed: constants::DEFAULT_TRAINING_SEED,
            tree_count: constants::DEFAULT_TREE_COUNT,
            subsample_size: constants::DEFAULT_SUBSAMPLE_SIZE,
            model_ttl_secs: constants::get_model_ttl_secs(),
            stale_growth_ratio: constants::DEFAULT_STALE_GROWTH_RATIO,
        }
    }
}

impl EngineConfig {
    /// Validate ranges. Contamination is the only knob with a hard
    /// mathematical bound; the rest just need to be non-degenerate.
    pub fn validate(&self) -> EngineResult<()> {
        validate_contamination(self.contamination)?;
        if self.rolling_window == 0 {
            return Err(EngineError::InvalidParameter(
                "rolling_window must be at least 1".to_string(),
            ));
        }
        if self.min_training_samples == 0 {
            return Err(EngineError::InvalidParameter(
                "min_training_samples must be at least 1".to_string(),
            ));
        }
        if self.tree_count == 0 || self.subsample_size < 2 {
            return Err(EngineError::InvalidParameter(
                "tree_count must be >= 1 and subsample_size >= 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check a contamination rate against its documented open interval.
pub fn validate_contamination(contamination: f64) -> EngineResult<()> {
    if !contamination.is_finite() || contamination <= 0.0 || contamination >= 0.5 {
        return Err(EngineError::InvalidParameter(format!(
            "contamination must be in (0, 0.5), got {}",
            contamination
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_contamination_bounds() {
        assert!(validate_contamination(0.05).is_ok());
        assert!(validate_contamination(0.499).is_ok());
        assert!(validate_contamination(0.0).is_err());
        assert!(validate_contamination(0.5).is_err());
        assert!(validate_contamination(-0.1).is_err());
        assert!(validate_contamination(f64::NAN).is_err());
    }
}
