//! Model State
//!
//! The versioned, persistable artifact of one completed training run.
//! Exactly one state is "current" per engine; states are immutable once
//! built and replaced wholesale by the lifecycle manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

use super::detector::FeatureScaler;
use super::forest::IsolationForest;
use crate::error::{EngineError, EngineResult};
use crate::logic::features::FeatureSchema;

/// Tie-breaker so two trainings within the same second still get
/// distinct, monotonic version ids.
static VERSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Timestamp-derived version id, e.g. `v20240304_061500_0007`.
pub fn next_version_id(trained_at: DateTime<Utc>) -> String {
    let seq = VERSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("v{}_{:04}", trained_at.format("%Y%m%d_%H%M%S"), seq)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelState {
    pub state_id: String,
    pub version_id: String,
    pub trained_at: DateTime<Utc>,
    /// Layout the model was fitted against; scoring must match it exactly
    pub feature_schema: FeatureSchema,
    pub contamination_rate: f64,
    pub training_sample_count: usize,
    /// Scores at or below this are labeled anomalous
    pub decision_threshold: f64,
    pub scaler: FeatureScaler,
    pub forest: IsolationForest,
    /// sha256 over the serialized parameters, verified on load
    pub params_checksum: String,
}

/// Everything the checksum covers. Field order is fixed, so the JSON
/// byte stream is stable for identical parameters.
#[derive(Serialize)]
struct ChecksumPayload<'a> {
    scaler: &'a FeatureScaler,
    forest: &'a IsolationForest,
    decision_threshold: f64,
}

impl ModelState {
    pub fn new(
        feature_schema: FeatureSchema,
        contamination_rate: f64,
        training_sample_count: usize,
        decision_threshold: f64,
        scaler: FeatureScaler,
        forest: IsolationForest,
    ) -> EngineResult<Self> {
        let trained_at = Utc::now();
        let checksum = compute_checksum(&scaler, &forest, decision_threshold)?;
        Ok(Self {
            state_id: uuid::Uuid::new_v4().to_string(),
            version_id: next_version_id(trained_at),
            trained_at,
            feature_schema,
            contamination_rate,
            training_sample_count,
            decision_threshold,
            scaler,
            forest,
            params_checksum: checksum,
        })
    }

    /// Age of this state in seconds.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.trained_at).num_seconds()
    }

    /// Recompute the parameter checksum and compare with the stored one.
    pub fn verify_checksum(&self) -> EngineResult<()> {
        let actual = compute_checksum(&self.scaler, &self.forest, self.decision_threshold)?;
        if actual != self.params_checksum {
            return Err(EngineError::Storage(format!(
                "model parameter checksum mismatch for {} (expected {}, got {})",
                self.version_id, self.params_checksum, actual
            )));
        }
        Ok(())
    }
}

fn compute_checksum(
    scaler: &FeatureScaler,
    forest: &IsolationForest,
    decision_threshold: f64,
) -> EngineResult<String> {
    let payload = ChecksumPayload { scaler, forest, decision_threshold };
    let bytes = serde_json::to_vec(&payload)?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(digest))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ids_are_unique_and_monotonic() {
        let now = Utc::now();
        let a = next_version_id(now);
        let b = next_version_id(now);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_version_id_format() {
        let ts = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 4, 6, 15, 0).unwrap();
        let id = next_version_id(ts);
        assert!(id.starts_with("v20240304_061500_"));
    }
}
