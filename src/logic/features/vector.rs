//! Feature Vector - Core data structure for model input
//!
//! Versioned feature vector with layout validation. Ephemeral: vectors
//! are recomputed on demand from source records and never persisted.

use serde::{Deserialize, Serialize};

use super::layout::{layout_hash, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
use crate::error::{EngineError, EngineResult};

/// Versioned feature vector, one per scored FuelRecord.
///
/// Always carries the layout version + hash so consumers can detect
/// drift. Never use a raw `Vec<f64>` for features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Record this vector was derived from
    pub record_id: i64,
    pub vehicle_id: String,
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [f64; FEATURE_COUNT],
    /// Zero-fuel record: efficiency is a sentinel, and this record is
    /// excluded from neighbors' rolling statistics
    pub degenerate: bool,
}

impl FeatureVector {
    /// Create a new zeroed feature vector with current version
    pub fn new(record_id: i64, vehicle_id: &str) -> Self {
        Self {
            record_id,
            vehicle_id: vehicle_id.to_string(),
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values: [0.0; FEATURE_COUNT],
            degenerate: false,
        }
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Get feature by name
    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        super::layout::feature_index(name).and_then(|i| self.get(i))
    }

    /// Set feature by index
    pub fn set(&mut self, index: usize, value: f64) {
        if index < FEATURE_COUNT {
            self.values[index] = value;
        }
    }

    /// Set feature by name
    pub fn set_by_name(&mut self, name: &str, value: f64) -> bool {
        if let Some(index) = super::layout::feature_index(name) {
            self.set(index, value);
            true
        } else {
            false
        }
    }

    /// Get values as slice
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Validate that this vector is compatible with the current layout
    pub fn validate_layout(&self) -> EngineResult<()> {
        super::layout::validate_layout(self.version, self.layout_hash)
    }

    /// Every value must be a finite double before it crosses the model
    /// boundary. Names the offending feature so the caller can log it.
    pub fn ensure_finite(&self, stage: &'static str) -> EngineResult<()> {
        for (i, value) in self.values.iter().enumerate() {
            if !value.is_finite() {
                return Err(EngineError::InvalidNumericResult {
                    field: FEATURE_LAYOUT[i],
                    stage,
                    vehicle_id: self.vehicle_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// JSON form with named values, for debug logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "record_id": self.record_id,
            "vehicle_id": self.vehicle_id,
            "feature_version": self.version,
            "layout_hash": self.layout_hash,
            "degenerate": self.degenerate,
            "named_values": FEATURE_LAYOUT.iter()
                .zip(self.values.iter())
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<std::collections::HashMap<_, _>>(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
