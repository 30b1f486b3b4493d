//! Fuel Records & Record Store Seam
//!
//! `FuelRecord` is the immutable input row; the `RecordStore` trait is
//! the boundary to the persistence layer. The engine only ever reads
//! timestamp-ordered records and writes back (record-id, flag, score)
//! triples. An in-memory store ships for tests and demos.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};

// ============================================================================
// FUEL RECORD
// ============================================================================

/// One fuel log row. Immutable once created; owned by the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelRecord {
    pub id: i64,
    pub vehicle_id: String,
    pub timestamp: DateTime<Utc>,
    pub distance_km: f64,
    pub fuel_used: f64,
    pub cost: Option<f64>,
}

impl FuelRecord {
    /// Derived efficiency in km/L. `None` when fuel_used is zero —
    /// degenerate records never get a silent zero efficiency.
    pub fn efficiency(&self) -> Option<f64> {
        if self.fuel_used > 0.0 {
            Some(self.distance_km / self.fuel_used)
        } else {
            None
        }
    }

    /// True when efficiency is undefined for this record.
    pub fn is_degenerate(&self) -> bool {
        self.fuel_used <= 0.0
    }

    /// Boundary validation: numeric fields must be finite and
    /// non-negative. Zero fuel is allowed (degenerate, handled
    /// downstream); negative values and NaN/Inf are rejected outright.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [("distance_km", self.distance_km), ("fuel_used", self.fuel_used)] {
            if !value.is_finite() {
                return Err(EngineError::InvalidRecord {
                    record_id: self.id,
                    reason: format!("{} is not finite", name),
                });
            }
            if value < 0.0 {
                return Err(EngineError::InvalidRecord {
                    record_id: self.id,
                    reason: format!("{} must be non-negative, got {}", name, value),
                });
            }
        }
        if let Some(cost) = self.cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(EngineError::InvalidRecord {
                    record_id: self.id,
                    reason: format!("cost must be a non-negative finite number, got {}", cost),
                });
            }
        }
        Ok(())
    }
}

/// Scoring output for one record. No identity beyond the record it annotates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub record_id: i64,
    pub vehicle_id: String,
    /// Lower = more anomalous; negative values are past the decision boundary.
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

// ============================================================================
// RECORD STORE TRAIT
// ============================================================================

/// Boundary to the persistence layer. Implementations must return
/// records sorted ascending by timestamp; the engine checks and fails
/// rather than re-sorting.
pub trait RecordStore: Send + Sync {
    /// Fetch records, optionally filtered by vehicle and inclusive time bounds.
    fn list_records(
        &self,
        vehicle_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<FuelRecord>>;

    /// Persist computed anomaly flags/scores back.
    fn write_anomaly_results(&self, results: &[AnomalyResult]) -> EngineResult<()>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory record store. Keeps records sorted on insert and retains
/// written anomaly results so tests can assert on the write-back path.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<FuelRecord>>,
    results: RwLock<HashMap<i64, AnomalyResult>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, validating at the boundary and keeping the
    /// store sorted by timestamp.
    pub fn insert(&self, record: FuelRecord) -> EngineResult<()> {
        record.validate()?;
        let mut records = self.records.write();
        let pos = records
            .binary_search_by_key(&record.timestamp, |r| r.timestamp)
            .unwrap_or_else(|p| p);
        records.insert(pos, record);
        Ok(())
    }

    pub fn insert_all(&self, records: Vec<FuelRecord>) -> EngineResult<()> {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Stored anomaly result for a record, if scoring has written one.
    pub fn result_for(&self, record_id: i64) -> Option<AnomalyResult> {
        self.results.read().get(&record_id).cloned()
    }
}

impl RecordStore for MemoryRecordStore {
    fn list_records(
        &self,
        vehicle_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<FuelRecord>> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|r| vehicle_id.map_or(true, |v| r.vehicle_id == v))
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .filter(|r| until.map_or(true, |u| r.timestamp <= u))
            .cloned()
            .collect())
    }

    fn write_anomaly_results(&self, results: &[AnomalyResult]) -> EngineResult<()> {
        let mut stored = self.results.write();
        for result in results {
            stored.insert(result.record_id, result.clone());
        }
        log::debug!("persisted {} anomaly results", results.len());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_efficiency_exact_ratio() {
        let r = record(1, "V001", 0, 120.0, 10.0);
        assert_eq!(r.efficiency(), Some(12.0));
    }

    #[test]
    fn test_zero_fuel_is_degenerate_not_zero() {
        let r = record(1, "V001", 0, 50.0, 0.0);
        assert!(r.is_degenerate());
        assert_eq!(r.efficiency(), None);
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut r = record(1, "V001", 0, 50.0, 5.0);
        r.distance_km = f64::NAN;
        assert!(r.validate().is_err());

        let mut r = record(2, "V001", 0, 50.0, 5.0);
        r.fuel_used = f64::INFINITY;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative() {
        let mut r = record(1, "V001", 0, 50.0, 5.0);
        r.distance_km = -1.0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_store_returns_sorted_and_filters_inclusive() {
        let store = MemoryRecordStore::new();
        store.insert(record(2, "V001", 5, 60.0, 6.0)).unwrap();
        store.insert(record(1, "V001", 0, 50.0, 5.0)).unwrap();
        store.insert(record(3, "V002", 2, 70.0, 7.0)).unwrap();

        let all = store.list_records(None, None, None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        // Inclusive bounds: since == first timestamp keeps it
        let first_ts = all[0].timestamp;
        let bounded = store.list_records(None, Some(first_ts), Some(first_ts)).unwrap();
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].id, 1);

        let v2 = store.list_records(Some("V002"), None, None).unwrap();
        assert_eq!(v2.len(), 1);
    }

    #[test]
    fn test_write_back_round_trip() {
        let store = MemoryRecordStore::new();
        store
            .write_anomaly_results(&[AnomalyResult {
                record_id: 7,
                vehicle_id: "V001".into(),
                anomaly_score: -0.12,
                is_anomaly: true,
            }])
            .unwrap();
        let stored = store.result_for(7).unwrap();
        assert!(stored.is_anomaly);
        assert_eq!(stored.anomaly_score, -0.12);
    }
}
