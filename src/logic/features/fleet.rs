//! Point-in-Time Fleet Index
//!
//! Cross-vehicle context for the `fleet_deviation` feature: the mean
//! efficiency of every non-degenerate record in the fleet at or before
//! a given timestamp. Built as an explicit sorted index with prefix
//! sums so a query can never see data past its own timestamp.

use chrono::{DateTime, Utc};

use crate::logic::records::FuelRecord;

/// Sorted (timestamp → running efficiency sum) index over the fleet.
#[derive(Debug, Clone)]
pub struct FleetIndex {
    timestamps: Vec<DateTime<Utc>>,
    /// prefix_sums[i] = sum of efficiencies of entries 0..=i
    prefix_sums: Vec<f64>,
}

impl FleetIndex {
    /// Build from any set of records; degenerate records are skipped
    /// since they have no defined efficiency.
    pub fn build(records: &[FuelRecord]) -> Self {
        let mut entries: Vec<(DateTime<Utc>, f64)> = records
            .iter()
            .filter_map(|r| r.efficiency().map(|eff| (r.timestamp, eff)))
            .collect();
        entries.sort_by_key(|(ts, _)| *ts);

        let mut timestamps = Vec::with_capacity(entries.len());
        let mut prefix_sums = Vec::with_capacity(entries.len());
        let mut running = 0.0;
        for (ts, eff) in entries {
            running += eff;
            timestamps.push(ts);
            prefix_sums.push(running);
        }

        Self { timestamps, prefix_sums }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Mean efficiency of all fleet records with `timestamp <= at`.
    /// `None` when no record exists that early — callers decide the
    /// sentinel, the index never invents a value.
    pub fn mean_at(&self, at: DateTime<Utc>) -> Option<f64> {
        let count = self.timestamps.partition_point(|ts| *ts <= at);
        if count == 0 {
            return None;
        }
        Some(self.prefix_sums[count - 1] / count as f64)
    }

    /// Deviation of one efficiency value from the fleet mean at `at`.
    /// Zero when the fleet has no history yet.
    pub fn deviation_at(&self, efficiency: f64, at: DateTime<Utc>) -> f64 {
        match self.mean_at(at) {
            Some(mean) => efficiency - mean,
            None => 0.0,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
