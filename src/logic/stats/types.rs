//! Aggregate Statistics Types
//!
//! Read-only views computed on demand; never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive time window. `None` bounds are open ends.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        Self { since, until }
    }

    /// Unbounded window (all history).
    pub fn all() -> Self {
        Self::default()
    }

    /// Both boundaries are inclusive.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since.map_or(true, |s| ts >= s) && self.until.map_or(true, |u| ts <= u)
    }
}

/// Fleet-wide KPIs over one window. All efficiency figures are
/// ratio-of-sums; zero denominators yield the 0.0 sentinel, never NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetStats {
    pub window: TimeWindow,
    pub total_records: usize,
    pub vehicle_count: usize,
    pub total_km: f64,
    pub total_fuel: f64,
    /// total_km / total_fuel
    pub avg_efficiency: f64,
    pub total_cost: f64,
    pub anomaly_count: usize,
    /// Anomalous records / all records in the window. Empirical; only
    /// approximately tracks the model's contamination parameter.
    pub anomaly_rate: f64,
    pub first_record: Option<DateTime<Utc>>,
    pub last_record: Option<DateTime<Utc>>,
}

impl FleetStats {
    /// Well-defined empty stats for a window with no records.
    pub fn empty(window: TimeWindow) -> Self {
        Self {
            window,
            total_records: 0,
            vehicle_count: 0,
            total_km: 0.0,
            total_fuel: 0.0,
            avg_efficiency: 0.0,
            total_cost: 0.0,
            anomaly_count: 0,
            anomaly_rate: 0.0,
            first_record: None,
            last_record: None,
        }
    }
}

/// Per-vehicle KPIs over the same window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStats {
    pub vehicle_id: String,
    pub trip_count: usize,
    pub total_km: f64,
    pub total_fuel: f64,
    /// Ratio-of-sums, restricted to this vehicle's records
    pub avg_efficiency: f64,
    pub total_cost: f64,
    /// Distribution of per-record efficiencies (non-degenerate only)
    pub efficiency_min: f64,
    pub efficiency_max: f64,
    pub efficiency_std: f64,
    /// Ratio-of-sums over the last few records of the window
    pub recent_efficiency: f64,
    /// Ratio-of-sums over the records before the recent split (falls
    /// back to the whole history when it is too short to split)
    pub baseline_efficiency: f64,
    pub anomaly_count: usize,
    pub anomaly_rate: f64,
    pub first_record: Option<DateTime<Utc>>,
    pub last_record: Option<DateTime<Utc>>,
}
