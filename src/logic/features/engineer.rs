//! Feature Engineer
//!
//! Turns an ordered batch of fuel records into one feature vector per
//! record. Rolling statistics are tracked per vehicle with the
//! cold-window policy; cross-vehicle context comes from the
//! point-in-time fleet index; ordering is checked, never fixed.

use chrono::{Datelike, Timelike};
use std::collections::HashMap;

use super::fleet::FleetIndex;
use super::rolling::RollingWindow;
use super::vector::FeatureVector;
use crate::constants::EFFICIENCY_SENTINEL;
use crate::error::{EngineError, EngineResult};
use crate::logic::config::EngineConfig;
use crate::logic::records::FuelRecord;

pub struct FeatureEngineer {
    window_size: usize,
}

impl FeatureEngineer {
    pub fn new(window_size: usize) -> Self {
        Self { window_size: window_size.max(1) }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.rolling_window)
    }

    /// Engineer one vector per record, in input order.
    ///
    /// The batch may interleave vehicles but must be sorted ascending
    /// by timestamp; a record preceding its predecessor is a caller bug
    /// surfaced as `DataOrder`, not silently re-sorted.
    pub fn engineer(&self, records: &[FuelRecord]) -> EngineResult<Vec<FeatureVector>> {
        self.check_order(records)?;
        for record in records {
            record.validate()?;
        }

        let fleet = FleetIndex::build(records);
        let mut windows: HashMap<&str, RollingWindow> = HashMap::new();
        let mut previous: HashMap<&str, &FuelRecord> = HashMap::new();
        let mut vectors = Vec::with_capacity(records.len());

        for record in records {
            let window = windows
                .entry(record.vehicle_id.as_str())
                .or_insert_with(|| RollingWindow::new(self.window_size));

            let mut vector = FeatureVector::new(record.id, &record.vehicle_id);

            let (efficiency, degenerate) = match record.efficiency() {
                Some(eff) => (eff, false),
                None => (EFFICIENCY_SENTINEL, true),
            };
            vector.degenerate = degenerate;

            // Degenerate records read the window but never enter it, so
            // a zero-fuel row cannot shift its neighbors' statistics.
            if !degenerate {
                window.push(efficiency, record.fuel_used, record.distance_km);
            }
            let stats = window.stats();

            vector.set_by_name("efficiency", efficiency);
            vector.set_by_name("fuel_used", record.fuel_used);
            vector.set_by_name("distance_km", record.distance_km);

            vector.set_by_name("hour", record.timestamp.hour() as f64);
            let dow = record.timestamp.weekday().num_days_from_monday();
            vector.set_by_name("day_of_week", dow as f64);
            vector.set_by_name("is_weekend", if dow >= 5 { 1.0 } else { 0.0 });

            vector.set_by_name("efficiency_roll_mean", stats.efficiency_mean);
            vector.set_by_name("efficiency_roll_std", stats.efficiency_std);
            vector.set_by_name("efficiency_zscore", if degenerate { 0.0 } else { stats.zscore(efficiency) });
            vector.set_by_name("fuel_used_roll_mean", stats.fuel_mean);
            vector.set_by_name("distance_roll_mean", stats.distance_mean);

            let fuel_per_km = if record.distance_km > 0.0 {
                record.fuel_used / record.distance_km
            } else {
                EFFICIENCY_SENTINEL
            };
            vector.set_by_name("fuel_per_km", fuel_per_km);

            let fleet_deviation = if degenerate {
                0.0
            } else {
                fleet.deviation_at(efficiency, record.timestamp)
            };
            vector.set_by_name("fleet_deviation", fleet_deviation);
            vector.set_by_name("trend_slope", stats.trend_slope);

            let (fuel_delta, distance_delta) = match previous.get(record.vehicle_id.as_str()) {
                Some(prev) => (
                    record.fuel_used - prev.fuel_used,
                    record.distance_km - prev.distance_km,
                ),
                None => (0.0, 0.0),
            };
            vector.set_by_name("fuel_used_delta", fuel_delta);
            vector.set_by_name("distance_delta", distance_delta);

            vector.ensure_finite("feature engineering")?;
            previous.insert(record.vehicle_id.as_str(), record);
            vectors.push(vector);
        }

        log::debug!(
            "engineered {} feature vectors across {} vehicles",
            vectors.len(),
            windows.len()
        );
        Ok(vectors)
    }

    fn check_order(&self, records: &[FuelRecord]) -> EngineResult<()> {
        for (index, pair) in records.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(EngineError::DataOrder {
                    vehicle_id: pair[1].vehicle_id.clone(),
                    index: index + 1,
                });
            }
        }
        Ok(())
    }
}
