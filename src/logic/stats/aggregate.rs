//! Statistics Aggregation
//!
//! Fleet- and vehicle-level KPIs over an inclusive time window. The one
//! rule that must never bend: efficiency aggregates are ratio-of-sums
//! (total km / total fuel), not means of per-record ratios, so short
//! trips cannot bias the figure.

use std::collections::{BTreeMap, HashMap};

use super::types::{FleetStats, TimeWindow, VehicleStats};
use crate::constants::RECENT_TRIP_COUNT;
use crate::logic::records::{AnomalyResult, FuelRecord};

/// km per litre, 0.0 sentinel when no fuel was burned.
fn safe_ratio(km: f64, fuel: f64) -> f64 {
    if fuel > 0.0 {
        km / fuel
    } else {
        0.0
    }
}

/// Aggregate a record set and its anomaly results over a window.
///
/// An empty window produces empty stats, not an error. Vehicles are
/// returned in id order so downstream rule evaluation is stable.
pub fn aggregate(
    records: &[FuelRecord],
    results: &[AnomalyResult],
    window: TimeWindow,
) -> (FleetStats, Vec<VehicleStats>) {
    let in_window: Vec<&FuelRecord> =
        records.iter().filter(|r| window.contains(r.timestamp)).collect();

    if in_window.is_empty() {
        return (FleetStats::empty(window), Vec::new());
    }

    let flagged: HashMap<i64, bool> =
        results.iter().map(|r| (r.record_id, r.is_anomaly)).collect();

    // BTreeMap keeps vehicle output deterministic
    let mut per_vehicle: BTreeMap<&str, Vec<&FuelRecord>> = BTreeMap::new();
    for &record in &in_window {
        per_vehicle.entry(record.vehicle_id.as_str()).or_default().push(record);
    }

    let mut fleet = FleetStats::empty(window);
    fleet.total_records = in_window.len();
    fleet.vehicle_count = per_vehicle.len();

    let mut vehicles = Vec::with_capacity(per_vehicle.len());
    for (vehicle_id, vehicle_records) in &per_vehicle {
        let stats = vehicle_stats(vehicle_id, vehicle_records, &flagged);

        fleet.total_km += stats.total_km;
        fleet.total_fuel += stats.total_fuel;
        fleet.total_cost += stats.total_cost;
        fleet.anomaly_count += stats.anomaly_count;

        vehicles.push(stats);
    }

    fleet.avg_efficiency = safe_ratio(fleet.total_km, fleet.total_fuel);
    fleet.anomaly_rate = fleet.anomaly_count as f64 / fleet.total_records as f64;
    fleet.first_record = in_window.iter().map(|r| r.timestamp).min();
    fleet.last_record = in_window.iter().map(|r| r.timestamp).max();

    (fleet, vehicles)
}

fn vehicle_stats(
    vehicle_id: &str,
    records: &[&FuelRecord],
    flagged: &HashMap<i64, bool>,
) -> VehicleStats {
    let total_km: f64 = records.iter().map(|r| r.distance_km).sum();
    let total_fuel: f64 = records.iter().map(|r| r.fuel_used).sum();
    let total_cost: f64 = records.iter().filter_map(|r| r.cost).sum();
    let anomaly_count = records
        .iter()
        .filter(|r| flagged.get(&r.id).copied().unwrap_or(false))
        .count();

    // Per-record efficiency distribution, non-degenerate records only
    let efficiencies: Vec<f64> = records.iter().filter_map(|r| r.efficiency()).collect();
    let (eff_min, eff_max, eff_std) = if efficiencies.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let min = efficiencies.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = efficiencies.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = efficiencies.iter().sum::<f64>() / efficiencies.len() as f64;
        let var = efficiencies.iter().map(|e| (e - mean).powi(2)).sum::<f64>()
            / efficiencies.len() as f64;
        (min, max, var.sqrt())
    };

    // Recent = tail of the window; baseline = what came before it, or
    // the whole history when too short to split meaningfully
    let recent_start = records.len().saturating_sub(RECENT_TRIP_COUNT);
    let recent = &records[recent_start..];
    let baseline: &[&FuelRecord] = if records.len() > 2 * RECENT_TRIP_COUNT {
        &records[..recent_start]
    } else {
        records
    };

    VehicleStats {
        vehicle_id: vehicle_id.to_string(),
        trip_count: records.len(),
        total_km,
        total_fuel,
        avg_efficiency: safe_ratio(total_km, total_fuel),
        total_cost,
        efficiency_min: eff_min,
        efficiency_max: eff_max,
        efficiency_std: eff_std,
        recent_efficiency: ratio_of(recent),
        baseline_efficiency: ratio_of(baseline),
        anomaly_count,
        anomaly_rate: anomaly_count as f64 / records.len() as f64,
        first_record: records.iter().map(|r| r.timestamp).min(),
        last_record: records.iter().map(|r| r.timestamp).max(),
    }
}

fn ratio_of(records: &[&FuelRecord]) -> f64 {
    let km: f64 = records.iter().map(|r| r.distance_km).sum();
    let fuel: f64 = records.iter().map(|r| r.fuel_used).sum();
    safe_ratio(km, fuel)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::records::test_support::record;

    #[test]
    fn test_ratio_of_sums_not_mean_of_ratios() {
        // (100 km, 10 L) and (50 km, 10 L): 150/20 = 7.5, not (10+5)/2
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 50.0, 10.0),
        ];
        let (fleet, vehicles) = aggregate(&records, &[], TimeWindow::all());

        assert!((fleet.avg_efficiency - 7.5).abs() < 1e-12);
        assert!((vehicles[0].avg_efficiency - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window_is_not_an_error() {
        let records = vec![record(1, "V001", 0, 100.0, 10.0)];
        let far_future = records[0].timestamp + chrono::Duration::days(100);
        let window = TimeWindow::new(Some(far_future), None);

        let (fleet, vehicles) = aggregate(&records, &[], window);
        assert_eq!(fleet.total_records, 0);
        assert_eq!(fleet.avg_efficiency, 0.0);
        assert!(vehicles.is_empty());
    }

    #[test]
    fn test_window_boundaries_inclusive() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 100.0, 10.0),
            record(3, "V001", 2, 100.0, 10.0),
        ];
        let window = TimeWindow::new(Some(records[0].timestamp), Some(records[2].timestamp));
        let (fleet, _) = aggregate(&records, &[], window);
        assert_eq!(fleet.total_records, 3);
    }

    #[test]
    fn test_anomaly_rate_over_window_records() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 100.0, 10.0),
            record(3, "V001", 2, 100.0, 10.0),
            record(4, "V001", 3, 100.0, 10.0),
        ];
        let results = vec![
            AnomalyResult { record_id: 1, vehicle_id: "V001".into(), anomaly_score: -0.1, is_anomaly: true },
            AnomalyResult { record_id: 2, vehicle_id: "V001".into(), anomaly_score: 0.1, is_anomaly: false },
        ];
        let (fleet, vehicles) = aggregate(&records, &results, TimeWindow::all());
        assert_eq!(fleet.anomaly_count, 1);
        assert!((fleet.anomaly_rate - 0.25).abs() < 1e-12);
        assert!((vehicles[0].anomaly_rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_records_count_but_skip_efficiency_distribution() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 50.0, 0.0), // degenerate
        ];
        let (fleet, vehicles) = aggregate(&records, &[], TimeWindow::all());

        assert_eq!(fleet.total_records, 2);
        // Ratio-of-sums still counts the distance of the zero-fuel trip
        assert!((fleet.avg_efficiency - 15.0).abs() < 1e-12);
        // Distribution fields ignore the undefined efficiency
        assert_eq!(vehicles[0].efficiency_min, 10.0);
        assert_eq!(vehicles[0].efficiency_max, 10.0);
    }

    #[test]
    fn test_vehicles_sorted_by_id() {
        let records = vec![
            record(1, "V010", 0, 100.0, 10.0),
            record(2, "V002", 1, 100.0, 10.0),
        ];
        let (_, vehicles) = aggregate(&records, &[], TimeWindow::all());
        assert_eq!(vehicles[0].vehicle_id, "V002");
        assert_eq!(vehicles[1].vehicle_id, "V010");
    }

    #[test]
    fn test_recent_baseline_split() {
        // 12 records: 7 baseline at 10 km/L, then 5 recent at 5 km/L
        let mut records = Vec::new();
        for i in 0..7 {
            records.push(record(i + 1, "V001", i, 100.0, 10.0));
        }
        for i in 7..12 {
            records.push(record(i + 1, "V001", i, 50.0, 10.0));
        }
        let (_, vehicles) = aggregate(&records, &[], TimeWindow::all());
        let v = &vehicles[0];
        assert!((v.baseline_efficiency - 10.0).abs() < 1e-12);
        assert!((v.recent_efficiency - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_history_uses_whole_series_as_baseline() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 80.0, 10.0),
        ];
        let (_, vehicles) = aggregate(&records, &[], TimeWindow::all());
        let v = &vehicles[0];
        assert!((v.baseline_efficiency - 9.0).abs() < 1e-12);
        // Recent is the (short) tail, here the whole series too
        assert!((v.recent_efficiency - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_cost_totals_sum_present_costs_only() {
        let mut a = record(1, "V001", 0, 100.0, 10.0);
        a.cost = Some(42.0);
        let b = record(2, "V001", 1, 100.0, 10.0);
        let (fleet, _) = aggregate(&[a, b], &[], TimeWindow::all());
        assert_eq!(fleet.total_cost, 42.0);
    }
}
