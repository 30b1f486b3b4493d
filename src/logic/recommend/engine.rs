//! Recommendation Engine
//!
//! Pure function of aggregator output + anomaly results. Rules live in
//! ONE explicit ordered list and are evaluated in that order, so when a
//! vehicle trips several rules its advisories always come out in the
//! same sequence:
//!
//! 1. FuelLeakPattern   (CRITICAL)
//! 2. AnomalyCluster    (HIGH, CRITICAL at 2x the rate threshold)
//! 3. EfficiencyDecline (MEDIUM, HIGH past the high-drop threshold)
//! 4. ErraticConsumption(MEDIUM)
//! 5. FleetAnomalyRate  (MEDIUM, fleet-wide, evaluated after vehicles)
//! 6. SparseHistory     (LOW; replaces rules 1-4 for short histories)

use std::collections::HashMap;

use super::rules::RuleThresholds;
use super::types::{Recommendation, RecommendationType, Severity, Subject};
use crate::logic::records::AnomalyResult;
use crate::logic::stats::{FleetStats, VehicleStats};

/// L/100km from km/L. 0.0 when efficiency is unknown.
fn consumption_per_100km(efficiency: f64) -> f64 {
    if efficiency > 0.0 {
        100.0 / efficiency
    } else {
        0.0
    }
}

type VehicleRule = fn(&VehicleStats, Option<f64>, &RuleThresholds) -> Option<Recommendation>;

/// Per-vehicle rules, in their fixed evaluation order.
const VEHICLE_RULES: [VehicleRule; 4] = [
    rule_fuel_leak,
    rule_anomaly_cluster,
    rule_efficiency_decline,
    rule_erratic_consumption,
];

/// Evaluate every rule against one aggregation pass.
///
/// Same inputs always produce the same advisory set, in the same order:
/// vehicles in the order given (the aggregator emits them sorted by
/// id), rules per vehicle in list order, fleet-wide advisories last.
pub fn evaluate(
    fleet: &FleetStats,
    vehicles: &[VehicleStats],
    results: &[AnomalyResult],
    thresholds: &RuleThresholds,
) -> Vec<Recommendation> {
    let mut worst_scores: HashMap<&str, f64> = HashMap::new();
    for result in results {
        worst_scores
            .entry(result.vehicle_id.as_str())
            .and_modify(|w| *w = w.min(result.anomaly_score))
            .or_insert(result.anomaly_score);
    }

    let mut out = Vec::new();

    for vehicle in vehicles {
        if vehicle.trip_count < thresholds.min_records_for_rules {
            out.push(sparse_history(vehicle, thresholds));
            continue;
        }

        let worst = worst_scores.get(vehicle.vehicle_id.as_str()).copied();
        for rule in VEHICLE_RULES {
            if let Some(recommendation) = rule(vehicle, worst, thresholds) {
                out.push(recommendation);
            }
        }
    }

    if let Some(recommendation) = rule_fleet_anomaly_rate(fleet, thresholds) {
        out.push(recommendation);
    }

    log::debug!("rule engine produced {} recommendations", out.len());
    out
}

// ============================================================================
// RULES
// ============================================================================

fn rule_fuel_leak(
    vehicle: &VehicleStats,
    _worst_score: Option<f64>,
    thresholds: &RuleThresholds,
) -> Option<Recommendation> {
    if vehicle.baseline_efficiency <= 0.0 || vehicle.recent_efficiency <= 0.0 {
        return None;
    }
    let baseline = consumption_per_100km(vehicle.baseline_efficiency);
    let recent = consumption_per_100km(vehicle.recent_efficiency);
    let increase = recent - baseline;
    if increase < thresholds.fuel_leak_l_per_100km {
        return None;
    }

    Some(Recommendation {
        rule: RecommendationType::FuelLeakPattern,
        severity: Severity::Critical,
        subject: Subject::Vehicle(vehicle.vehicle_id.clone()),
        message: format!(
            "Vehicle {} consumption rose by {:.1} L/100km (from {:.1} to {:.1})",
            vehicle.vehicle_id, increase, baseline, recent
        ),
        suggested_action: "Take the vehicle out of service and inspect the fuel system for leaks"
            .to_string(),
        details: serde_json::json!({
            "baseline_l_per_100km": baseline,
            "recent_l_per_100km": recent,
            "increase_l_per_100km": increase,
        }),
    })
}

fn rule_anomaly_cluster(
    vehicle: &VehicleStats,
    worst_score: Option<f64>,
    thresholds: &RuleThresholds,
) -> Option<Recommendation> {
    if vehicle.anomaly_rate < thresholds.anomaly_rate_threshold {
        return None;
    }
    let severity = if vehicle.anomaly_rate >= 2.0 * thresholds.anomaly_rate_threshold {
        Severity::Critical
    } else {
        Severity::High
    };

    Some(Recommendation {
        rule: RecommendationType::AnomalyCluster,
        severity,
        subject: Subject::Vehicle(vehicle.vehicle_id.clone()),
        message: format!(
            "Vehicle {} has {} of {} records flagged anomalous ({:.0}%)",
            vehicle.vehicle_id,
            vehicle.anomaly_count,
            vehicle.trip_count,
            vehicle.anomaly_rate * 100.0
        ),
        suggested_action: "Review the flagged trips and schedule a diagnostic check".to_string(),
        details: serde_json::json!({
            "anomaly_count": vehicle.anomaly_count,
            "anomaly_rate": vehicle.anomaly_rate,
            "worst_anomaly_score": worst_score,
        }),
    })
}

fn rule_efficiency_decline(
    vehicle: &VehicleStats,
    _worst_score: Option<f64>,
    thresholds: &RuleThresholds,
) -> Option<Recommendation> {
    if vehicle.baseline_efficiency <= 0.0 {
        return None;
    }
    let drop_pct = (vehicle.baseline_efficiency - vehicle.recent_efficiency)
        / vehicle.baseline_efficiency
        * 100.0;
    if drop_pct < thresholds.efficiency_drop_pct {
        return None;
    }
    let severity = if drop_pct >= thresholds.efficiency_drop_high_pct {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(Recommendation {
        rule: RecommendationType::EfficiencyDecline,
        severity,
        subject: Subject::Vehicle(vehicle.vehicle_id.clone()),
        message: format!(
            "Vehicle {} efficiency dropped by {:.1}% (from {:.2} to {:.2} km/L)",
            vehicle.vehicle_id, drop_pct, vehicle.baseline_efficiency, vehicle.recent_efficiency
        ),
        suggested_action:
            "Check tire pressure, air filter and driving patterns; book maintenance if the trend holds"
                .to_string(),
        details: serde_json::json!({
            "drop_percent": drop_pct,
            "baseline_efficiency": vehicle.baseline_efficiency,
            "recent_efficiency": vehicle.recent_efficiency,
        }),
    })
}

fn rule_erratic_consumption(
    vehicle: &VehicleStats,
    _worst_score: Option<f64>,
    thresholds: &RuleThresholds,
) -> Option<Recommendation> {
    if vehicle.avg_efficiency <= 0.0 {
        return None;
    }
    let cv = vehicle.efficiency_std / vehicle.avg_efficiency;
    if cv < thresholds.efficiency_cv_threshold {
        return None;
    }

    Some(Recommendation {
        rule: RecommendationType::ErraticConsumption,
        severity: Severity::Medium,
        subject: Subject::Vehicle(vehicle.vehicle_id.clone()),
        message: format!(
            "Vehicle {} shows erratic consumption (efficiency variation {:.0}% of average)",
            vehicle.vehicle_id,
            cv * 100.0
        ),
        suggested_action: "Compare routes and drivers across trips; erratic figures often mean inconsistent usage"
            .to_string(),
        details: serde_json::json!({
            "coefficient_of_variation": cv,
            "efficiency_std": vehicle.efficiency_std,
            "avg_efficiency": vehicle.avg_efficiency,
        }),
    })
}

fn rule_fleet_anomaly_rate(
    fleet: &FleetStats,
    thresholds: &RuleThresholds,
) -> Option<Recommendation> {
    if fleet.total_records < thresholds.min_records_for_rules
        || fleet.anomaly_rate < thresholds.fleet_anomaly_rate_threshold
    {
        return None;
    }

    Some(Recommendation {
        rule: RecommendationType::FleetAnomalyRate,
        severity: Severity::Medium,
        subject: Subject::Fleet,
        message: format!(
            "{:.0}% of fleet records in this window are anomalous ({} of {})",
            fleet.anomaly_rate * 100.0,
            fleet.anomaly_count,
            fleet.total_records
        ),
        suggested_action: "Widen the analysis window and check for fuel price, route or season changes affecting the whole fleet"
            .to_string(),
        details: serde_json::json!({
            "anomaly_rate": fleet.anomaly_rate,
            "anomaly_count": fleet.anomaly_count,
            "total_records": fleet.total_records,
        }),
    })
}

fn sparse_history(vehicle: &VehicleStats, thresholds: &RuleThresholds) -> Recommendation {
    Recommendation {
        rule: RecommendationType::SparseHistory,
        severity: Severity::Low,
        subject: Subject::Vehicle(vehicle.vehicle_id.clone()),
        message: format!(
            "Vehicle {} has only {} records; advisories need at least {}",
            vehicle.vehicle_id, vehicle.trip_count, thresholds.min_records_for_rules
        ),
        suggested_action: "Keep logging trips; analysis resumes once enough history exists"
            .to_string(),
        details: serde_json::json!({
            "trip_count": vehicle.trip_count,
            "required": thresholds.min_records_for_rules,
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::stats::TimeWindow;

    fn vehicle(id: &str) -> VehicleStats {
        VehicleStats {
            vehicle_id: id.to_string(),
            trip_count: 12,
            total_km: 1200.0,
            total_fuel: 120.0,
            avg_efficiency: 10.0,
            total_cost: 0.0,
            efficiency_min: 9.0,
            efficiency_max: 11.0,
            efficiency_std: 0.5,
            recent_efficiency: 10.0,
            baseline_efficiency: 10.0,
            anomaly_count: 0,
            anomaly_rate: 0.0,
            first_record: None,
            last_record: None,
        }
    }

    fn fleet(records: usize, anomaly_rate: f64) -> FleetStats {
        let mut f = FleetStats::empty(TimeWindow::all());
        f.total_records = records;
        f.anomaly_count = (records as f64 * anomaly_rate) as usize;
        f.anomaly_rate = anomaly_rate;
        f
    }

    #[test]
    fn test_healthy_vehicle_yields_nothing() {
        let out = evaluate(&fleet(12, 0.0), &[vehicle("V001")], &[], &RuleThresholds::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_fuel_leak_is_critical() {
        let mut v = vehicle("V001");
        // 10 km/L baseline (10 L/100km) -> 5 km/L recent (20 L/100km)
        v.recent_efficiency = 5.0;
        let out = evaluate(&fleet(12, 0.0), &[v], &[], &RuleThresholds::default());

        assert!(out.iter().any(|r| r.rule == RecommendationType::FuelLeakPattern
            && r.severity == Severity::Critical));
    }

    #[test]
    fn test_rule_order_is_stable_for_multiple_matches() {
        let mut v = vehicle("V001");
        // Leak (critical) AND decline AND erratic all true at once
        v.recent_efficiency = 5.0;
        v.efficiency_std = 4.0;
        let out = evaluate(&fleet(12, 0.0), &[v], &[], &RuleThresholds::default());

        let rules: Vec<_> = out.iter().map(|r| r.rule).collect();
        assert_eq!(
            rules,
            vec![
                RecommendationType::FuelLeakPattern,
                RecommendationType::EfficiencyDecline,
                RecommendationType::ErraticConsumption,
            ]
        );
    }

    #[test]
    fn test_anomaly_cluster_escalates_to_critical() {
        let mut v = vehicle("V001");
        v.anomaly_count = 4;
        v.anomaly_rate = 4.0 / 12.0;
        let out = evaluate(&fleet(12, 0.0), &[v.clone()], &[], &RuleThresholds::default());
        assert!(out.iter().any(|r| r.rule == RecommendationType::AnomalyCluster
            && r.severity == Severity::High));

        v.anomaly_count = 7;
        v.anomaly_rate = 7.0 / 12.0; // >= 2 * 0.25
        let out = evaluate(&fleet(12, 0.0), &[v], &[], &RuleThresholds::default());
        assert!(out.iter().any(|r| r.rule == RecommendationType::AnomalyCluster
            && r.severity == Severity::Critical));
    }

    #[test]
    fn test_decline_severity_tiers() {
        let mut v = vehicle("V001");
        v.recent_efficiency = 7.5; // 25% drop
        let out = evaluate(&fleet(12, 0.0), &[v.clone()], &[], &RuleThresholds::default());
        assert!(out.iter().any(|r| r.rule == RecommendationType::EfficiencyDecline
            && r.severity == Severity::Medium));

        v.recent_efficiency = 6.5; // 35% drop
        let out = evaluate(&fleet(12, 0.0), &[v], &[], &RuleThresholds::default());
        assert!(out.iter().any(|r| r.rule == RecommendationType::EfficiencyDecline
            && r.severity == Severity::High));
    }

    #[test]
    fn test_sparse_history_suppresses_other_rules() {
        let mut v = vehicle("V001");
        v.trip_count = 3;
        v.recent_efficiency = 5.0; // would be a leak with enough history
        let out = evaluate(&fleet(3, 0.0), &[v], &[], &RuleThresholds::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rule, RecommendationType::SparseHistory);
        assert_eq!(out[0].severity, Severity::Low);
    }

    #[test]
    fn test_fleet_rule_comes_last() {
        let mut v = vehicle("V001");
        v.anomaly_count = 4;
        v.anomaly_rate = 4.0 / 12.0;
        let out = evaluate(&fleet(40, 0.2), &[v], &[], &RuleThresholds::default());

        assert!(out.len() >= 2);
        let last = out.last().unwrap();
        assert_eq!(last.rule, RecommendationType::FleetAnomalyRate);
        assert_eq!(last.subject, Subject::Fleet);
    }

    #[test]
    fn test_determinism_same_inputs_same_output() {
        let mut v = vehicle("V001");
        v.recent_efficiency = 5.0;
        let vehicles = vec![v];
        let f = fleet(40, 0.2);
        let a = evaluate(&f, &vehicles, &[], &RuleThresholds::default());
        let b = evaluate(&f, &vehicles, &[], &RuleThresholds::default());

        let sig = |rs: &[Recommendation]| {
            rs.iter().map(|r| (r.rule, r.severity, r.message.clone())).collect::<Vec<_>>()
        };
        assert_eq!(sig(&a), sig(&b));
    }

    #[test]
    fn test_worst_score_lands_in_details() {
        let mut v = vehicle("V001");
        v.anomaly_count = 4;
        v.anomaly_rate = 4.0 / 12.0;
        let results = vec![
            AnomalyResult { record_id: 1, vehicle_id: "V001".into(), anomaly_score: -0.05, is_anomaly: true },
            AnomalyResult { record_id: 2, vehicle_id: "V001".into(), anomaly_score: -0.21, is_anomaly: true },
        ];
        let out = evaluate(&fleet(12, 0.0), &[v], &results, &RuleThresholds::default());
        let cluster = out
            .iter()
            .find(|r| r.rule == RecommendationType::AnomalyCluster)
            .unwrap();
        assert_eq!(cluster.details["worst_anomaly_score"], -0.21);
    }
}
