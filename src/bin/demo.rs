//! Demo runner: seed a synthetic fleet, train, score, report.
//!
//! Mirrors a fleet manager's session end to end without any external
//! service: generate realistic trips for a handful of vehicles (one of
//! them misbehaving), train the anomaly model, then print statistics,
//! flagged trips and recommendations.
//!
//! Usage: `demo [record-count-per-vehicle]` (default 30)

use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use fleet_analytics_core::{
    AnalyticsEngine, FuelRecord, MemoryRecordStore, TimeWindow,
};

fn main() {
    env_logger::init();

    let per_vehicle: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let store = Arc::new(MemoryRecordStore::new());
    seed_fleet(&store, per_vehicle);

    let engine = match AnalyticsEngine::new(store) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("engine setup failed: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&engine) {
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run(engine: &AnalyticsEngine) -> fleet_analytics_core::EngineResult<()> {
    let summary = engine.train(None, None)?;
    println!(
        "trained model {} on {} records ({} anomalies, {:.1}%)",
        summary.version_id,
        summary.sample_count,
        summary.anomalies_detected,
        summary.anomaly_rate * 100.0,
    );

    let (fleet, vehicles) = engine.get_statistics(None, TimeWindow::all())?;
    println!(
        "\nfleet: {} records / {} vehicles, {:.0} km on {:.0} L ({:.2} km/L), anomaly rate {:.1}%",
        fleet.total_records,
        fleet.vehicle_count,
        fleet.total_km,
        fleet.total_fuel,
        fleet.avg_efficiency,
        fleet.anomaly_rate * 100.0,
    );
    for v in &vehicles {
        println!(
            "  {}: {} trips, {:.2} km/L (recent {:.2}), {} anomalies",
            v.vehicle_id, v.trip_count, v.avg_efficiency, v.recent_efficiency, v.anomaly_count,
        );
    }

    let results = engine.score(None, None, None)?;
    let mut flagged: Vec<_> = results.iter().filter(|r| r.is_anomaly).collect();
    flagged.sort_by(|a, b| a.anomaly_score.total_cmp(&b.anomaly_score));
    println!("\nflagged trips (worst first):");
    for r in flagged.iter().take(10) {
        println!(
            "  record {} ({}) score {:.4}",
            r.record_id, r.vehicle_id, r.anomaly_score
        );
    }

    let recommendations = engine.get_recommendations(TimeWindow::all())?;
    println!("\nrecommendations:");
    if recommendations.is_empty() {
        println!("  none - fleet looks healthy");
    }
    for rec in &recommendations {
        println!("  [{}] {}", rec.severity, rec.message);
        println!("         -> {}", rec.suggested_action);
    }

    Ok(())
}

/// Deterministic synthetic fleet: three steady vehicles and one whose
/// recent trips burn far more fuel than its history.
fn seed_fleet(store: &MemoryRecordStore, per_vehicle: usize) {
    let mut rng = StdRng::seed_from_u64(7);
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap();
    let mut id = 0;

    let profiles = [("VAN-001", 11.0), ("VAN-002", 10.2), ("TRK-001", 4.8), ("TRK-002", 5.1)];
    for (vehicle_id, base_efficiency) in profiles {
        for trip in 0..per_vehicle {
            id += 1;
            let distance = rng.gen_range(40.0..220.0);
            let mut efficiency = base_efficiency * rng.gen_range(0.92..1.08);

            // TRK-002 develops a consumption problem near the end
            let tail = per_vehicle.saturating_sub(4);
            if vehicle_id == "TRK-002" && trip >= tail {
                efficiency *= 0.55;
            }

            let fuel = distance / efficiency;
            let record = FuelRecord {
                id,
                vehicle_id: vehicle_id.to_string(),
                timestamp: start + Duration::hours(trip as i64 * 7),
                distance_km: distance,
                fuel_used: fuel,
                cost: Some(fuel * 1.65),
            };
            if let Err(err) = store.insert(record) {
                eprintln!("skipping bad demo record: {err}");
            }
        }
    }
}
