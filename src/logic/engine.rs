//! Analytics Engine Facade
//!
//! The surface the API layer calls: train, score, statistics,
//! recommendations, model status. Wires the record store seam to the
//! feature engineer, lifecycle manager, aggregator and rule engine.
//!
//! Scoring always engineers features from the store's full history so
//! rolling windows and the fleet index have real context, then narrows
//! the output to the requested vehicle/window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::EngineResult;
use crate::logic::cancel::CancelToken;
use crate::logic::config::{validate_contamination, EngineConfig};
use crate::logic::features::FeatureEngineer;
use crate::logic::lifecycle::{LifecycleManager, LifecyclePhase, ModelStatusReport};
use crate::logic::recommend::{self, Recommendation, RuleThresholds};
use crate::logic::records::{AnomalyResult, FuelRecord, RecordStore};
use crate::logic::stats::{self, FleetStats, TimeWindow, VehicleStats};

/// What the API layer gets back from a training request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub version_id: String,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
    pub contamination_rate: f64,
    pub decision_threshold: f64,
    pub anomalies_detected: usize,
    pub anomaly_rate: f64,
    /// True when this request observed a run already in flight instead
    /// of training again
    pub observed_in_flight: bool,
}

pub struct AnalyticsEngine {
    store: Arc<dyn RecordStore>,
    config: EngineConfig,
    engineer: FeatureEngineer,
    lifecycle: LifecycleManager,
    thresholds: RuleThresholds,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> EngineResult<Self> {
        Self::with_config(store, EngineConfig::default(), RuleThresholds::default())
    }

    pub fn with_config(
        store: Arc<dyn RecordStore>,
        config: EngineConfig,
        thresholds: RuleThresholds,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            engineer: FeatureEngineer::from_config(&config),
            lifecycle: LifecycleManager::new(config.clone()),
            config,
            thresholds,
        })
    }

    // ------------------------------------------------------------------
    // Training
    // ------------------------------------------------------------------

    /// Train a new model over the store's full history and make it
    /// current. Training labels are written back through the store.
    pub fn train(
        &self,
        contamination: Option<f64>,
        cancel: Option<&CancelToken>,
    ) -> EngineResult<TrainingSummary> {
        let contamination = contamination.unwrap_or(self.config.contamination);
        validate_contamination(contamination)?;

        let records = self.store.list_records(None, None, None)?;
        let vectors = self.engineer.engineer(&records)?;

        let default_token = CancelToken::new();
        let token = cancel.unwrap_or(&default_token);
        let outcome = self.lifecycle.train(&vectors, contamination, token)?;

        if !outcome.observed_in_flight {
            self.store.write_anomaly_results(&outcome.training_results)?;
        }

        let anomalies_detected =
            outcome.training_results.iter().filter(|r| r.is_anomaly).count();
        let state = &outcome.state;
        Ok(TrainingSummary {
            version_id: state.version_id.clone(),
            trained_at: state.trained_at,
            sample_count: state.training_sample_count,
            contamination_rate: state.contamination_rate,
            decision_threshold: state.decision_threshold,
            anomalies_detected,
            anomaly_rate: if state.training_sample_count > 0 {
                anomalies_detected as f64 / state.training_sample_count as f64
            } else {
                0.0
            },
            observed_in_flight: outcome.observed_in_flight,
        })
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    /// Score records against the current model, persist the results and
    /// return the ones inside the requested scope.
    pub fn score(
        &self,
        vehicle_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<AnomalyResult>> {
        let state = self.lifecycle.scoring_state()?;

        let records = self.store.list_records(None, None, None)?;
        let vectors = self.engineer.engineer(&records)?;
        let results = crate::logic::model::score(&vectors, &state)?;

        let window = TimeWindow::new(since, until);
        let timestamps: HashMap<i64, DateTime<Utc>> =
            records.iter().map(|r| (r.id, r.timestamp)).collect();

        let scoped: Vec<AnomalyResult> = results
            .into_iter()
            .filter(|r| vehicle_id.map_or(true, |v| r.vehicle_id == v))
            .filter(|r| timestamps.get(&r.record_id).map_or(false, |ts| window.contains(*ts)))
            .collect();

        self.store.write_anomaly_results(&scoped)?;
        log::info!(
            "scored {} records against model {}",
            scoped.len(),
            state.version_id
        );
        Ok(scoped)
    }

    // ------------------------------------------------------------------
    // Statistics & recommendations
    // ------------------------------------------------------------------

    /// Aggregate KPIs over a window. Anomaly columns are live: when a
    /// model is current the window is re-scored (a pure computation);
    /// without one the counts are simply zero.
    pub fn get_statistics(
        &self,
        vehicle_id: Option<&str>,
        window: TimeWindow,
    ) -> EngineResult<(FleetStats, Vec<VehicleStats>)> {
        // Score over the full history so feature context does not
        // depend on the requested scope, then narrow for aggregation
        let records = self.store.list_records(None, None, None)?;
        let results = self.results_if_model_present(&records)?;

        let scoped: Vec<FuelRecord> = records
            .into_iter()
            .filter(|r| vehicle_id.map_or(true, |v| r.vehicle_id == v))
            .filter(|r| window.contains(r.timestamp))
            .collect();
        Ok(stats::aggregate(&scoped, &results, window))
    }

    pub fn get_recommendations(&self, window: TimeWindow) -> EngineResult<Vec<Recommendation>> {
        let records = self.store.list_records(None, None, None)?;
        let results = self.results_if_model_present(&records)?;

        let scoped: Vec<FuelRecord> = records
            .into_iter()
            .filter(|r| window.contains(r.timestamp))
            .collect();
        let (fleet, vehicles) = stats::aggregate(&scoped, &results, window);
        Ok(recommend::evaluate(&fleet, &vehicles, &results, &self.thresholds))
    }

    fn results_if_model_present(
        &self,
        records: &[FuelRecord],
    ) -> EngineResult<Vec<AnomalyResult>> {
        match self.lifecycle.current() {
            Some(state) => {
                let vectors = self.engineer.engineer(records)?;
                crate::logic::model::score(&vectors, &state)
            }
            None => Ok(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Status & persistence
    // ------------------------------------------------------------------

    pub fn model_status(&self) -> EngineResult<ModelStatusReport> {
        let record_count = self.store.list_records(None, None, None)?.len();
        Ok(self.lifecycle.status(Some(record_count)))
    }

    pub fn save_model(&self, path: &Path) -> EngineResult<()> {
        self.lifecycle.save(path)
    }

    pub fn load_model(&self, path: &Path) -> EngineResult<LifecyclePhase> {
        self.lifecycle.load(path)
    }
}

// ============================================================================
// TESTS
// ============================================================================
