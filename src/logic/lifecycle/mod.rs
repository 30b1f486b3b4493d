//! Model Lifecycle Manager
//!
//! Owns the single mutable resource in the engine: the current
//! ModelState. State machine ABSENT → TRAINING → TRAINED → STALE →
//! TRAINING → … with two hard invariants:
//!
//! - at most one training run in flight; a second concurrent request
//!   observes the in-flight run's result instead of duplicating it
//! - the current model is swapped atomically; readers clone an `Arc`
//!   and can never see a half-written version
//!
//! Training failure or cancellation leaves the previous state active.

pub mod storage;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::logic::cancel::CancelToken;
use crate::logic::config::EngineConfig;
use crate::logic::features::{FeatureSchema, FeatureVector};
use crate::logic::model::{self, ModelState};
use crate::logic::records::AnomalyResult;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Absent,
    Training,
    Trained,
    Stale,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LifecyclePhase::Absent => "absent",
            LifecyclePhase::Training => "training",
            LifecyclePhase::Trained => "trained",
            LifecyclePhase::Stale => "stale",
        };
        f.write_str(label)
    }
}

/// Status summary for the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatusReport {
    pub status: LifecyclePhase,
    pub version_id: Option<String>,
    pub trained_at: Option<DateTime<Utc>>,
    pub sample_count: Option<usize>,
    pub contamination_rate: Option<f64>,
}

/// Result of a train request.
#[derive(Debug)]
pub struct TrainOutcome {
    pub state: Arc<ModelState>,
    /// Labels for the training set; empty when this caller observed a
    /// run that finished while it waited (the winner already wrote them)
    pub training_results: Vec<AnomalyResult>,
    /// True when no new training ran for this caller
    pub observed_in_flight: bool,
}

// ============================================================================
// MANAGER
// ============================================================================

pub struct LifecycleManager {
    config: EngineConfig,
    current: RwLock<Option<Arc<ModelState>>>,
    training_lock: Mutex<()>,
    training_in_flight: AtomicBool,
    /// Set when a persisted state was rejected for schema drift on load;
    /// status then reports stale even though nothing scoreable exists
    schema_stale: AtomicBool,
}

impl LifecycleManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
            training_lock: Mutex::new(()),
            training_in_flight: AtomicBool::new(false),
            schema_stale: AtomicBool::new(false),
        }
    }

    /// Current model, if any. Cheap: clones an Arc under a read lock.
    pub fn current(&self) -> Option<Arc<ModelState>> {
        self.current.read().clone()
    }

    fn current_version(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.version_id.clone())
    }

    /// Train a new model from engineered vectors and make it current.
    ///
    /// Serialized: a second caller blocks here, and if a new version
    /// landed while it waited, it returns that version instead of
    /// training again.
    pub fn train(
        &self,
        vectors: &[FeatureVector],
        contamination: f64,
        cancel: &CancelToken,
    ) -> EngineResult<TrainOutcome> {
        let version_before = self.current_version();
        let _guard = self.training_lock.lock();

        if self.current_version() != version_before {
            if let Some(state) = self.current() {
                log::info!(
                    "training request satisfied by in-flight run, now at {}",
                    state.version_id
                );
                return Ok(TrainOutcome {
                    state,
                    training_results: Vec::new(),
                    observed_in_flight: true,
                });
            }
        }

        self.training_in_flight.store(true, Ordering::SeqCst);
        let result = self.run_training(vectors, contamination, cancel);
        self.training_in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok((state, training_results)) => {
                // Atomic swap: scoring calls that start after this see
                // only the new version
                *self.current.write() = Some(state.clone());
                self.schema_stale.store(false, Ordering::SeqCst);
                log::info!(
                    "model {} is now current ({} samples, threshold {:.4})",
                    state.version_id,
                    state.training_sample_count,
                    state.decision_threshold,
                );
                Ok(TrainOutcome { state, training_results, observed_in_flight: false })
            }
            Err(err) => {
                log::warn!("training failed, previous model left active: {}", err);
                Err(err)
            }
        }
    }

    fn run_training(
        &self,
        vectors: &[FeatureVector],
        contamination: f64,
        cancel: &CancelToken,
    ) -> EngineResult<(Arc<ModelState>, Vec<AnomalyResult>)> {
        let outcome = model::fit(vectors, contamination, &self.config, cancel)?;
        let state = ModelState::new(
            FeatureSchema::current(),
            contamination,
            outcome.sample_count,
            outcome.decision_threshold,
            outcome.scaler,
            outcome.forest,
        )?;
        Ok((Arc::new(state), outcome.training_results))
    }

    /// The model callers may score against right now, or the error that
    /// tells them why they cannot.
    pub fn scoring_state(&self) -> EngineResult<Arc<ModelState>> {
        match self.current() {
            Some(state) => Ok(state),
            None => Err(EngineError::ModelAbsent {
                status: self.phase(None).to_string(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Staleness
    // ------------------------------------------------------------------

    /// Current lifecycle phase. `record_count` is the store's present
    /// record count, used for the growth-based staleness check when the
    /// caller has it at hand.
    pub fn phase(&self, record_count: Option<usize>) -> LifecyclePhase {
        if self.training_in_flight.load(Ordering::SeqCst) {
            return LifecyclePhase::Training;
        }
        match self.current() {
            None => {
                if self.schema_stale.load(Ordering::SeqCst) {
                    LifecyclePhase::Stale
                } else {
                    LifecyclePhase::Absent
                }
            }
            Some(state) => {
                if self.is_stale(&state, Utc::now(), record_count) {
                    LifecyclePhase::Stale
                } else {
                    LifecyclePhase::Trained
                }
            }
        }
    }

    fn is_stale(
        &self,
        state: &ModelState,
        now: DateTime<Utc>,
        record_count: Option<usize>,
    ) -> bool {
        if !state.feature_schema.is_current() {
            return true;
        }
        if state.age_secs(now) > self.config.model_ttl_secs {
            return true;
        }
        if let Some(count) = record_count {
            let grown = count as f64
                >= state.training_sample_count as f64 * self.config.stale_growth_ratio;
            if state.training_sample_count > 0 && grown {
                return true;
            }
        }
        false
    }

    pub fn status(&self, record_count: Option<usize>) -> ModelStatusReport {
        let state = self.current();
        ModelStatusReport {
            status: self.phase(record_count),
            version_id: state.as_ref().map(|s| s.version_id.clone()),
            trained_at: state.as_ref().map(|s| s.trained_at),
            sample_count: state.as_ref().map(|s| s.training_sample_count),
            contamination_rate: state.as_ref().map(|s| s.contamination_rate),
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist the current state. No-op error when nothing is trained.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        match self.current() {
            Some(state) => storage::save_state(&state, path),
            None => Err(EngineError::ModelAbsent { status: self.phase(None).to_string() }),
        }
    }

    /// Load a persisted state. A state whose schema no longer matches
    /// the live feature layout is NOT installed: the manager reports
    /// stale instead of letting callers score against it.
    pub fn load(&self, path: &Path) -> EngineResult<LifecyclePhase> {
        let state = storage::load_state(path)?;

        if !state.feature_schema.is_current() {
            log::warn!(
                "persisted model {} has an incompatible feature schema (v{}, hash {:08x}); reporting stale",
                state.version_id,
                state.feature_schema.version,
                state.feature_schema.hash,
            );
            self.schema_stale.store(true, Ordering::SeqCst);
            return Ok(LifecyclePhase::Stale);
        }

        *self.current.write() = Some(Arc::new(state));
        self.schema_stale.store(false, Ordering::SeqCst);
        Ok(self.phase(None))
    }
}

// ============================================================================
// TESTS
// ============================================================================
