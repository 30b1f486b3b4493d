//! FleetFuel Analytics - Core Engine
//!
//! Single-process analytics over per-vehicle fuel consumption records:
//! engineered efficiency features, unsupervised anomaly detection with
//! a versioned model lifecycle, windowed fleet/vehicle statistics and a
//! threshold-driven recommendation engine.
//!
//! The HTTP layer, persistence schema and dashboard are external
//! collaborators; they reach the engine through [`logic::engine::AnalyticsEngine`]
//! and the [`logic::records::RecordStore`] trait.

pub mod constants;
pub mod error;
pub mod logic;

pub use error::{EngineError, EngineResult};
pub use logic::cancel::CancelToken;
pub use logic::config::EngineConfig;
pub use logic::engine::{AnalyticsEngine, TrainingSummary};
pub use logic::lifecycle::{LifecyclePhase, ModelStatusReport};
pub use logic::recommend::{Recommendation, RuleThresholds, Severity};
pub use logic::records::{AnomalyResult, FuelRecord, MemoryRecordStore, RecordStore};
pub use logic::stats::{FleetStats, TimeWindow, VehicleStats};
