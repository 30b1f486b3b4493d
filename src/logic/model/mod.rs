//! Model Module - Unsupervised Anomaly Scoring
//!
//! Isolation forest training and scoring, separated from the lifecycle
//! machinery so the model itself stays a pure fit/score computation.

pub mod detector;
pub mod forest;
pub mod state;

// Re-export common types
pub use detector::{fit, score, FeatureScaler, FitOutcome};
pub use forest::IsolationForest;
pub use state::ModelState;
