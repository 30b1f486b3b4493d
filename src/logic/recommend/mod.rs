//! Recommendation Module - Threshold-Driven Advisories
//!
//! Turns aggregator output and anomaly results into severity-tagged
//! recommendations through a fixed, ordered rule list.

pub mod engine;
pub mod rules;
pub mod types;

// Re-export common types
pub use engine::evaluate;
pub use rules::RuleThresholds;
pub use types::{Recommendation, RecommendationType, Severity, Subject};
