//! Features Module - Feature Engineering
//!
//! Everything between raw fuel records and the model's input matrix:
//! the authoritative feature layout, the versioned vector type, rolling
//! per-vehicle statistics, and the point-in-time fleet index.

pub mod engineer;
pub mod fleet;
pub mod layout;
pub mod rolling;
pub mod vector;

#[cfg(test)]
mod tests;

// Re-export common types
pub use engineer::FeatureEngineer;
pub use layout::{FeatureSchema, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use vector::FeatureVector;
