//! Statistics Module - Fleet & Vehicle KPIs
//!
//! On-demand aggregation over a time window. Nothing here is persisted
//! or cached; source records may change between calls.

pub mod aggregate;
pub mod types;

// Re-export common types
pub use aggregate::aggregate;
pub use types::{FleetStats, TimeWindow, VehicleStats};
