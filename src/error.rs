//! Error handling
//!
//! One taxonomy for the whole engine. Callers must be able to tell
//! "not enough data yet" (soft, retry later) apart from schema or
//! numeric defects (hard, needs intervention), so every variant carries
//! enough context to log and act on.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Input records were not sorted ascending by timestamp. Caller bug.
    #[error("records out of order for vehicle '{vehicle_id}': record at index {index} precedes its predecessor")]
    DataOrder { vehicle_id: String, index: usize },

    /// Too few records to train. Recoverable: retry once more data exists.
    #[error("insufficient training data: {actual} records, at least {required} required")]
    InsufficientData { actual: usize, required: usize },

    /// Feature layout drifted relative to the model's stored schema.
    #[error("feature schema mismatch: model has v{model_version} (hash {model_hash:08x}), live layout is v{live_version} (hash {live_hash:08x}); retrain required")]
    SchemaMismatch {
        model_version: u8,
        model_hash: u32,
        live_version: u8,
        live_hash: u32,
    },

    /// A NaN or infinity was produced where a finite double is required.
    #[error("non-finite value for '{field}' during {stage} (vehicle '{vehicle_id}')")]
    InvalidNumericResult {
        field: &'static str,
        stage: &'static str,
        vehicle_id: String,
    },

    /// A record failed boundary validation.
    #[error("invalid record {record_id}: {reason}")]
    InvalidRecord { record_id: i64, reason: String },

    /// A configuration value outside its documented range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Training was cancelled by the caller's token. Previous model stays active.
    #[error("training cancelled")]
    TrainingCancelled,

    /// Training failed for a reason other than cancellation.
    #[error("training failed: {0}")]
    TrainingFailed(String),

    /// No trained model is available to score against.
    #[error("no trained model available (status: {status})")]
    ModelAbsent { status: String },

    /// Persisted model state could not be read or failed integrity checks.
    #[error("model storage error: {0}")]
    Storage(String),

    /// Record store adapter failure.
    #[error("record store error: {0}")]
    RecordStore(String),
}

impl EngineError {
    /// Soft conditions the caller may retry later with more data.
    /// Everything else is a defect or requires explicit intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_is_retryable() {
        let err = EngineError::InsufficientData { actual: 9, required: 10 };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_hard_errors_are_not_retryable() {
        let err = EngineError::SchemaMismatch {
            model_version: 1,
            model_hash: 0xdead_beef,
            live_version: 2,
            live_hash: 0xfeed_f00d,
        };
        assert!(!err.is_retryable());

        let err = EngineError::DataOrder { vehicle_id: "V001".into(), index: 3 };
        assert!(!err.is_retryable());
    }
}
