//! Anomaly Detector - fit & score entry points
//!
//! Glue between feature vectors and the isolation forest: feature
//! standardization, the contamination-quantile decision threshold, and
//! schema enforcement on both sides. Degenerate vectors never reach the
//! model; their records simply produce no AnomalyResult, the same way
//! the cleaning step of the surrounding pipeline discards them.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::forest::IsolationForest;
use super::state::ModelState;
use crate::error::{EngineError, EngineResult};
use crate::logic::cancel::CancelToken;
use crate::logic::config::{validate_contamination, EngineConfig};
use crate::logic::features::{FeatureVector, FEATURE_COUNT};
use crate::logic::records::AnomalyResult;

// ============================================================================
// FEATURE SCALER
// ============================================================================

/// Per-feature standardization parameters captured at training time
/// and replayed at scoring time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl FeatureScaler {
    /// Fit column means and population stds. A constant column gets
    /// std 1.0 so standardizing maps it to zero instead of NaN.
    pub fn fit(matrix: &Array2<f64>) -> Self {
        let n = matrix.nrows() as f64;
        let mut mean = Vec::with_capacity(matrix.ncols());
        let mut std = Vec::with_capacity(matrix.ncols());

        for col in matrix.columns() {
            let m = col.sum() / n;
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let s = var.sqrt();
            mean.push(m);
            std.push(if s > 0.0 { s } else { 1.0 });
        }

        Self { mean, std }
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut scaled = matrix.clone();
        for mut row in scaled.rows_mut() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (*value - self.mean[j]) / self.std[j];
            }
        }
        scaled
    }
}

// ============================================================================
// FIT
// ============================================================================

/// Output of one training run, before the lifecycle manager wraps it
/// into a versioned ModelState.
#[derive(Debug)]
pub struct FitOutcome {
    pub scaler: FeatureScaler,
    pub forest: IsolationForest,
    pub decision_threshold: f64,
    /// Sample count the forest was actually fitted on
    pub sample_count: usize,
    /// Labels for the training vectors themselves
    pub training_results: Vec<AnomalyResult>,
}

/// Fit a detector on engineered vectors.
///
/// Fails fast with `InsufficientData` below the configured floor rather
/// than producing a degenerate model; that error is retryable.
pub fn fit(
    vectors: &[FeatureVector],
    contamination: f64,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> EngineResult<FitOutcome> {
    validate_contamination(contamination)?;

    let active: Vec<&FeatureVector> = vectors.iter().filter(|v| !v.degenerate).collect();
    if active.len() < config.min_training_samples {
        return Err(EngineError::InsufficientData {
            actual: active.len(),
            required: config.min_training_samples,
        });
    }

    let matrix = build_matrix(&active)?;
    let scaler = FeatureScaler::fit(&matrix);
    let scaled = scaler.transform(&matrix);

    let check_cancelled = || cancel.is_cancelled();
    let forest = IsolationForest::fit(
        &scaled,
        config.tree_count,
        config.subsample_size,
        config.training_seed,
        &check_cancelled,
    )?;

    let scores = forest.decision_matrix(&scaled);
    ensure_scores_finite(&scores, &active)?;

    let decision_threshold = contamination_threshold(&scores, contamination);
    let training_results = label(&active, &scores, decision_threshold);

    log::info!(
        "detector fitted: {} samples, {} trees, threshold {:.4}, {} training anomalies",
        active.len(),
        config.tree_count,
        decision_threshold,
        training_results.iter().filter(|r| r.is_anomaly).count(),
    );

    Ok(FitOutcome {
        scaler,
        forest,
        decision_threshold,
        sample_count: active.len(),
        training_results,
    })
}

// ============================================================================
// SCORE
// ============================================================================

/// Score engineered vectors against a trained state.
///
/// The vectors' layout must match the state's stored schema exactly;
/// drift forces an explicit retrain instead of a silent reshape.
pub fn score(vectors: &[FeatureVector], state: &ModelState) -> EngineResult<Vec<AnomalyResult>> {
    let active: Vec<&FeatureVector> = vectors.iter().filter(|v| !v.degenerate).collect();
    if active.is_empty() {
        return Ok(Vec::new());
    }

    for vector in &active {
        if vector.version != state.feature_schema.version
            || vector.layout_hash != state.feature_schema.hash
        {
            return Err(EngineError::SchemaMismatch {
                model_version: state.feature_schema.version,
                model_hash: state.feature_schema.hash,
                live_version: vector.version,
                live_hash: vector.layout_hash,
            });
        }
    }

    let matrix = build_matrix(&active)?;
    let scaled = state.scaler.transform(&matrix);
    let scores = state.forest.decision_matrix(&scaled);
    ensure_scores_finite(&scores, &active)?;

    Ok(label(&active, &scores, state.decision_threshold))
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn build_matrix(vectors: &[&FeatureVector]) -> EngineResult<Array2<f64>> {
    for vector in vectors {
        vector.validate_layout()?;
        vector.ensure_finite("matrix assembly")?;
    }
    let mut data = Vec::with_capacity(vectors.len() * FEATURE_COUNT);
    for vector in vectors {
        data.extend_from_slice(vector.as_slice());
    }
    Array2::from_shape_vec((vectors.len(), FEATURE_COUNT), data)
        .map_err(|e| EngineError::TrainingFailed(format!("matrix shape error: {}", e)))
}

/// Decision threshold at the contamination quantile of training scores:
/// the k lowest-scoring training samples are labeled anomalous, with
/// k = ceil(contamination * n), at least 1.
fn contamination_threshold(scores: &[f64], contamination: f64) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let k = ((contamination * sorted.len() as f64).ceil() as usize)
        .clamp(1, sorted.len());
    sorted[k - 1]
}

fn label(vectors: &[&FeatureVector], scores: &[f64], threshold: f64) -> Vec<AnomalyResult> {
    vectors
        .iter()
        .zip(scores.iter())
        .map(|(vector, &score)| AnomalyResult {
            record_id: vector.record_id,
            vehicle_id: vector.vehicle_id.clone(),
            anomaly_score: score,
            is_anomaly: score <= threshold,
        })
        .collect()
}

fn ensure_scores_finite(scores: &[f64], vectors: &[&FeatureVector]) -> EngineResult<()> {
    for (score, vector) in scores.iter().zip(vectors.iter()) {
        if !score.is_finite() {
            return Err(EngineError::InvalidNumericResult {
                field: "anomaly_score",
                stage: "model scoring",
                vehicle_id: vector.vehicle_id.clone(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FeatureEngineer;
    use crate::logic::features::FeatureSchema;
    use crate::logic::records::test_support::record;
    use crate::logic::records::FuelRecord;

    fn sample_records(n: usize) -> Vec<FuelRecord> {
        (0..n)
            .map(|i| {
                let wobble = (i % 4) as f64 * 0.5;
                record(i as i64 + 1, "V001", i as i64, 100.0 + wobble, 10.0)
            })
            .collect()
    }

    fn engineered(n: usize) -> Vec<FeatureVector> {
        FeatureEngineer::new(5).engineer(&sample_records(n)).unwrap()
    }

    fn state_from(outcome: FitOutcome, n: usize) -> ModelState {
        ModelState::new(
            FeatureSchema::current(),
            0.1,
            n,
            outcome.decision_threshold,
            outcome.scaler,
            outcome.forest,
        )
        .unwrap()
    }

    #[test]
    fn test_fit_below_floor_is_insufficient_data() {
        let config = EngineConfig::default();
        let vectors = engineered(config.min_training_samples - 1);
        let err = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, EngineError::InsufficientData { actual: 9, required: 10 }));
    }

    #[test]
    fn test_fit_at_floor_succeeds() {
        let config = EngineConfig::default();
        let vectors = engineered(config.min_training_samples);
        let outcome = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap();
        assert_eq!(outcome.sample_count, config.min_training_samples);
        assert_eq!(outcome.training_results.len(), config.min_training_samples);
    }

    #[test]
    fn test_degenerate_vectors_do_not_count_toward_floor() {
        let config = EngineConfig::default();
        let mut records = sample_records(config.min_training_samples - 1);
        records.push(record(99, "V001", 99, 50.0, 0.0)); // degenerate
        let vectors = FeatureEngineer::new(5).engineer(&records).unwrap();
        let err = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
    }

    #[test]
    fn test_contamination_out_of_range_rejected() {
        let config = EngineConfig::default();
        let vectors = engineered(20);
        assert!(fit(&vectors, 0.5, &config, &CancelToken::new()).is_err());
        assert!(fit(&vectors, 0.0, &config, &CancelToken::new()).is_err());
    }

    #[test]
    fn test_training_flags_at_least_contamination_share() {
        let config = EngineConfig::default();
        let vectors = engineered(40);
        let outcome = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap();
        let flagged = outcome.training_results.iter().filter(|r| r.is_anomaly).count();
        assert!(flagged >= 4, "expected >= 4 flagged, got {flagged}");
    }

    #[test]
    fn test_rescoring_is_deterministic() {
        let config = EngineConfig::default();
        let vectors = engineered(30);
        let outcome = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap();
        let state = state_from(outcome, 30);

        let first = score(&vectors, &state).unwrap();
        let second = score(&vectors, &state).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_retrain_same_data_same_labels() {
        let config = EngineConfig::default();
        let vectors = engineered(30);
        let a = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap();
        let b = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap();

        let labels_a: Vec<bool> = a.training_results.iter().map(|r| r.is_anomaly).collect();
        let labels_b: Vec<bool> = b.training_results.iter().map(|r| r.is_anomaly).collect();
        assert_eq!(labels_a, labels_b);
    }

    #[test]
    fn test_schema_drift_rejected_at_scoring() {
        let config = EngineConfig::default();
        let vectors = engineered(20);
        let outcome = fit(&vectors, 0.1, &config, &CancelToken::new()).unwrap();
        let mut state = state_from(outcome, 20);

        // Simulate a persisted model from an older feature layout
        state.feature_schema.version = state.feature_schema.version.wrapping_add(1);
        state.feature_schema.hash = state.feature_schema.hash.wrapping_add(1);

        let err = score(&vectors, &state).unwrap_err();
        assert!(matches!(err, EngineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_cancelled_fit_reports_cancellation() {
        let config = EngineConfig::default();
        let vectors = engineered(20);
        let token = CancelToken::new();
        token.cancel();
        let err = fit(&vectors, 0.1, &config, &token).unwrap_err();
        assert!(matches!(err, EngineError::TrainingCancelled));
    }

    #[test]
    fn test_contamination_threshold_picks_kth_lowest() {
        let scores = [0.3, -0.1, 0.2, 0.0, 0.1];
        // ceil(0.2 * 5) = 1 -> lowest score
        assert_eq!(contamination_threshold(&scores, 0.2), -0.1);
        // ceil(0.4 * 5) = 2 -> second lowest
        assert_eq!(contamination_threshold(&scores, 0.4), 0.0);
    }
}
