//! Integration tests for feature engineering
//!
//! Pins the behaviors the rest of the pipeline depends on: cold-window
//! shrinkage, degenerate-record isolation, no-lookahead fleet context,
//! and the order check.

#[cfg(test)]
mod integration_tests {
    use crate::error::EngineError;
    use crate::logic::features::engineer::FeatureEngineer;
    use crate::logic::features::layout::FEATURE_COUNT;
    use crate::logic::records::test_support::record;

    #[test]
    fn test_vector_per_record_in_input_order() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V002", 1, 90.0, 10.0),
            record(3, "V001", 2, 110.0, 10.0),
        ];
        let vectors = FeatureEngineer::new(5).engineer(&records).unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].record_id, 1);
        assert_eq!(vectors[1].record_id, 2);
        assert_eq!(vectors[2].record_id, 3);
        assert!(vectors.iter().all(|v| v.values.len() == FEATURE_COUNT));
    }

    #[test]
    fn test_unsorted_input_is_a_data_order_error() {
        let records = vec![
            record(1, "V001", 5, 100.0, 10.0),
            record(2, "V001", 0, 90.0, 10.0),
        ];
        let err = FeatureEngineer::new(5).engineer(&records).unwrap_err();
        match err {
            EngineError::DataOrder { vehicle_id, index } => {
                assert_eq!(vehicle_id, "V001");
                assert_eq!(index, 1);
            }
            other => panic!("expected DataOrder, got {other}"),
        }
    }

    #[test]
    fn test_cold_window_shrinks_to_history() {
        // Second record's window holds exactly two samples, not W=5
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0), // 10 km/L
            record(2, "V001", 1, 120.0, 10.0), // 12 km/L
        ];
        let vectors = FeatureEngineer::new(5).engineer(&records).unwrap();

        let mean = vectors[1].get_by_name("efficiency_roll_mean").unwrap();
        assert!((mean - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_record_does_not_touch_neighbors() {
        let clean = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(3, "V001", 2, 120.0, 10.0),
        ];
        let with_zero_fuel = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 50.0, 0.0), // degenerate
            record(3, "V001", 2, 120.0, 10.0),
        ];

        let engineer = FeatureEngineer::new(5);
        let clean_vectors = engineer.engineer(&clean).unwrap();
        let dirty_vectors = engineer.engineer(&with_zero_fuel).unwrap();

        // The degenerate record is flagged and carries the sentinel
        assert!(dirty_vectors[1].degenerate);
        assert_eq!(dirty_vectors[1].get_by_name("efficiency"), Some(0.0));

        // Neighbors' rolling statistics are identical with and without it
        for name in ["efficiency_roll_mean", "efficiency_roll_std", "efficiency_zscore"] {
            assert_eq!(
                clean_vectors[1].get_by_name(name),
                dirty_vectors[2].get_by_name(name),
                "feature {name} was perturbed by a zero-fuel record",
            );
        }
    }

    #[test]
    fn test_degenerate_record_reads_prior_window() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 50.0, 0.0),
        ];
        let vectors = FeatureEngineer::new(5).engineer(&records).unwrap();
        // Window stats come from the one prior non-degenerate record
        assert_eq!(vectors[1].get_by_name("efficiency_roll_mean"), Some(10.0));
    }

    #[test]
    fn test_fleet_deviation_has_no_lookahead() {
        let base = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V002", 1, 80.0, 10.0),
        ];
        let mut extended = base.clone();
        extended.push(record(3, "V003", 10, 300.0, 10.0)); // future, 30 km/L

        let engineer = FeatureEngineer::new(5);
        let base_vectors = engineer.engineer(&base).unwrap();
        let extended_vectors = engineer.engineer(&extended).unwrap();

        for i in 0..base.len() {
            assert_eq!(
                base_vectors[i].get_by_name("fleet_deviation"),
                extended_vectors[i].get_by_name("fleet_deviation"),
                "future record leaked into fleet_deviation at index {i}",
            );
        }
    }

    #[test]
    fn test_fleet_deviation_value() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0), // 10 km/L, fleet mean 10
            record(2, "V002", 1, 160.0, 10.0), // 16 km/L, fleet mean (10+16)/2 = 13
        ];
        let vectors = FeatureEngineer::new(5).engineer(&records).unwrap();
        assert_eq!(vectors[0].get_by_name("fleet_deviation"), Some(0.0));
        let dev = vectors[1].get_by_name("fleet_deviation").unwrap();
        assert!((dev - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_deltas_track_previous_record_per_vehicle() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V002", 1, 50.0, 5.0),
            record(3, "V001", 2, 130.0, 12.0),
        ];
        let vectors = FeatureEngineer::new(5).engineer(&records).unwrap();

        // First record of each vehicle has zero deltas
        assert_eq!(vectors[0].get_by_name("fuel_used_delta"), Some(0.0));
        assert_eq!(vectors[1].get_by_name("fuel_used_delta"), Some(0.0));

        // V001's second record measures against V001's first, not V002
        assert_eq!(vectors[2].get_by_name("fuel_used_delta"), Some(2.0));
        assert_eq!(vectors[2].get_by_name("distance_delta"), Some(30.0));
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let records = vec![
            record(1, "V001", 0, 100.0, 10.0),
            record(2, "V001", 1, 95.0, 9.0),
            record(3, "V002", 2, 120.0, 11.0),
        ];
        let engineer = FeatureEngineer::new(5);
        let a = engineer.engineer(&records).unwrap();
        let b = engineer.engineer(&records).unwrap();
        for (va, vb) in a.iter().zip(b.iter()) {
            assert_eq!(va.values, vb.values);
        }
    }
}
