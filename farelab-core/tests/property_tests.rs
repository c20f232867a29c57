//! Property tests for encoder and model invariants.
//!
//! 1. Encoder width is stable: every encoded row matches the fitted width,
//!    whatever categories the row carries.
//! 2. One-hot blocks hold at most one 1.0 each.
//! 3. Forests never predict outside the range of their training targets.
//! 4. Timestamps written by `to_raw` parse back to the same instant.

use farelab_core::domain::{parse_timestamp, FlightRecord};
use farelab_core::features::{FeatureEncoder, NUMERIC_FEATURES};
use farelab_core::models::{ForestParams, RandomForest, Regressor};
use farelab_core::synthetic::synthetic_flights;
use proptest::prelude::*;

// ── Strategies ───────────────────────────────────────────────────────

fn arb_airline() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Biman Bangladesh Airlines".to_string()),
        Just("Novoair".to_string()),
        "[A-Z][a-z]{2,12} Air",
    ]
}

fn arb_record() -> impl Strategy<Value = (u64, String, Option<String>)> {
    (0u64..1000, arb_airline(), proptest::option::of("[A-Z]{3}-[0-9]{2}"))
}

fn with_overrides(seed: u64, airline: String, aircraft: Option<String>) -> FlightRecord {
    let mut r = synthetic_flights(1, seed).remove(0);
    r.airline = airline;
    r.aircraft_type = aircraft;
    r
}

// ── 1 & 2. Encoder shape ─────────────────────────────────────────────

proptest! {
    #[test]
    fn encoded_width_is_stable((seed, airline, aircraft) in arb_record()) {
        let enc = FeatureEncoder::fit(&synthetic_flights(40, 7)).unwrap();
        let row = enc.encode(&with_overrides(seed, airline, aircraft));
        prop_assert_eq!(row.len(), enc.width());
        prop_assert_eq!(enc.feature_names().len(), enc.width());
    }

    #[test]
    fn one_hot_blocks_have_at_most_one_hot((seed, airline, aircraft) in arb_record()) {
        let enc = FeatureEncoder::fit(&synthetic_flights(40, 7)).unwrap();
        let row = enc.encode(&with_overrides(seed, airline, aircraft));
        let mut offset = NUMERIC_FEATURES.len();
        for vocab in enc.vocabularies() {
            let block = &row[offset..offset + vocab.values.len()];
            prop_assert!(block.iter().all(|v| *v == 0.0 || *v == 1.0));
            prop_assert!(block.iter().filter(|v| **v == 1.0).count() <= 1);
            offset += vocab.values.len();
        }
    }
}

// ── 3. Forest predictions bounded by targets ─────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn forest_predictions_stay_in_target_range(
        ys in proptest::collection::vec(-1e4..1e4_f64, 5..60),
        query in -100.0..200.0_f64,
    ) {
        let x: Vec<Vec<f64>> = (0..ys.len()).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let mut forest = RandomForest::new(ForestParams {
            n_trees: 8,
            ..ForestParams::default()
        });
        forest.fit(&x, &ys).unwrap();
        let lo = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let p = forest.predict(&[vec![query, 1.0]]).unwrap()[0];
        prop_assert!(p >= lo - 1e-9 && p <= hi + 1e-9);
    }
}

// ── 4. Timestamp formatting ──────────────────────────────────────────

proptest! {
    #[test]
    fn canonical_timestamps_parse_back(seed in 0u64..5000) {
        let r = synthetic_flights(1, seed).remove(0);
        let raw = r.to_raw();
        let dep = raw.departure.as_deref().unwrap();
        prop_assert_eq!(parse_timestamp(dep), Some(r.departure));
    }
}
