//! Property-based tests for the query engine.
//!
//! These tests use proptest to generate random partitions and values and
//! check the invariants the estimators rely on.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p crosscat --test property_tests
//!
//! # More cases (slower but more thorough)
//! PROPTEST_CASES=10000 cargo test -p crosscat --test property_tests
//! ```

use proptest::prelude::*;

use crosscat::model::GaussianComponent;
use crosscat::numeric::{logsumexp, median};
use crosscat::{
    ChainBuilder, ColumnSchema, ComponentModel, DataTable, GaussianHypers, Observation,
    PredictiveEngine, TableSchema, linfoot, log_cluster_weights, split_draws,
};

// =============================================================================
// Test Strategies
// =============================================================================

/// Row-to-cluster assignment with contiguous cluster indices.
fn row_assignment() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 1..30).prop_map(|raw| {
        let mut relabel = Vec::new();
        raw.iter()
            .map(|k| match relabel.iter().position(|r| r == k) {
                Some(index) => index,
                None => {
                    relabel.push(*k);
                    relabel.len() - 1
                }
            })
            .collect()
    })
}

fn finite_value() -> impl Strategy<Value = f64> {
    -1.0e3..1.0e3f64
}

// =============================================================================
// Cluster Weight Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_hypothetical_weights_normalize(
        assignment in row_assignment(),
        alpha in 0.01..20.0f64,
        extra in 0usize..50,
    ) {
        let schema = TableSchema::with_columns(vec![ColumnSchema::gaussian("x")]);
        let rows: Vec<Vec<f64>> = (0..assignment.len()).map(|i| vec![i as f64]).collect();
        let table = DataTable::from_rows(rows).unwrap();
        let chain = ChainBuilder::new(&schema, &table)
            .row_clusters(vec![assignment.clone()])
            .view_alpha(alpha)
            .build()
            .unwrap();

        let row = assignment.len() + extra;
        let lw = log_cluster_weights(&schema, &chain, &[], row, 0).unwrap();
        prop_assert!(logsumexp(&lw).abs() < 1e-7);
        prop_assert!(lw.iter().all(|w| w.is_finite()));
    }

    #[test]
    fn prop_observed_probability_is_finite(
        assignment in row_assignment(),
        value in finite_value(),
    ) {
        let schema = TableSchema::with_columns(vec![ColumnSchema::gaussian("x")]);
        let rows: Vec<Vec<f64>> = (0..assignment.len()).map(|i| vec![i as f64 * 0.5]).collect();
        let table = DataTable::from_rows(rows).unwrap();
        let chain = ChainBuilder::new(&schema, &table)
            .row_clusters(vec![assignment])
            .build()
            .unwrap();
        let engine = PredictiveEngine::new(&schema, &chain).unwrap();

        let lp = engine
            .simple_predictive_probability(&[], &[Observation::new(0, 0, value)])
            .unwrap();
        prop_assert!(lp[0].is_finite());
    }
}

// =============================================================================
// Component Model Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_folding_never_mutates(
        values in prop::collection::vec(finite_value(), 0..20),
        constraints in prop::collection::vec(finite_value(), 0..5),
        x in finite_value(),
    ) {
        let mut cpnt = GaussianComponent::prior(GaussianHypers::default());
        for v in &values {
            cpnt.insert(*v).unwrap();
        }
        let before = *cpnt.stats();
        let _ = cpnt.predictive_logp(x, &constraints).unwrap();
        prop_assert_eq!(*cpnt.stats(), before);
    }

    #[test]
    fn prop_insert_then_remove_restores_count(
        values in prop::collection::vec(finite_value(), 1..20),
    ) {
        let mut cpnt = GaussianComponent::prior(GaussianHypers::default());
        for v in &values {
            cpnt.insert(*v).unwrap();
        }
        for v in values.iter().rev() {
            cpnt.remove(*v).unwrap();
        }
        prop_assert_eq!(cpnt.stats().n, 0);
    }
}

// =============================================================================
// Estimator Helper Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_linfoot_in_unit_interval(mi in 0.0..10.0f64) {
        let l = linfoot(mi).unwrap();
        prop_assert!((0.0..1.0).contains(&l));
    }

    #[test]
    fn prop_linfoot_increasing(a in 0.0..8.0f64, delta in 0.001..2.0f64) {
        prop_assert!(linfoot(a + delta).unwrap() > linfoot(a).unwrap());
    }

    #[test]
    fn prop_split_draws_preserves_total(n in 0usize..1000, chains in 1usize..20) {
        let split = split_draws(n, chains);
        prop_assert_eq!(split.len(), chains);
        prop_assert_eq!(split.iter().sum::<usize>(), n);
        let max = *split.iter().max().unwrap();
        let min = *split.iter().min().unwrap();
        prop_assert!(max - min <= 1);
        prop_assert!(split.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn prop_logsumexp_bounds(xs in prop::collection::vec(-50.0..50.0f64, 1..20)) {
        let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lse = logsumexp(&xs);
        prop_assert!(lse >= max - 1e-12);
        prop_assert!(lse <= max + (xs.len() as f64).ln() + 1e-12);
    }

    #[test]
    fn prop_median_within_range(xs in prop::collection::vec(finite_value(), 1..50)) {
        let m = median(&xs).unwrap();
        let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
        prop_assert!(m >= min && m <= max);
    }
}
