//! Integration tests for single-chain predictive queries.

use crosscat::model::{CategoricalComponent, CategoricalStats, GaussianComponent, GaussianStats};
use crosscat::numeric::logsumexp;
use crosscat::{
    CategoricalHypers, Cell, Chain, ChainBuilder, ColumnSchema, ComponentModel, CrossCatError,
    DataTable, GaussianHypers, Hypers, Observation, PredictiveEngine, SufficientStats,
    TableSchema, log_cluster_weights,
};

/// A small census-like table: age and income share a view with two
/// clusters, region sits alone in a second view.
fn census() -> (TableSchema, DataTable) {
    let schema = TableSchema::with_columns(vec![
        ColumnSchema::gaussian("age"),
        ColumnSchema::gaussian("income"),
        ColumnSchema::categorical("region", ["north", "south", "east"]),
    ]);
    let rows = vec![
        vec!["22", "18.0", "north"],
        vec!["25", "21.5", "north"],
        vec!["24", "NA", "south"],
        vec!["61", "80.0", "south"],
        vec!["58", "75.5", "east"],
        vec!["", "78.0", "north"],
    ];
    let table = DataTable::encode(&schema, &rows).expect("Failed to encode table");
    (schema, table)
}

fn census_chain(schema: &TableSchema, table: &DataTable) -> Chain {
    ChainBuilder::new(schema, table)
        .column_views(vec![0, 0, 1])
        .row_clusters(vec![vec![0, 0, 0, 1, 1, 1], vec![0, 0, 0, 0, 0, 0]])
        .hypers(vec![
            Hypers::Gaussian(GaussianHypers::new(40.0, 0.1, 2.0, 10.0).unwrap()),
            Hypers::Gaussian(GaussianHypers::new(50.0, 0.1, 2.0, 10.0).unwrap()),
            Hypers::Categorical(CategoricalHypers::new(3, 1.0).unwrap()),
        ])
        .build()
        .expect("Failed to build chain")
}

// =============================================================================
// Component Model Reference Values
// =============================================================================

#[test]
fn test_gaussian_reference_predictive() {
    let cpnt = GaussianComponent::new(
        GaussianHypers::default(),
        GaussianStats {
            n: 10,
            sum_x: 20.0,
            sum_x2: 45.0,
        },
    );
    let post = cpnt.posterior(&[]).unwrap();
    assert_eq!(post.kappa, 11.0);
    assert_eq!(post.alpha, 6.0);
    assert!((post.mu - 1.818_181_8).abs() < 1e-6);

    let lp = cpnt.predictive_logp(2.0, &[]).unwrap();
    assert!((lp - (-0.9414)).abs() < 1e-4, "got {}", lp);
}

#[test]
fn test_categorical_reference_predictive() {
    let cpnt = CategoricalComponent::new(
        CategoricalHypers::new(3, 1.0).unwrap(),
        CategoricalStats {
            counts: vec![5, 3, 2],
        },
    )
    .unwrap();
    let p = cpnt.predictive_logp(0.0, &[]).unwrap().exp();
    assert!((p - 6.0 / 13.0).abs() < 1e-12);
    assert!((p - 0.4615).abs() < 1e-4);
}

// =============================================================================
// Encoding and Chain Construction
// =============================================================================

#[test]
fn test_encoded_table_round_trips_categories() {
    let (schema, table) = census();
    assert_eq!(table.row_count(), 6);
    assert!(DataTable::is_missing(table.get(2, 1).unwrap()));
    assert!(DataTable::is_missing(table.get(5, 0).unwrap()));
    assert_eq!(table.get(4, 2), Some(2.0));
    assert_eq!(
        schema.decode_value(2, 2.0).unwrap(),
        Some("east".to_string())
    );
}

#[test]
fn test_missing_values_skip_statistics() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    assert_eq!(chain.cluster_stats(1, 0).unwrap().count(), 2);
    assert_eq!(chain.cluster_stats(0, 1).unwrap().count(), 2);
    assert_eq!(chain.cluster_stats(2, 0).unwrap().count(), 6);
}

// =============================================================================
// Cluster Weights
// =============================================================================

#[test]
fn test_hypothetical_weights_normalize_without_constraints() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    for view in 0..chain.num_views() {
        let lw = log_cluster_weights(&schema, &chain, &[], 100, view).unwrap();
        assert_eq!(lw.len(), chain.num_clusters(view).unwrap() + 1);
        assert!(logsumexp(&lw).abs() < 1e-7);
    }
}

// =============================================================================
// Predictive Queries
// =============================================================================

#[test]
fn test_sampling_is_reproducible() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();
    let query = [Cell::new(6, 0), Cell::new(6, 1), Cell::new(6, 2)];
    let constraints = [Observation::new(6, 2, 1.0)];

    let a = engine
        .simple_predictive_sample(&constraints, &query, 25, 1234)
        .unwrap();
    let b = engine
        .simple_predictive_sample(&constraints, &query, 25, 1234)
        .unwrap();
    let bits = |draws: &Vec<Vec<f64>>| -> Vec<u64> {
        draws.iter().flatten().map(|x| x.to_bits()).collect()
    };
    assert_eq!(bits(&a), bits(&b));

    for draw in &a {
        assert_eq!(draw.len(), 3);
        assert!(draw[2] == 0.0 || draw[2] == 1.0 || draw[2] == 2.0);
    }
}

#[test]
fn test_constraint_on_observed_row_peer() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();

    // Row 2 is missing income; row 0 shares its cluster.
    let plain = engine
        .simple_predictive_probability(&[], &[Observation::new(2, 1, 20.0)])
        .unwrap()[0];
    let informed = engine
        .simple_predictive_probability(
            &[Observation::new(0, 1, 20.0)],
            &[Observation::new(2, 1, 20.0)],
        )
        .unwrap()[0];
    assert!(informed > plain);

    // A constraint on a row of another cluster does not apply.
    let unrelated = engine
        .simple_predictive_probability(
            &[Observation::new(3, 1, 20.0)],
            &[Observation::new(2, 1, 20.0)],
        )
        .unwrap()[0];
    assert_eq!(unrelated, plain);
}

#[test]
fn test_probability_prefers_matching_cluster() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();

    let young = Observation::new(6, 0, 23.0);
    let lp_rich = engine
        .simple_predictive_probability(&[Observation::new(6, 1, 79.0)], &[young])
        .unwrap()[0];
    let lp_poor = engine
        .simple_predictive_probability(&[Observation::new(6, 1, 19.0)], &[young])
        .unwrap()[0];
    assert!(lp_poor > lp_rich);
}

#[test]
fn test_imputation_of_missing_income() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();

    let imputed = engine
        .impute_and_confidence(&[], Cell::new(2, 1), 201, 77)
        .unwrap();
    assert!(imputed.value > 5.0 && imputed.value < 35.0, "value {}", imputed.value);
    assert!((0.0..=1.0).contains(&imputed.confidence));
}

#[test]
fn test_categorical_imputation_with_dominant_category() {
    let schema = TableSchema::with_columns(vec![ColumnSchema::categorical(
        "status",
        ["ok", "warn", "fail"],
    )]);
    let mut rows = vec![vec!["ok"]; 9];
    rows.push(vec!["warn"]);
    let table = DataTable::encode(&schema, &rows).unwrap();
    let chain = ChainBuilder::new(&schema, &table)
        .hypers(vec![Hypers::Categorical(
            CategoricalHypers::new(3, 0.001).unwrap(),
        )])
        .build()
        .unwrap();
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();

    let imputed = engine
        .impute_and_confidence(&[], Cell::new(0, 0), 200, 31)
        .unwrap();
    assert_eq!(imputed.value, 0.0);
    assert!(imputed.confidence >= 0.85, "confidence {}", imputed.confidence);
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn test_invalid_state_rejected_by_engine() {
    let (schema, table) = census();
    let mut chain = census_chain(&schema, &table);
    chain.latent.views[0].row_partition.counts[0] += 1;
    assert!(matches!(
        PredictiveEngine::new(&schema, &chain),
        Err(CrossCatError::InvalidState(_))
    ));
}

#[test]
fn test_malformed_tuples() {
    assert!(matches!(
        Observation::from_tuple(&[1.0, 2.0]),
        Err(CrossCatError::InvalidQuery(_))
    ));
    assert!(matches!(
        Cell::from_tuple(&[1.0, 2.0, 3.0]),
        Err(CrossCatError::InvalidQuery(_))
    ));
}

#[test]
fn test_category_outside_range_is_fatal() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();
    assert!(matches!(
        engine.simple_predictive_probability(&[], &[Observation::new(0, 2, 3.0)]),
        Err(CrossCatError::InvalidQuery(_))
    ));
}

#[test]
fn test_row_reference_mixing_is_fatal() {
    let (schema, table) = census();
    let chain = census_chain(&schema, &table);
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();
    assert!(matches!(
        engine.simple_predictive_sample(&[], &[Cell::new(0, 0), Cell::new(7, 0)], 3, 0),
        Err(CrossCatError::InconsistentRowReference(_))
    ));
    assert!(matches!(
        engine.joint_predictive_probability(
            &[],
            &[Observation::new(0, 0, 30.0), Observation::new(6, 1, 30.0)]
        ),
        Err(CrossCatError::InconsistentRowReference(_))
    ));
}

#[test]
fn test_impossible_statistics_surface_as_degeneracy() {
    let schema = TableSchema::with_columns(vec![ColumnSchema::gaussian("x")]);
    let table = DataTable::from_rows(vec![vec![1.0], vec![2.0]]).unwrap();
    let mut chain = ChainBuilder::new(&schema, &table).build().unwrap();

    // A sum of squares below sum_x^2 / n has negative spread.
    chain.latent.views[0].column_stats.get_mut(&0).unwrap()[0] =
        SufficientStats::Gaussian(GaussianStats {
            n: 2,
            sum_x: 10.0,
            sum_x2: 1.0,
        });
    let engine = PredictiveEngine::new(&schema, &chain).unwrap();

    assert!(matches!(
        engine.simple_predictive_probability(&[], &[Observation::new(0, 0, 1.0)]),
        Err(CrossCatError::NumericDegeneracy(_))
    ));
    assert!(matches!(
        engine.simple_predictive_sample(&[], &[Cell::new(1, 0)], 5, 0),
        Err(CrossCatError::NumericDegeneracy(_))
    ));
}
