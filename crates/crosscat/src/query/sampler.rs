//! CRP mixture weights over the clusters of a view.

use tracing::trace;

use crate::error::Result;
use crate::model::{ClusterModelFactory, ComponentModel};
use crate::schema::TableSchema;
use crate::state::Chain;

use super::types::Observation;

/// Log weight of every existing cluster of `view` plus the new cluster, for
/// placing `row` given `constraints`.
///
/// Each entry is the CRP prior term plus, for every non-missing constraint
/// on `row` in a column of `view`, that value's predictive log density
/// under the entry's cluster. An observed row is excluded from the CRP
/// denominator, so only hypothetical rows get a normalized prior.
pub fn log_cluster_weights(
    schema: &TableSchema,
    chain: &Chain,
    constraints: &[Observation],
    row: usize,
    view: usize,
) -> Result<Vec<f64>> {
    let partition = chain.row_partition(view)?;
    let excluded = if chain.is_observed(row) { 1.0 } else { 0.0 };
    let log_denom = (partition.total() as f64 - excluded + partition.crp_alpha).ln();

    let mut log_weights: Vec<f64> = partition
        .counts
        .iter()
        .map(|&count| (count as f64).ln() - log_denom)
        .chain(std::iter::once(partition.crp_alpha.ln() - log_denom))
        .collect();

    let mut applicable = Vec::new();
    for constraint in constraints {
        if constraint.row == row
            && !constraint.value.is_nan()
            && chain.view_of(constraint.col)? == view
        {
            applicable.push(*constraint);
        }
    }
    if applicable.is_empty() {
        return Ok(log_weights);
    }

    let columns: Vec<usize> = applicable.iter().map(|c| c.col).collect();
    let factory = ClusterModelFactory::new(schema, chain);
    let all_models = factory.all_cluster_models(view, Some(&columns))?;
    for (weight, models) in log_weights.iter_mut().zip(&all_models) {
        for constraint in &applicable {
            *weight += models[&constraint.col].predictive_logp(constraint.value, &[])?;
        }
    }

    trace!(
        view,
        row,
        constraints = applicable.len(),
        "folded constraints into cluster weights"
    );
    Ok(log_weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::logsumexp;
    use crate::schema::ColumnSchema;
    use crate::state::ChainBuilder;
    use crate::table::DataTable;

    fn fixture() -> (TableSchema, Chain) {
        let schema = TableSchema::with_columns(vec![
            ColumnSchema::gaussian("a"),
            ColumnSchema::categorical("b", ["x", "y"]),
        ]);
        let table = DataTable::from_rows(vec![
            vec![-5.0, 0.0],
            vec![-5.2, 0.0],
            vec![5.0, 1.0],
            vec![5.1, 1.0],
            vec![4.9, 1.0],
        ])
        .unwrap();
        let chain = ChainBuilder::new(&schema, &table)
            .row_clusters(vec![vec![0, 0, 1, 1, 1]])
            .view_alpha(0.5)
            .build()
            .unwrap();
        (schema, chain)
    }

    #[test]
    fn test_hypothetical_prior_weights_normalize() {
        let (schema, chain) = fixture();
        let lw = log_cluster_weights(&schema, &chain, &[], 5, 0).unwrap();
        assert_eq!(lw.len(), 3);
        assert!(logsumexp(&lw).abs() < 1e-7);
        assert!((lw[0] - (2.0f64 / 5.5).ln()).abs() < 1e-12);
        assert!((lw[2] - (0.5f64 / 5.5).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_observed_row_excluded_from_denominator() {
        let (schema, chain) = fixture();
        let lw = log_cluster_weights(&schema, &chain, &[], 0, 0).unwrap();
        assert!((lw[1] - (3.0f64 / 4.5).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_constraints_shift_weights() {
        let (schema, chain) = fixture();
        let constraints = [Observation::new(5, 0, 5.0)];
        let lw = log_cluster_weights(&schema, &chain, &constraints, 5, 0).unwrap();
        assert!(lw[1] > lw[0]);
        assert!(logsumexp(&lw).abs() > 1e-3);
    }

    #[test]
    fn test_constraints_on_other_rows_ignored() {
        let (schema, chain) = fixture();
        let constraints = [
            Observation::new(6, 0, 5.0),
            Observation::new(5, 1, f64::NAN),
        ];
        let lw = log_cluster_weights(&schema, &chain, &constraints, 5, 0).unwrap();
        let prior = log_cluster_weights(&schema, &chain, &[], 5, 0).unwrap();
        assert_eq!(lw, prior);
    }

    #[test]
    fn test_invalid_constraint_value_propagates() {
        let (schema, chain) = fixture();
        let constraints = [Observation::new(5, 1, 4.0)];
        assert!(log_cluster_weights(&schema, &chain, &constraints, 5, 0).is_err());
    }
}
