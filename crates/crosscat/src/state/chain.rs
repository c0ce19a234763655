//! A single posterior sample: latent specification plus row assignment.

use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};
use crate::model::{Hypers, SufficientStats};
use crate::schema::TableSchema;

use super::assignment::ClusterAssignment;
use super::latent::{LatentSpec, RowPartition, ViewState};

/// One chain of an ensemble: an immutable `(X_L, X_D)` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub latent: LatentSpec,
    pub assignment: ClusterAssignment,
}

fn invalid(message: String) -> CrossCatError {
    CrossCatError::InvalidState(message)
}

impl Chain {
    pub fn new(latent: LatentSpec, assignment: ClusterAssignment) -> Self {
        Self { latent, assignment }
    }

    /// Number of rows in the trained table.
    pub fn num_rows(&self) -> usize {
        self.assignment.row_count()
    }

    pub fn num_columns(&self) -> usize {
        self.latent.column_partition.assignments.len()
    }

    pub fn num_views(&self) -> usize {
        self.latent.views.len()
    }

    /// Rows inside the trained table are observed; rows beyond it are
    /// hypothetical.
    pub fn is_observed(&self, row: usize) -> bool {
        row < self.num_rows()
    }

    /// View holding a column.
    pub fn view_of(&self, col: usize) -> Result<usize> {
        self.latent
            .column_partition
            .assignments
            .get(col)
            .copied()
            .ok_or_else(|| {
                CrossCatError::InvalidQuery(format!(
                    "column {} out of range (table has {} columns)",
                    col,
                    self.num_columns()
                ))
            })
    }

    /// State of a view.
    pub fn view(&self, view: usize) -> Result<&ViewState> {
        self.latent.views.get(view).ok_or_else(|| {
            CrossCatError::InvalidQuery(format!(
                "view {} out of range ({} views)",
                view,
                self.num_views()
            ))
        })
    }

    /// Columns assigned to a view, in table order.
    pub fn view_columns(&self, view: usize) -> Result<Vec<usize>> {
        self.view(view)?;
        Ok(self
            .latent
            .column_partition
            .assignments
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == view)
            .map(|(col, _)| col)
            .collect())
    }

    pub fn row_partition(&self, view: usize) -> Result<&RowPartition> {
        Ok(&self.view(view)?.row_partition)
    }

    /// Number of existing clusters in a view.
    pub fn num_clusters(&self, view: usize) -> Result<usize> {
        Ok(self.row_partition(view)?.num_clusters())
    }

    /// Cluster of `row` in `view`; `None` for hypothetical rows.
    pub fn cluster_of(&self, view: usize, row: usize) -> Result<Option<usize>> {
        self.view(view)?;
        Ok(self.assignment.cluster_of(view, row))
    }

    pub fn hypers(&self, col: usize) -> Result<&Hypers> {
        self.latent.column_hypers.get(col).ok_or_else(|| {
            CrossCatError::InvalidQuery(format!(
                "column {} out of range (table has {} columns)",
                col,
                self.num_columns()
            ))
        })
    }

    /// Per-cluster statistics of a column.
    pub fn column_stats(&self, col: usize) -> Result<&[SufficientStats]> {
        let view = self.view_of(col)?;
        self.view(view)?
            .column_stats
            .get(&col)
            .map(Vec::as_slice)
            .ok_or_else(|| invalid(format!("view {} holds no statistics for column {}", view, col)))
    }

    /// Cached statistics of a column within one existing cluster.
    pub fn cluster_stats(&self, col: usize, cluster: usize) -> Result<&SufficientStats> {
        let stats = self.column_stats(col)?;
        stats.get(cluster).ok_or_else(|| {
            CrossCatError::InvalidQuery(format!(
                "cluster {} out of range ({} clusters)",
                cluster,
                stats.len()
            ))
        })
    }

    /// Population standard deviation of a Gaussian column, aggregated over
    /// the cached statistics of every cluster.
    pub fn column_population_std(&self, col: usize) -> Result<f64> {
        let (mut n, mut sum_x, mut sum_x2) = (0usize, 0.0, 0.0);
        for stats in self.column_stats(col)? {
            match stats {
                SufficientStats::Gaussian(s) => {
                    n += s.n;
                    sum_x += s.sum_x;
                    sum_x2 += s.sum_x2;
                }
                SufficientStats::Categorical(_) => {
                    return Err(CrossCatError::InvalidQuery(format!(
                        "column {} is not Gaussian",
                        col
                    )));
                }
            }
        }
        if n == 0 {
            return Ok(0.0);
        }
        let mean = sum_x / n as f64;
        // Rounding can leave a zero variance slightly negative.
        let variance = (sum_x2 / n as f64 - mean * mean).max(0.0);
        Ok(variance.sqrt())
    }

    /// Check every structural invariant against a schema.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        let n_cols = schema.column_count();
        let partition = &self.latent.column_partition;

        if partition.assignments.len() != n_cols {
            return Err(invalid(format!(
                "column partition covers {} columns, schema has {}",
                partition.assignments.len(),
                n_cols
            )));
        }
        if self.latent.column_hypers.len() != n_cols {
            return Err(invalid(format!(
                "{} column hypers for {} columns",
                self.latent.column_hypers.len(),
                n_cols
            )));
        }
        if !(partition.crp_alpha.is_finite() && partition.crp_alpha > 0.0) {
            return Err(invalid(format!(
                "column CRP alpha {} is not positive",
                partition.crp_alpha
            )));
        }

        for (col, hypers) in self.latent.column_hypers.iter().enumerate() {
            hypers.validate()?;
            let column = &schema.columns[col];
            if hypers.family() != column.family {
                return Err(invalid(format!(
                    "column '{}' is {} but its hypers are {}",
                    column.name,
                    column.family,
                    hypers.family()
                )));
            }
            if let (Hypers::Categorical(h), Some(k)) = (hypers, column.cardinality()) {
                if h.k != k {
                    return Err(invalid(format!(
                        "column '{}' has {} categories but k = {}",
                        column.name, k, h.k
                    )));
                }
            }
        }

        let n_views = self.num_views();
        if partition.counts.len() != n_views {
            return Err(invalid(format!(
                "{} view counts for {} views",
                partition.counts.len(),
                n_views
            )));
        }
        let mut view_tally = vec![0usize; n_views];
        for &view in &partition.assignments {
            if view >= n_views {
                return Err(invalid(format!("column assigned to missing view {}", view)));
            }
            view_tally[view] += 1;
        }
        if view_tally != partition.counts {
            return Err(invalid(format!(
                "view counts {:?} disagree with assignments {:?}",
                partition.counts, view_tally
            )));
        }
        if let Some(view) = view_tally.iter().position(|&count| count == 0) {
            return Err(invalid(format!("view {} holds no columns", view)));
        }

        if self.assignment.views.len() != n_views {
            return Err(invalid(format!(
                "row assignment covers {} views, latent spec has {}",
                self.assignment.views.len(),
                n_views
            )));
        }
        let n_rows = self.num_rows();
        for view in 0..n_views {
            self.validate_view(view, n_rows)?;
        }

        Ok(())
    }

    fn validate_view(&self, view: usize, n_rows: usize) -> Result<()> {
        let state = &self.latent.views[view];
        let rows = &self.assignment.views[view];
        let partition = &state.row_partition;

        if rows.len() != n_rows {
            return Err(invalid(format!(
                "view {} assigns {} rows, expected {}",
                view,
                rows.len(),
                n_rows
            )));
        }
        if !(partition.crp_alpha.is_finite() && partition.crp_alpha > 0.0) {
            return Err(invalid(format!(
                "view {} CRP alpha {} is not positive",
                view, partition.crp_alpha
            )));
        }
        if partition.counts.contains(&0) {
            return Err(invalid(format!("view {} has an empty cluster", view)));
        }

        let mut tally = vec![0usize; partition.num_clusters()];
        for &cluster in rows {
            if cluster >= tally.len() {
                return Err(invalid(format!(
                    "view {} assigns a row to missing cluster {}",
                    view, cluster
                )));
            }
            tally[cluster] += 1;
        }
        if tally != partition.counts {
            return Err(invalid(format!(
                "view {} cluster counts {:?} disagree with assignment {:?}",
                view, partition.counts, tally
            )));
        }

        let columns = self.view_columns(view)?;
        if state.column_stats.len() != columns.len()
            || !columns.iter().all(|col| state.column_stats.contains_key(col))
        {
            return Err(invalid(format!(
                "view {} statistics cover columns {:?}, expected {:?}",
                view,
                state.column_stats.keys().collect::<Vec<_>>(),
                columns
            )));
        }

        for (&col, stats) in &state.column_stats {
            let hypers = &self.latent.column_hypers[col];
            if stats.len() != partition.num_clusters() {
                return Err(invalid(format!(
                    "column {} has statistics for {} clusters, view {} has {}",
                    col,
                    stats.len(),
                    view,
                    partition.num_clusters()
                )));
            }
            for (cluster, s) in stats.iter().enumerate() {
                if s.family() != hypers.family() {
                    return Err(invalid(format!(
                        "column {} cluster {} holds {} statistics",
                        col,
                        cluster,
                        s.family()
                    )));
                }
                if let (SufficientStats::Categorical(cs), Hypers::Categorical(h)) = (s, hypers) {
                    if cs.counts.len() != h.k {
                        return Err(invalid(format!(
                            "column {} cluster {} holds {} category counts, k = {}",
                            col,
                            cluster,
                            cs.counts.len(),
                            h.k
                        )));
                    }
                }
                if s.count() > partition.counts[cluster] {
                    return Err(invalid(format!(
                        "column {} cluster {} holds {} observations but only {} rows",
                        col,
                        cluster,
                        s.count(),
                        partition.counts[cluster]
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoricalHypers, GaussianStats};
    use crate::schema::ColumnSchema;
    use crate::state::ChainBuilder;
    use crate::table::DataTable;

    fn schema() -> TableSchema {
        TableSchema::with_columns(vec![
            ColumnSchema::gaussian("x"),
            ColumnSchema::categorical("y", ["a", "b"]),
        ])
    }

    fn chain(schema: &TableSchema) -> Chain {
        let table = DataTable::from_rows(vec![
            vec![1.0, 0.0],
            vec![3.0, 1.0],
            vec![5.0, 1.0],
        ])
        .unwrap();
        ChainBuilder::new(schema, &table)
            .column_views(vec![0, 1])
            .row_clusters(vec![vec![0, 0, 1], vec![0, 0, 0]])
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_chain_passes() {
        let schema = schema();
        assert!(chain(&schema).validate(&schema).is_ok());
    }

    #[test]
    fn test_population_std_aggregates_clusters() {
        let schema = schema();
        let chain = chain(&schema);
        // values 1, 3, 5: mean 3, population variance 8/3
        let std = chain.column_population_std(0).unwrap();
        assert!((std - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(matches!(
            chain.column_population_std(1),
            Err(CrossCatError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_accessor_range_errors() {
        let schema = schema();
        let chain = chain(&schema);
        assert!(chain.view_of(2).is_err());
        assert!(chain.view(2).is_err());
        assert!(chain.cluster_stats(0, 2).is_err());
        assert!(chain.is_observed(2));
        assert!(!chain.is_observed(3));
    }

    #[test]
    fn test_row_count_mismatch_detected() {
        let schema = schema();
        let mut chain = chain(&schema);
        chain.latent.views[0].row_partition.counts = vec![1, 1];
        assert!(matches!(
            chain.validate(&schema),
            Err(CrossCatError::InvalidState(_))
        ));
    }

    #[test]
    fn test_column_count_mismatch_detected() {
        let schema = schema();
        let mut chain = chain(&schema);
        chain.latent.column_partition.counts = vec![2, 0];
        assert!(chain.validate(&schema).is_err());
    }

    #[test]
    fn test_family_mismatch_detected() {
        let schema = schema();
        let mut chain = chain(&schema);
        chain.latent.column_hypers[0] =
            Hypers::Categorical(CategoricalHypers::new(2, 1.0).unwrap());
        assert!(chain.validate(&schema).is_err());
    }

    #[test]
    fn test_overfull_statistics_detected() {
        let schema = schema();
        let mut chain = chain(&schema);
        chain.latent.views[0].column_stats.insert(
            0,
            vec![
                SufficientStats::Gaussian(GaussianStats {
                    n: 5,
                    sum_x: 0.0,
                    sum_x2: 0.0,
                }),
                SufficientStats::Gaussian(GaussianStats::default()),
            ],
        );
        assert!(chain.validate(&schema).is_err());
    }

    #[test]
    fn test_missing_view_statistics_detected() {
        let schema = schema();
        let mut chain = chain(&schema);
        chain.latent.views[1].column_stats.clear();
        assert!(chain.validate(&schema).is_err());
        assert!(chain.column_stats(1).is_err());
    }
}
