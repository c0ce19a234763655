//! Construct a chain from a data table and a fixed latent partition.

use indexmap::IndexMap;

use crate::error::{CrossCatError, Result};
use crate::model::{
    CategoricalHypers, Component, ComponentModel, GaussianHypers, Hypers,
};
use crate::schema::{ModelFamily, TableSchema};
use crate::table::DataTable;

use super::assignment::ClusterAssignment;
use super::chain::Chain;
use super::latent::{ColumnPartition, LatentSpec, RowPartition, ViewState};

/// Builds a validated [`Chain`] from encoded data plus column-to-view and
/// row-to-cluster assignments, computing counts and sufficient statistics.
///
/// # Example
///
/// ```
/// use crosscat::{ChainBuilder, ColumnSchema, DataTable, TableSchema};
///
/// let schema = TableSchema::with_columns(vec![
///     ColumnSchema::gaussian("x"),
///     ColumnSchema::categorical("y", ["a", "b"]),
/// ]);
/// let table = DataTable::from_rows(vec![vec![0.5, 0.0], vec![1.5, 1.0]]).unwrap();
///
/// let chain = ChainBuilder::new(&schema, &table)
///     .column_views(vec![0, 1])
///     .row_clusters(vec![vec![0, 1], vec![0, 0]])
///     .build()
///     .unwrap();
///
/// assert_eq!(chain.num_views(), 2);
/// assert_eq!(chain.num_clusters(0).unwrap(), 2);
/// ```
pub struct ChainBuilder<'a> {
    schema: &'a TableSchema,
    table: &'a DataTable,
    column_views: Option<Vec<usize>>,
    row_clusters: Option<Vec<Vec<usize>>>,
    hypers: Option<Vec<Hypers>>,
    column_alpha: f64,
    view_alpha: f64,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(schema: &'a TableSchema, table: &'a DataTable) -> Self {
        Self {
            schema,
            table,
            column_views: None,
            row_clusters: None,
            hypers: None,
            column_alpha: 1.0,
            view_alpha: 1.0,
        }
    }

    /// View of every column. Defaults to a single view.
    pub fn column_views(mut self, views: Vec<usize>) -> Self {
        self.column_views = Some(views);
        self
    }

    /// Cluster of every row, one array per view. Defaults to one cluster per view.
    pub fn row_clusters(mut self, clusters: Vec<Vec<usize>>) -> Self {
        self.row_clusters = Some(clusters);
        self
    }

    /// Hypers of every column. Defaults to `{mu: 0, kappa: 1, alpha: 1, beta: 1}`
    /// for Gaussian columns and `alpha = 1` over the codebook for categorical ones.
    pub fn hypers(mut self, hypers: Vec<Hypers>) -> Self {
        self.hypers = Some(hypers);
        self
    }

    /// CRP concentration over views.
    pub fn column_alpha(mut self, alpha: f64) -> Self {
        self.column_alpha = alpha;
        self
    }

    /// CRP concentration over clusters, shared by every view.
    pub fn view_alpha(mut self, alpha: f64) -> Self {
        self.view_alpha = alpha;
        self
    }

    pub fn build(self) -> Result<Chain> {
        let n_cols = self.schema.column_count();
        let n_rows = self.table.row_count();
        if self.table.column_count() != n_cols && n_rows > 0 {
            return Err(CrossCatError::InvalidState(format!(
                "table has {} columns, schema has {}",
                self.table.column_count(),
                n_cols
            )));
        }

        let column_views = self.column_views.unwrap_or_else(|| vec![0; n_cols]);
        if column_views.len() != n_cols {
            return Err(CrossCatError::InvalidState(format!(
                "{} column views for {} columns",
                column_views.len(),
                n_cols
            )));
        }
        let n_views = column_views.iter().max().map_or(0, |&v| v + 1);
        let mut view_counts = vec![0usize; n_views];
        for &view in &column_views {
            view_counts[view] += 1;
        }

        let row_clusters = self
            .row_clusters
            .unwrap_or_else(|| vec![vec![0; n_rows]; n_views]);
        if row_clusters.len() != n_views {
            return Err(CrossCatError::InvalidState(format!(
                "{} row assignments for {} views",
                row_clusters.len(),
                n_views
            )));
        }

        let hypers = match self.hypers {
            Some(hypers) => hypers,
            None => default_hypers(self.schema)?,
        };
        if hypers.len() != n_cols {
            return Err(CrossCatError::InvalidState(format!(
                "{} hypers for {} columns",
                hypers.len(),
                n_cols
            )));
        }

        let mut views = Vec::with_capacity(n_views);
        for (view, rows) in row_clusters.iter().enumerate() {
            if rows.len() != n_rows {
                return Err(CrossCatError::InvalidState(format!(
                    "view {} assigns {} rows, table has {}",
                    view,
                    rows.len(),
                    n_rows
                )));
            }
            let n_clusters = rows.iter().max().map_or(0, |&k| k + 1);
            let mut counts = vec![0usize; n_clusters];
            for &k in rows {
                counts[k] += 1;
            }

            let mut column_stats = IndexMap::new();
            for (col, _) in column_views.iter().enumerate().filter(|&(_, &v)| v == view) {
                let mut components = vec![Component::prior(&hypers[col]); n_clusters];
                for (row, &k) in rows.iter().enumerate() {
                    if let Some(value) = self.table.get(row, col) {
                        components[k].insert(value)?;
                    }
                }
                column_stats.insert(col, components.iter().map(Component::stats).collect());
            }

            views.push(ViewState {
                row_partition: RowPartition {
                    counts,
                    crp_alpha: self.view_alpha,
                },
                column_stats,
            });
        }

        let chain = Chain::new(
            LatentSpec {
                column_partition: ColumnPartition {
                    assignments: column_views,
                    counts: view_counts,
                    crp_alpha: self.column_alpha,
                },
                column_hypers: hypers,
                views,
            },
            ClusterAssignment::new(row_clusters),
        );
        chain.validate(self.schema)?;
        Ok(chain)
    }
}

fn default_hypers(schema: &TableSchema) -> Result<Vec<Hypers>> {
    schema
        .columns
        .iter()
        .map(|column| match column.family {
            ModelFamily::Gaussian => Ok(Hypers::Gaussian(GaussianHypers::default())),
            ModelFamily::Categorical => {
                let k = column.cardinality().ok_or_else(|| {
                    CrossCatError::InvalidState(format!(
                        "categorical column '{}' needs a codebook or explicit hypers",
                        column.name
                    ))
                })?;
                Ok(Hypers::Categorical(CategoricalHypers::new(k, 1.0)?))
            }
        })
        .collect()
}
