//! Latent specification ("X_L").

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{Hypers, SufficientStats};

/// Partition of columns into views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPartition {
    /// View index of every column.
    pub assignments: Vec<usize>,
    /// Number of columns in each view.
    pub counts: Vec<usize>,
    /// CRP concentration over views.
    pub crp_alpha: f64,
}

/// Partition of rows into clusters within one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPartition {
    /// Number of rows in each cluster.
    pub counts: Vec<usize>,
    /// CRP concentration over clusters.
    pub crp_alpha: f64,
}

impl RowPartition {
    /// Total number of rows across clusters.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn num_clusters(&self) -> usize {
        self.counts.len()
    }
}

/// State of one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub row_partition: RowPartition,
    /// Per-cluster sufficient statistics of every column in the view,
    /// keyed by column index.
    pub column_stats: IndexMap<usize, Vec<SufficientStats>>,
}

/// The full latent specification of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentSpec {
    pub column_partition: ColumnPartition,
    /// Hyperparameters of every column.
    pub column_hypers: Vec<Hypers>,
    pub views: Vec<ViewState>,
}
