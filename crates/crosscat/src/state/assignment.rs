//! Row-to-cluster assignment ("X_D").

use serde::{Deserialize, Serialize};

/// Cluster index of every existing row, one array per view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment {
    pub views: Vec<Vec<usize>>,
}

impl ClusterAssignment {
    pub fn new(views: Vec<Vec<usize>>) -> Self {
        Self { views }
    }

    /// Number of rows in the trained table.
    pub fn row_count(&self) -> usize {
        self.views.first().map_or(0, Vec::len)
    }

    /// Cluster of `row` in `view`; `None` for rows beyond the table.
    pub fn cluster_of(&self, view: usize, row: usize) -> Option<usize> {
        self.views.get(view).and_then(|asgn| asgn.get(row)).copied()
    }
}
