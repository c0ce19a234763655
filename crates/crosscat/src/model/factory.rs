//! Build per-cluster component models from a chain's cached statistics.

use indexmap::IndexMap;

use crate::error::{CrossCatError, Result};
use crate::schema::TableSchema;
use crate::state::Chain;

use super::{Cluster, Component};

/// Component models of one cluster, keyed by column index in request order.
pub type ClusterModels = IndexMap<usize, Component>;

/// Constructs component models for a (view, cluster) of one chain.
///
/// Models are rebuilt on every call from the cached sufficient statistics,
/// so callers own them outright and may fold constraints freely.
#[derive(Debug, Clone, Copy)]
pub struct ClusterModelFactory<'a> {
    schema: &'a TableSchema,
    chain: &'a Chain,
}

impl<'a> ClusterModelFactory<'a> {
    pub fn new(schema: &'a TableSchema, chain: &'a Chain) -> Self {
        Self { schema, chain }
    }

    /// Models of `columns` (every column of the view when `None`) within
    /// one cluster of `view`. [`Cluster::New`] yields prior-only models.
    pub fn cluster_model(
        &self,
        view: usize,
        cluster: Cluster,
        columns: Option<&[usize]>,
    ) -> Result<ClusterModels> {
        let n_clusters = self.chain.num_clusters(view)?;
        if let Cluster::Existing(k) = cluster {
            if k >= n_clusters {
                return Err(CrossCatError::InvalidQuery(format!(
                    "cluster {} out of range (view {} has {} clusters)",
                    k, view, n_clusters
                )));
            }
        }

        let columns = match columns {
            Some(columns) => columns.to_vec(),
            None => self.chain.view_columns(view)?,
        };

        let mut models = ClusterModels::with_capacity(columns.len());
        for col in columns {
            if self.chain.view_of(col)? != view {
                return Err(CrossCatError::InvalidQuery(format!(
                    "column {} is not in view {}",
                    col, view
                )));
            }
            let hypers = self.chain.hypers(col)?;
            let family = self.schema.family(col)?;
            if hypers.family() != family {
                return Err(CrossCatError::InvalidState(format!(
                    "column {} is {} but its hypers are {}",
                    col,
                    family,
                    hypers.family()
                )));
            }

            let model = match cluster {
                Cluster::Existing(k) => Component::new(hypers, self.chain.cluster_stats(col, k)?)?,
                Cluster::New => Component::prior(hypers),
            };
            models.insert(col, model);
        }
        Ok(models)
    }

    /// Models for every existing cluster of `view` followed by the new one.
    pub fn all_cluster_models(
        &self,
        view: usize,
        columns: Option<&[usize]>,
    ) -> Result<Vec<ClusterModels>> {
        let n_clusters = self.chain.num_clusters(view)?;
        Cluster::all(n_clusters)
            .map(|cluster| self.cluster_model(view, cluster, columns))
            .collect()
    }
}
