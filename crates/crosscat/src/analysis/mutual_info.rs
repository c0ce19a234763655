//! Monte Carlo mutual information between column pairs.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CrossCatError, Result};
use crate::model::{ClusterModelFactory, ComponentModel};
use crate::numeric::{ensure_finite, logsumexp, sample_log_weights};
use crate::query::log_cluster_weights;
use crate::schema::TableSchema;
use crate::state::Chain;

/// Mutual information of one column pair, one estimate per chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutualInformation {
    pub col_a: usize,
    pub col_b: usize,
    /// Mutual information in nats.
    pub mi: Vec<f64>,
    /// Linfoot transform of every estimate.
    pub linfoot: Vec<f64>,
}

impl MutualInformation {
    pub fn new(col_a: usize, col_b: usize, mi: Vec<f64>) -> Result<Self> {
        let linfoot = mi.iter().map(|&m| linfoot(m)).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            col_a,
            col_b,
            mi,
            linfoot,
        })
    }

    /// Ensemble mean of the mutual information.
    pub fn mean_mi(&self) -> f64 {
        mean(&self.mi)
    }

    /// Ensemble mean of the Linfoot information.
    pub fn mean_linfoot(&self) -> f64 {
        mean(&self.linfoot)
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

/// Linfoot information `sqrt(1 - exp(-2 * mi))`: the correlation of a
/// bivariate normal carrying `mi` nats. Lies in `[0, 1)`.
///
/// `mi` must be a non-negative estimate; anything else is an
/// [`InvalidQuery`](CrossCatError::InvalidQuery).
pub fn linfoot(mi: f64) -> Result<f64> {
    if !(mi >= 0.0) {
        return Err(CrossCatError::InvalidQuery(format!(
            "mutual information {} is not a non-negative number",
            mi
        )));
    }
    Ok((1.0 - (-2.0 * mi).exp()).sqrt())
}

/// Estimate the mutual information of two columns in one chain from
/// `n_samples` joint draws of a hypothetical row.
///
/// Columns in different views are independent, so their information is
/// exactly zero and no draws are made.
pub fn chain_mutual_information(
    schema: &TableSchema,
    chain: &Chain,
    col_a: usize,
    col_b: usize,
    n_samples: usize,
    rng: &mut dyn RngCore,
) -> Result<f64> {
    if n_samples == 0 {
        return Err(CrossCatError::InvalidQuery(
            "mutual information needs at least one sample".to_string(),
        ));
    }
    let view = chain.view_of(col_a)?;
    if chain.view_of(col_b)? != view {
        return Ok(0.0);
    }

    let row = chain.num_rows();
    let raw = log_cluster_weights(schema, chain, &[], row, view)?;
    let norm = logsumexp(&raw);
    let log_weights: Vec<f64> = raw.iter().map(|lw| lw - norm).collect();
    let models = ClusterModelFactory::new(schema, chain).all_cluster_models(view, Some(&[col_a, col_b]))?;

    let mut joint = vec![0.0; log_weights.len()];
    let mut marginal_a = vec![0.0; log_weights.len()];
    let mut marginal_b = vec![0.0; log_weights.len()];
    let mut total = 0.0;
    for _ in 0..n_samples {
        let cluster = sample_log_weights(rng, &log_weights)?;
        let x = models[cluster][&col_a].draw(rng, &[])?;
        let y = models[cluster][&col_b].draw(rng, &[])?;

        for (c, (lw, cluster_models)) in log_weights.iter().zip(&models).enumerate() {
            let lp_x = cluster_models[&col_a].predictive_logp(x, &[])?;
            let lp_y = cluster_models[&col_b].predictive_logp(y, &[])?;
            joint[c] = lw + lp_x + lp_y;
            marginal_a[c] = lw + lp_x;
            marginal_b[c] = lw + lp_y;
        }
        total += logsumexp(&joint) - logsumexp(&marginal_a) - logsumexp(&marginal_b);
    }

    let mi = ensure_finite(total / n_samples as f64, "mutual information estimate")?;
    trace!(col_a, col_b, view, mi, "chain mutual information");
    // Near independence the estimator can dip below zero from sampling
    // noise alone; the true quantity never does.
    Ok(mi.max(0.0))
}
