//! Posterior predictive queries: cluster weights, single-chain engine and
//! ensemble aggregation.

mod engine;
mod ensemble;
mod sampler;
mod types;

pub use engine::PredictiveEngine;
pub use ensemble::{Ensemble, chain_seeds, split_draws};
pub use sampler::log_cluster_weights;
pub use types::{Cell, Imputation, Observation};
