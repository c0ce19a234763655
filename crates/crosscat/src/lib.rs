//! CrossCat: posterior predictive queries over learned cross-categorization
//! models.
//!
//! CrossCat partitions the columns of a table into views and, within each
//! view, the rows into clusters. Each (view, cluster, column) cell is a
//! conjugate-Bayesian component model summarized by cached sufficient
//! statistics. This crate answers queries against already-learned states:
//!
//! - **Sampling**: draw values for cells of observed or hypothetical rows
//! - **Probability**: evaluate predictive log densities, singly or jointly
//! - **Imputation**: summarize draws into a value with a confidence
//! - **Mutual information**: Monte Carlo estimates between column pairs
//! - **Diagnostics**: typicality, similarity and dependence probability
//!
//! # Example
//!
//! ```
//! use crosscat::{Cell, ChainBuilder, ColumnSchema, DataTable, Ensemble, Observation, TableSchema};
//!
//! let schema = TableSchema::with_columns(vec![
//!     ColumnSchema::gaussian("height"),
//!     ColumnSchema::categorical("size", ["small", "large"]),
//! ]);
//! let table = DataTable::encode(
//!     &schema,
//!     &[vec!["1.2", "small"], vec!["1.1", "small"], vec!["2.9", "large"], vec!["NA", "large"]],
//! )
//! .unwrap();
//! let chains = vec![
//!     ChainBuilder::new(&schema, &table)
//!         .row_clusters(vec![vec![0, 0, 1, 1]])
//!         .build()
//!         .unwrap(),
//! ];
//!
//! let ensemble = Ensemble::new(&schema, &chains).unwrap();
//! let draws = ensemble
//!     .simple_predictive_sample(&[Observation::new(4, 1, 1.0)], &[Cell::new(4, 0)], 10, 7)
//!     .unwrap();
//! assert_eq!(draws.len(), 10);
//!
//! let dependence = ensemble.dependence_probability(0, 1).unwrap();
//! assert_eq!(dependence, 1.0);
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod model;
pub mod numeric;
pub mod query;
pub mod schema;
pub mod state;
pub mod table;

pub use analysis::{MutualInformation, linfoot};
pub use config::EngineConfig;
pub use error::{CrossCatError, Result};
pub use model::{
    CategoricalHypers, Cluster, ClusterModelFactory, Component, ComponentModel, GaussianHypers,
    Hypers, SufficientStats,
};
pub use query::{
    Cell, Ensemble, Imputation, Observation, PredictiveEngine, log_cluster_weights, split_draws,
};
pub use schema::{Codebook, ColumnSchema, ModelFamily, TableSchema};
pub use state::{Chain, ChainBuilder, ClusterAssignment, LatentSpec, Snapshot};
pub use table::DataTable;
