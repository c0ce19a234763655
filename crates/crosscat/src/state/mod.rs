//! Learned latent structure: column partition, row partitions and cached
//! sufficient statistics, plus read-only accessors over them.

mod assignment;
mod builder;
mod chain;
mod latent;
mod persistence;

pub use assignment::ClusterAssignment;
pub use builder::ChainBuilder;
pub use chain::Chain;
pub use latent::{ColumnPartition, LatentSpec, RowPartition, ViewState};
pub use persistence::Snapshot;
