//! Ensemble-level estimators: mutual information and structural diagnostics.

mod diagnostics;
mod mutual_info;

pub use diagnostics::{
    column_structural_typicality, dependence_probability, row_structural_typicality, similarity,
};
pub use mutual_info::{MutualInformation, chain_mutual_information, linfoot};
