//! Core type definitions for schema representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conjugate model family governing a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Real-valued data under a Normal-Inverse-Gamma prior.
    Gaussian,
    /// Integer-coded categories under a symmetric Dirichlet prior.
    Categorical,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Gaussian => write!(f, "gaussian"),
            ModelFamily::Categorical => write!(f, "categorical"),
        }
    }
}
