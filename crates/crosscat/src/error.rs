//! Error types for the CrossCat query engine.

use thiserror::Error;

/// Main error type for CrossCat operations.
#[derive(Debug, Error)]
pub enum CrossCatError {
    /// Malformed query or constraint: wrong arity, out-of-range index,
    /// or a value the column's model family cannot hold.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A query addresses observed and hypothetical rows in one breath.
    #[error("Inconsistent row reference: {0}")]
    InconsistentRowReference(String),

    /// A predictive computation produced NaN or an infinity.
    #[error("Numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// A latent snapshot violates the structural invariants.
    #[error("Invalid latent state: {0}")]
    InvalidState(String),

    /// Chains of an ensemble disagree on table shape or schema.
    #[error("Inconsistent ensemble: {0}")]
    InconsistentEnsemble(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error saving or loading snapshot and config files.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CrossCat operations.
pub type Result<T> = std::result::Result<T, CrossCatError>;
