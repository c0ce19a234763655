//! Query and constraint tuples.

use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};

/// A (row, column) target for sampling or imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse a loosely typed `[row, col]` tuple.
    pub fn from_tuple(tuple: &[f64]) -> Result<Self> {
        match tuple {
            [row, col] => Ok(Self {
                row: parse_index(*row, "row")?,
                col: parse_index(*col, "column")?,
            }),
            _ => Err(CrossCatError::InvalidQuery(format!(
                "query cell needs (row, column), got {} elements",
                tuple.len()
            ))),
        }
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Self::new(row, col)
    }
}

/// A (row, column, value) triple: a constraint, or a probability query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub row: usize,
    pub col: usize,
    /// NaN, written as `null`, marks a missing value.
    #[serde(with = "crate::table::missing")]
    pub value: f64,
}

impl Observation {
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self { row, col, value }
    }

    /// Parse a loosely typed `[row, col, value]` tuple.
    pub fn from_tuple(tuple: &[f64]) -> Result<Self> {
        match tuple {
            [row, col, value] => Ok(Self {
                row: parse_index(*row, "row")?,
                col: parse_index(*col, "column")?,
                value: *value,
            }),
            _ => Err(CrossCatError::InvalidQuery(format!(
                "observation needs (row, column, value), got {} elements",
                tuple.len()
            ))),
        }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.row, self.col)
    }
}

impl From<(usize, usize, f64)> for Observation {
    fn from((row, col, value): (usize, usize, f64)) -> Self {
        Self::new(row, col, value)
    }
}

/// An imputed value with the fraction of draws that agree with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Imputation {
    pub value: f64,
    pub confidence: f64,
}

fn parse_index(value: f64, what: &str) -> Result<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(CrossCatError::InvalidQuery(format!(
            "{} index {} is not a non-negative integer",
            what, value
        )));
    }
    Ok(value as usize)
}
