//! Table-level schema definition ("M_c").

use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};

use super::column::ColumnSchema;
use super::types::ModelFamily;

/// Schema for an entire table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schemas for each column, in table order.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Create a new empty table schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table schema with the given columns.
    pub fn with_columns(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get a column by index.
    pub fn column(&self, col: usize) -> Result<&ColumnSchema> {
        self.columns.get(col).ok_or_else(|| {
            CrossCatError::InvalidQuery(format!(
                "column {} out of range (table has {} columns)",
                col,
                self.columns.len()
            ))
        })
    }

    /// Get a column index by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Model family of a column.
    pub fn family(&self, col: usize) -> Result<ModelFamily> {
        Ok(self.column(col)?.family)
    }

    /// Whether a raw token denotes a missing value.
    pub fn is_null_value(raw: &str) -> bool {
        let trimmed = raw.trim();
        trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("na")
            || trimmed.eq_ignore_ascii_case("n/a")
            || trimmed.eq_ignore_ascii_case("nan")
            || trimmed.eq_ignore_ascii_case("null")
            || trimmed.eq_ignore_ascii_case("none")
            || trimmed.eq_ignore_ascii_case("nil")
            || trimmed == "."
            || trimmed == "-"
    }

    /// Encode a raw token for a column. Missing tokens become NaN.
    pub fn encode_value(&self, col: usize, raw: &str) -> Result<f64> {
        if Self::is_null_value(raw) {
            return Ok(f64::NAN);
        }

        let column = self.column(col)?;
        match column.family {
            ModelFamily::Gaussian => raw.trim().parse::<f64>().map_err(|_| {
                CrossCatError::InvalidQuery(format!(
                    "'{}' is not numeric (column '{}')",
                    raw, column.name
                ))
            }),
            ModelFamily::Categorical => {
                let book = column.codebook.as_ref().ok_or_else(|| {
                    CrossCatError::InvalidQuery(format!(
                        "categorical column '{}' has no codebook",
                        column.name
                    ))
                })?;
                book.encode(raw.trim())
                    .map(|code| code as f64)
                    .ok_or_else(|| {
                        CrossCatError::InvalidQuery(format!(
                            "'{}' is not a category of column '{}'",
                            raw, column.name
                        ))
                    })
            }
        }
    }

    /// Decode a value back into its raw token. NaN decodes to `None`.
    pub fn decode_value(&self, col: usize, value: f64) -> Result<Option<String>> {
        if value.is_nan() {
            return Ok(None);
        }

        let column = self.column(col)?;
        match column.family {
            ModelFamily::Gaussian => Ok(Some(value.to_string())),
            ModelFamily::Categorical => {
                let decoded = column
                    .codebook
                    .as_ref()
                    .filter(|_| value.fract() == 0.0 && value >= 0.0)
                    .and_then(|book| book.decode(value as usize));
                decoded.map(|s| Some(s.to_string())).ok_or_else(|| {
                    CrossCatError::InvalidQuery(format!(
                        "{} is not a code of column '{}'",
                        value, column.name
                    ))
                })
            }
        }
    }
}
