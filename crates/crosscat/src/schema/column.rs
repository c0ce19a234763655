//! Column schema definition and categorical codebooks.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::types::ModelFamily;

/// Bijection between raw categorical values and integer codes.
///
/// A value's code is its insertion position, so codes are always `0..len`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Codebook {
    values: IndexSet<String>,
}

impl Codebook {
    /// Build a codebook from distinct values in code order.
    ///
    /// Repeated values keep the code of their first occurrence.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Code assigned to a raw value.
    pub fn encode(&self, value: &str) -> Option<usize> {
        self.values.get_index_of(value)
    }

    /// Raw value for a code.
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.values.get_index(code).map(String::as_str)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Model family tag.
    pub family: ModelFamily,
    /// Raw value <-> code mapping for categorical columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebook: Option<Codebook>,
}

impl ColumnSchema {
    /// A real-valued column.
    pub fn gaussian(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family: ModelFamily::Gaussian,
            codebook: None,
        }
    }

    /// A categorical column whose codes follow the order of `values`.
    pub fn categorical<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            family: ModelFamily::Categorical,
            codebook: Some(Codebook::new(values)),
        }
    }

    /// Number of categories, for categorical columns with a codebook.
    pub fn cardinality(&self) -> Option<usize> {
        match self.family {
            ModelFamily::Categorical => self.codebook.as_ref().map(Codebook::len),
            ModelFamily::Gaussian => None,
        }
    }
}
