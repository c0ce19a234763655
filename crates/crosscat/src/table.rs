//! Row-major encoded data table.

use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};
use crate::schema::TableSchema;

/// Encoded tabular data.
///
/// Categorical entries hold integer codes; NaN marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    n_rows: usize,
    n_cols: usize,
    #[serde(with = "missing::values")]
    values: Vec<f64>,
}

/// Serde helpers writing the NaN missing sentinel as `null`.
pub(crate) mod missing {
    use serde::{Deserialize, Deserializer, Serializer};

    fn present(value: f64) -> Option<f64> {
        (!value.is_nan()).then_some(value)
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match present(*value) {
            Some(x) => serializer.serialize_some(&x),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }

    pub mod values {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(values: &[f64], serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.collect_seq(values.iter().map(|&v| super::present(v)))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let values = Vec::<Option<f64>>::deserialize(deserializer)?;
            Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        }
    }
}

impl DataTable {
    /// Build a table from already-encoded rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);

        let mut values = Vec::with_capacity(n_rows * n_cols);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(CrossCatError::InvalidState(format!(
                    "row {} has {} values, expected {}",
                    idx,
                    row.len(),
                    n_cols
                )));
            }
            values.extend(row);
        }

        Ok(Self {
            n_rows,
            n_cols,
            values,
        })
    }

    /// Encode raw string rows through the schema.
    pub fn encode<S: AsRef<str>>(schema: &TableSchema, rows: &[Vec<S>]) -> Result<Self> {
        let encoded = rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                if row.len() != schema.column_count() {
                    return Err(CrossCatError::InvalidState(format!(
                        "row {} has {} values, schema has {} columns",
                        row_idx,
                        row.len(),
                        schema.column_count()
                    )));
                }
                row.iter()
                    .enumerate()
                    .map(|(col, raw)| schema.encode_value(col, raw.as_ref()))
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_rows(encoded)
    }

    pub fn row_count(&self) -> usize {
        self.n_rows
    }

    pub fn column_count(&self) -> usize {
        self.n_cols
    }

    /// Value at `(row, col)`, or `None` when out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.n_rows && col < self.n_cols {
            Some(self.values[row * self.n_cols + col])
        } else {
            None
        }
    }

    /// All values of one row.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row < self.n_rows {
            let start = row * self.n_cols;
            Some(&self.values[start..start + self.n_cols])
        } else {
            None
        }
    }

    /// Iterate over the values of a column, including missing entries.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.n_rows).filter_map(move |row| self.get(row, col))
    }

    /// Whether a cell value is the missing sentinel.
    pub fn is_missing(value: f64) -> bool {
        value.is_nan()
    }
}
