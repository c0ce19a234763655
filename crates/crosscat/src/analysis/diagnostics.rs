//! Structural diagnostics over an ensemble of chains.
//!
//! Every score is a co-assignment frequency: how often two rows share a
//! cluster, or two columns share a view, across the ensemble.

use crate::error::{CrossCatError, Result};
use crate::state::Chain;

fn shape(chains: &[Chain]) -> Result<(usize, usize)> {
    let first = chains.first().ok_or_else(|| {
        CrossCatError::InconsistentEnsemble("ensemble holds no chains".to_string())
    })?;
    Ok((first.num_rows(), first.num_columns()))
}

fn check_row(row: usize, n_rows: usize) -> Result<()> {
    if row >= n_rows {
        return Err(CrossCatError::InvalidQuery(format!(
            "row {} is not an observed row (table has {} rows)",
            row, n_rows
        )));
    }
    Ok(())
}

fn check_column(col: usize, n_cols: usize) -> Result<()> {
    if col >= n_cols {
        return Err(CrossCatError::InvalidQuery(format!(
            "column {} out of range (table has {} columns)",
            col, n_cols
        )));
    }
    Ok(())
}

fn cluster_of(chain: &Chain, view: usize, row: usize) -> Result<usize> {
    chain.cluster_of(view, row)?.ok_or_else(|| {
        CrossCatError::InvalidQuery(format!("row {} has no cluster in view {}", row, view))
    })
}

/// Fraction of (chain, row, column) triples in which a row shares its
/// cluster, in the column's view, with `row`.
///
/// The row's match with itself is part of the count, so every score sits
/// at least `1 / num_rows` above zero.
pub fn row_structural_typicality(chains: &[Chain], row: usize) -> Result<f64> {
    let (n_rows, n_cols) = shape(chains)?;
    check_row(row, n_rows)?;

    let mut matches = 0usize;
    for chain in chains {
        for col in 0..n_cols {
            let view = chain.view_of(col)?;
            let cluster = cluster_of(chain, view, row)?;
            matches += chain.row_partition(view)?.counts[cluster];
        }
    }
    Ok(matches as f64 / (chains.len() * n_rows * n_cols) as f64)
}

/// Fraction of (chain, column) pairs in which a column shares a view with
/// `col`, the column itself included.
pub fn column_structural_typicality(chains: &[Chain], col: usize) -> Result<f64> {
    let (_, n_cols) = shape(chains)?;
    check_column(col, n_cols)?;

    let mut matches = 0usize;
    for chain in chains {
        let view = chain.view_of(col)?;
        matches += chain.latent.column_partition.counts[view];
    }
    Ok(matches as f64 / (chains.len() * n_cols) as f64)
}

/// Fraction of (chain, target column) pairs in which `given_row` and
/// `target_row` share a cluster in the column's view. All columns are
/// targeted when `target_columns` is `None`.
pub fn similarity(
    chains: &[Chain],
    given_row: usize,
    target_row: usize,
    target_columns: Option<&[usize]>,
) -> Result<f64> {
    let (n_rows, n_cols) = shape(chains)?;
    check_row(given_row, n_rows)?;
    check_row(target_row, n_rows)?;

    let all: Vec<usize>;
    let columns = match target_columns {
        Some(columns) => columns,
        None => {
            all = (0..n_cols).collect();
            &all
        }
    };
    if columns.is_empty() {
        return Err(CrossCatError::InvalidQuery(
            "similarity needs at least one target column".to_string(),
        ));
    }
    for &col in columns {
        check_column(col, n_cols)?;
    }

    let mut matches = 0usize;
    for chain in chains {
        for &col in columns {
            let view = chain.view_of(col)?;
            if cluster_of(chain, view, given_row)? == cluster_of(chain, view, target_row)? {
                matches += 1;
            }
        }
    }
    Ok(matches as f64 / (chains.len() * columns.len()) as f64)
}

/// Fraction of chains in which two columns share a view.
pub fn dependence_probability(chains: &[Chain], col_a: usize, col_b: usize) -> Result<f64> {
    let (_, n_cols) = shape(chains)?;
    check_column(col_a, n_cols)?;
    check_column(col_b, n_cols)?;
    if col_a == col_b {
        return Ok(1.0);
    }

    let mut dependent = 0usize;
    for chain in chains {
        if chain.view_of(col_a)? == chain.view_of(col_b)? {
            dependent += 1;
        }
    }
    Ok(dependent as f64 / chains.len() as f64)
}
