//! Numeric helpers shared by the component models and estimators.

use std::f64::consts::PI;

use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};

use crate::error::{CrossCatError, Result};

/// Numerically stable `ln(sum(exp(xs)))`.
///
/// Returns negative infinity for an empty slice or when every term is
/// negative infinity.
pub fn logsumexp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    max + xs.iter().map(|&x| (x - max).exp()).sum::<f64>().ln()
}

/// Natural log of the gamma function.
pub fn ln_gamma(x: f64) -> f64 {
    libm::lgamma(x)
}

/// Log density of a location-scale Student-t distribution.
pub fn student_t_logpdf(x: f64, loc: f64, scale: f64, df: f64) -> f64 {
    let z = (x - loc) / scale;
    ln_gamma((df + 1.0) / 2.0)
        - ln_gamma(df / 2.0)
        - 0.5 * (df * PI).ln()
        - scale.ln()
        - (df + 1.0) / 2.0 * (z * z / df).ln_1p()
}

/// Fail with [`CrossCatError::NumericDegeneracy`] when `value` is NaN or infinite.
pub fn ensure_finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CrossCatError::NumericDegeneracy(format!(
            "{} evaluated to {}",
            what, value
        )))
    }
}

/// Draw an index with probability proportional to `exp(log_weights[i])`.
pub fn sample_log_weights(rng: &mut dyn RngCore, log_weights: &[f64]) -> Result<usize> {
    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    ensure_finite(max, "largest log weight")?;

    let weights = log_weights.iter().map(|&lw| (lw - max).exp());
    let index = WeightedIndex::new(weights).map_err(|e| {
        CrossCatError::NumericDegeneracy(format!("cannot sample from weights: {}", e))
    })?;
    Ok(index.sample(rng))
}

/// Median of a sample; the mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
