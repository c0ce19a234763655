//! Categorical component under a symmetric Dirichlet prior.

use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};
use crate::numeric::{ensure_finite, ln_gamma};
use crate::schema::ModelFamily;

use super::ComponentModel;

/// Symmetric Dirichlet hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoricalHypers {
    /// Number of categories.
    pub k: usize,
    /// Symmetric concentration.
    pub alpha: f64,
}

impl CategoricalHypers {
    pub fn new(k: usize, alpha: f64) -> Result<Self> {
        let hypers = Self { k, alpha };
        hypers.validate()?;
        Ok(hypers)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(CrossCatError::InvalidState(format!(
                "invalid categorical hypers (k={}, alpha={})",
                self.k, self.alpha
            )));
        }
        Ok(())
    }

    /// Map a value onto its category code. NaN maps to `None`.
    pub fn code(&self, value: f64) -> Result<Option<usize>> {
        if value.is_nan() {
            return Ok(None);
        }
        if value.fract() != 0.0 || value < 0.0 || value >= self.k as f64 {
            return Err(CrossCatError::InvalidQuery(format!(
                "categorical value {} outside [0, {})",
                value, self.k
            )));
        }
        Ok(Some(value as usize))
    }
}

/// Per-category counts of the observed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    pub counts: Vec<usize>,
}

impl CategoricalStats {
    /// All-zero counts over `k` categories.
    pub fn empty(k: usize) -> Self {
        Self { counts: vec![0; k] }
    }

    /// Total number of observations.
    pub fn n(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Categorical component model for one column within one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalComponent {
    hypers: CategoricalHypers,
    stats: CategoricalStats,
}

impl CategoricalComponent {
    pub fn new(hypers: CategoricalHypers, stats: CategoricalStats) -> Result<Self> {
        if stats.counts.len() != hypers.k {
            return Err(CrossCatError::InvalidState(format!(
                "categorical stats hold {} counts but k = {}",
                stats.counts.len(),
                hypers.k
            )));
        }
        Ok(Self { hypers, stats })
    }

    /// A component with no observations.
    pub fn prior(hypers: CategoricalHypers) -> Self {
        Self {
            hypers,
            stats: CategoricalStats::empty(hypers.k),
        }
    }

    pub fn hypers(&self) -> &CategoricalHypers {
        &self.hypers
    }

    pub fn stats(&self) -> &CategoricalStats {
        &self.stats
    }

    /// Extra per-category counts contributed by constraint values.
    fn extra_counts(&self, constraints: &[f64]) -> Result<Vec<usize>> {
        let mut extra = vec![0; self.hypers.k];
        for &x in constraints {
            if let Some(code) = self.hypers.code(x)? {
                extra[code] += 1;
            }
        }
        Ok(extra)
    }

    /// Unnormalized predictive weights `counts[k] + extra[k] + alpha`.
    fn predictive_weights(&self, constraints: &[f64]) -> Result<Vec<f64>> {
        let extra = self.extra_counts(constraints)?;
        Ok(self
            .stats
            .counts
            .iter()
            .zip(&extra)
            .map(|(&c, &e)| (c + e) as f64 + self.hypers.alpha)
            .collect())
    }

    /// Normalized posterior predictive probabilities.
    pub fn predictive_probabilities(&self, constraints: &[f64]) -> Result<Vec<f64>> {
        let weights = self.predictive_weights(constraints)?;
        let total: f64 = weights.iter().sum();
        Ok(weights.into_iter().map(|w| w / total).collect())
    }
}

impl ComponentModel for CategoricalComponent {
    fn family(&self) -> ModelFamily {
        ModelFamily::Categorical
    }

    fn insert(&mut self, value: f64) -> Result<()> {
        if let Some(code) = self.hypers.code(value)? {
            self.stats.counts[code] += 1;
        }
        Ok(())
    }

    fn remove(&mut self, value: f64) -> Result<()> {
        if let Some(code) = self.hypers.code(value)? {
            if self.stats.counts[code] == 0 {
                return Err(CrossCatError::InvalidState(format!(
                    "cannot remove category {} with zero count",
                    code
                )));
            }
            self.stats.counts[code] -= 1;
        }
        Ok(())
    }

    fn predictive_logp(&self, value: f64, constraints: &[f64]) -> Result<f64> {
        let Some(code) = self.hypers.code(value)? else {
            return Ok(0.0);
        };
        let weights = self.predictive_weights(constraints)?;
        let total: f64 = weights.iter().sum();
        ensure_finite(
            weights[code].ln() - total.ln(),
            "categorical predictive log probability",
        )
    }

    fn draw(&self, rng: &mut dyn RngCore, constraints: &[f64]) -> Result<f64> {
        let weights = self.predictive_weights(constraints)?;
        let index = WeightedIndex::new(&weights).map_err(|e| {
            CrossCatError::NumericDegeneracy(format!("invalid categorical weights: {}", e))
        })?;
        Ok(index.sample(rng) as f64)
    }

    fn marginal_logp(&self) -> Result<f64> {
        let k = self.hypers.k as f64;
        let alpha = self.hypers.alpha;
        let n = self.stats.n() as f64;

        let per_category: f64 = self
            .stats
            .counts
            .iter()
            .map(|&c| ln_gamma(c as f64 + alpha) - ln_gamma(alpha))
            .sum();
        ensure_finite(
            ln_gamma(k * alpha) - ln_gamma(n + k * alpha) + per_category,
            "categorical marginal log likelihood",
        )
    }
}
