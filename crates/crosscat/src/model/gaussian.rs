//! Gaussian component under a Normal-Inverse-Gamma prior.

use std::f64::consts::PI;

use rand::RngCore;
use rand_distr::{Distribution, StudentT};
use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};
use crate::numeric::{ensure_finite, ln_gamma, student_t_logpdf};
use crate::schema::ModelFamily;

use super::ComponentModel;

/// Normal-Inverse-Gamma hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianHypers {
    /// Prior mean.
    pub mu: f64,
    /// Pseudo-count on the mean.
    pub kappa: f64,
    /// Shape of the precision prior.
    pub alpha: f64,
    /// Rate of the precision prior.
    pub beta: f64,
}

impl GaussianHypers {
    pub fn new(mu: f64, kappa: f64, alpha: f64, beta: f64) -> Result<Self> {
        let hypers = Self {
            mu,
            kappa,
            alpha,
            beta,
        };
        hypers.validate()?;
        Ok(hypers)
    }

    /// `mu` must be finite; `kappa`, `alpha` and `beta` must be positive.
    pub fn validate(&self) -> Result<()> {
        let positive = [self.kappa, self.alpha, self.beta]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if !self.mu.is_finite() || !positive {
            return Err(CrossCatError::InvalidState(format!(
                "invalid Gaussian hypers (mu={}, kappa={}, alpha={}, beta={})",
                self.mu, self.kappa, self.alpha, self.beta
            )));
        }
        Ok(())
    }
}

impl Default for GaussianHypers {
    fn default() -> Self {
        Self {
            mu: 0.0,
            kappa: 1.0,
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

/// Sufficient statistics of the observed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GaussianStats {
    pub n: usize,
    pub sum_x: f64,
    pub sum_x2: f64,
}

impl GaussianStats {
    /// Fold in the non-missing values of a slice.
    fn with_values(mut self, values: &[f64]) -> Self {
        for &x in values.iter().filter(|x| !x.is_nan()) {
            self.n += 1;
            self.sum_x += x;
            self.sum_x2 += x * x;
        }
        self
    }
}

/// Posterior NIG parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianPosterior {
    pub mu: f64,
    pub kappa: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl GaussianPosterior {
    /// Scale of the Student-t posterior predictive.
    pub fn predictive_scale(&self) -> f64 {
        (self.beta * (self.kappa + 1.0) / (self.alpha * self.kappa)).sqrt()
    }

    /// Degrees of freedom of the Student-t posterior predictive.
    pub fn predictive_df(&self) -> f64 {
        2.0 * self.alpha
    }
}

/// Gaussian component model for one column within one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianComponent {
    hypers: GaussianHypers,
    stats: GaussianStats,
}

impl GaussianComponent {
    pub fn new(hypers: GaussianHypers, stats: GaussianStats) -> Self {
        Self { hypers, stats }
    }

    /// A component with no observations.
    pub fn prior(hypers: GaussianHypers) -> Self {
        Self::new(hypers, GaussianStats::default())
    }

    pub fn hypers(&self) -> &GaussianHypers {
        &self.hypers
    }

    pub fn stats(&self) -> &GaussianStats {
        &self.stats
    }

    /// Effective posterior after folding `constraints` into the cached
    /// statistics. The cached statistics are left untouched.
    pub fn posterior(&self, constraints: &[f64]) -> Result<GaussianPosterior> {
        for &x in constraints {
            check_value(x)?;
        }
        let stats = self.stats.with_values(constraints);
        let h = &self.hypers;

        let n = stats.n as f64;
        let kappa = h.kappa + n;
        let mu = (h.kappa * h.mu + stats.sum_x) / kappa;
        let alpha = h.alpha + n / 2.0;
        let beta = h.beta + 0.5 * (stats.sum_x2 + h.kappa * h.mu * h.mu - kappa * mu * mu);

        if !(beta > 0.0) {
            return Err(CrossCatError::NumericDegeneracy(format!(
                "posterior beta {} is not positive",
                beta
            )));
        }

        Ok(GaussianPosterior {
            mu,
            kappa,
            alpha,
            beta,
        })
    }
}

/// Gaussian values must be finite or the NaN missing sentinel.
fn check_value(x: f64) -> Result<()> {
    if x.is_infinite() {
        return Err(CrossCatError::InvalidQuery(format!(
            "Gaussian value {} is not finite",
            x
        )));
    }
    Ok(())
}

impl ComponentModel for GaussianComponent {
    fn family(&self) -> ModelFamily {
        ModelFamily::Gaussian
    }

    fn insert(&mut self, value: f64) -> Result<()> {
        check_value(value)?;
        if value.is_nan() {
            return Ok(());
        }
        self.stats.n += 1;
        self.stats.sum_x += value;
        self.stats.sum_x2 += value * value;
        Ok(())
    }

    fn remove(&mut self, value: f64) -> Result<()> {
        check_value(value)?;
        if value.is_nan() {
            return Ok(());
        }
        if self.stats.n == 0 {
            return Err(CrossCatError::InvalidState(
                "cannot remove a value from an empty Gaussian component".to_string(),
            ));
        }
        self.stats.n -= 1;
        self.stats.sum_x -= value;
        self.stats.sum_x2 -= value * value;
        Ok(())
    }

    fn predictive_logp(&self, value: f64, constraints: &[f64]) -> Result<f64> {
        check_value(value)?;
        if value.is_nan() {
            return Ok(0.0);
        }
        let post = self.posterior(constraints)?;
        let lp = student_t_logpdf(
            value,
            post.mu,
            post.predictive_scale(),
            post.predictive_df(),
        );
        ensure_finite(lp, "Gaussian predictive log density")
    }

    fn draw(&self, rng: &mut dyn RngCore, constraints: &[f64]) -> Result<f64> {
        let post = self.posterior(constraints)?;
        let t = StudentT::new(post.predictive_df()).map_err(|e| {
            CrossCatError::NumericDegeneracy(format!("invalid Student-t: {}", e))
        })?;
        let x = post.mu + post.predictive_scale() * t.sample(rng);
        ensure_finite(x, "Gaussian draw")
    }

    fn marginal_logp(&self) -> Result<f64> {
        let h = &self.hypers;
        let post = self.posterior(&[])?;
        let n = self.stats.n as f64;

        let lp = ln_gamma(post.alpha) - ln_gamma(h.alpha) + h.alpha * h.beta.ln()
            - post.alpha * post.beta.ln()
            + 0.5 * (h.kappa.ln() - post.kappa.ln())
            - 0.5 * n * (2.0 * PI).ln();
        ensure_finite(lp, "Gaussian marginal log likelihood")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reference_component() -> GaussianComponent {
        GaussianComponent::new(
            GaussianHypers::default(),
            GaussianStats {
                n: 10,
                sum_x: 20.0,
                sum_x2: 45.0,
            },
        )
    }

    #[test]
    fn test_posterior_update() {
        let post = reference_component().posterior(&[]).unwrap();
        assert_eq!(post.kappa, 11.0);
        assert!((post.mu - 20.0 / 11.0).abs() < 1e-12);
        assert_eq!(post.alpha, 6.0);
        assert!((post.beta - (1.0 + 0.5 * (45.0 - 400.0 / 11.0))).abs() < 1e-12);
    }

    #[test]
    fn test_predictive_logp_closed_form() {
        let lp = reference_component().predictive_logp(2.0, &[]).unwrap();
        assert!((lp - (-0.941432)).abs() < 1e-4, "got {}", lp);
    }

    #[test]
    fn test_constraints_do_not_mutate_stats() {
        let cpnt = reference_component();
        let before = *cpnt.stats();
        let with = cpnt.predictive_logp(2.0, &[2.0, 2.1]).unwrap();
        let without = cpnt.predictive_logp(2.0, &[]).unwrap();
        assert_eq!(*cpnt.stats(), before);
        assert!(with > without);
    }

    #[test]
    fn test_folding_equals_inserting() {
        let mut inserted = reference_component();
        inserted.insert(3.0).unwrap();
        let folded = reference_component().predictive_logp(1.0, &[3.0]).unwrap();
        let direct = inserted.predictive_logp(1.0, &[]).unwrap();
        assert!((folded - direct).abs() < 1e-12);
    }

    #[test]
    fn test_nan_is_a_no_op() {
        let mut cpnt = reference_component();
        cpnt.insert(f64::NAN).unwrap();
        cpnt.remove(f64::NAN).unwrap();
        assert_eq!(cpnt.stats().n, 10);
        assert_eq!(cpnt.predictive_logp(f64::NAN, &[]).unwrap(), 0.0);
        let folded = cpnt.predictive_logp(2.0, &[f64::NAN]).unwrap();
        assert_eq!(folded, cpnt.predictive_logp(2.0, &[]).unwrap());
    }

    #[test]
    fn test_insert_remove_round_trip() {
        let mut cpnt = GaussianComponent::prior(GaussianHypers::default());
        cpnt.insert(1.5).unwrap();
        cpnt.insert(-0.5).unwrap();
        cpnt.remove(1.5).unwrap();
        assert_eq!(cpnt.stats().n, 1);
        assert!((cpnt.stats().sum_x - (-0.5)).abs() < 1e-12);
        cpnt.remove(-0.5).unwrap();
        assert!(cpnt.remove(1.0).is_err());
    }

    #[test]
    fn test_marginal_chain_rule() {
        // log p(x1, x2) = log p(x1) + log p(x2 | x1)
        let prior = GaussianComponent::prior(GaussianHypers::default());
        let lp1 = prior.predictive_logp(0.7, &[]).unwrap();
        let lp2 = prior.predictive_logp(-1.2, &[0.7]).unwrap();

        let mut cpnt = prior.clone();
        cpnt.insert(0.7).unwrap();
        cpnt.insert(-1.2).unwrap();
        let marginal = cpnt.marginal_logp().unwrap();
        assert!((marginal - (lp1 + lp2)).abs() < 1e-10);
        assert_eq!(prior.marginal_logp().unwrap(), 0.0);
    }

    #[test]
    fn test_infinite_values_rejected() {
        let mut cpnt = reference_component();
        assert!(matches!(
            cpnt.insert(f64::INFINITY),
            Err(CrossCatError::InvalidQuery(_))
        ));
        assert!(cpnt.predictive_logp(f64::NEG_INFINITY, &[]).is_err());
        assert!(cpnt.predictive_logp(1.0, &[f64::INFINITY]).is_err());
    }

    #[test]
    fn test_draws_concentrate_near_posterior_mean() {
        let cpnt = GaussianComponent::new(
            GaussianHypers::default(),
            GaussianStats {
                n: 1000,
                sum_x: 5000.0,
                sum_x2: 25_250.0,
            },
        );
        let mut rng = StdRng::seed_from_u64(11);
        let draws: Vec<f64> = (0..2000).map(|_| cpnt.draw(&mut rng, &[]).unwrap()).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - 5.0).abs() < 0.2, "mean {}", mean);
    }

    #[test]
    fn test_hypers_validation() {
        assert!(GaussianHypers::new(0.0, 1.0, 1.0, 1.0).is_ok());
        assert!(GaussianHypers::new(0.0, 0.0, 1.0, 1.0).is_err());
        assert!(GaussianHypers::new(f64::NAN, 1.0, 1.0, 1.0).is_err());
    }
}
