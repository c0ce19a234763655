//! Conjugate component models and the cluster model factory.
//!
//! Every (view, cluster, column) cell of a CrossCat state is governed by a
//! component model built from cached sufficient statistics. Models are
//! constructed per call and discarded afterwards; constrained queries fold
//! extra values into an effective posterior without touching the statistics.

mod categorical;
mod factory;
mod gaussian;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};
use crate::schema::ModelFamily;

pub use categorical::{CategoricalComponent, CategoricalHypers, CategoricalStats};
pub use factory::{ClusterModelFactory, ClusterModels};
pub use gaussian::{GaussianComponent, GaussianHypers, GaussianPosterior, GaussianStats};

/// A conjugate-Bayesian distribution for one column within one cluster.
///
/// NaN is the missing-value sentinel: inserting or removing it is a no-op,
/// it is skipped in constraint lists, and its predictive log density is zero.
pub trait ComponentModel {
    /// Model family of this component.
    fn family(&self) -> ModelFamily;

    /// Add a value to the sufficient statistics.
    fn insert(&mut self, value: f64) -> Result<()>;

    /// Remove a previously inserted value from the sufficient statistics.
    fn remove(&mut self, value: f64) -> Result<()>;

    /// Posterior predictive log density of `value`, given the cached
    /// statistics plus `constraints`.
    fn predictive_logp(&self, value: f64, constraints: &[f64]) -> Result<f64>;

    /// Draw a value from the posterior predictive given `constraints`.
    fn draw(&self, rng: &mut dyn RngCore, constraints: &[f64]) -> Result<f64>;

    /// Marginal log likelihood of every inserted value.
    fn marginal_logp(&self) -> Result<f64>;
}

/// Hyperparameters of a column, tagged by model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Hypers {
    Gaussian(GaussianHypers),
    Categorical(CategoricalHypers),
}

impl Hypers {
    pub fn family(&self) -> ModelFamily {
        match self {
            Hypers::Gaussian(_) => ModelFamily::Gaussian,
            Hypers::Categorical(_) => ModelFamily::Categorical,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Hypers::Gaussian(h) => h.validate(),
            Hypers::Categorical(h) => h.validate(),
        }
    }

    /// Check that `value` can be held by a column with these hypers.
    pub fn check_value(&self, value: f64) -> Result<()> {
        match self {
            Hypers::Gaussian(_) if value.is_infinite() => Err(CrossCatError::InvalidQuery(
                format!("Gaussian value {} is not finite", value),
            )),
            Hypers::Gaussian(_) => Ok(()),
            Hypers::Categorical(h) => h.code(value).map(|_| ()),
        }
    }
}

/// Cached sufficient statistics of one column within one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum SufficientStats {
    Gaussian(GaussianStats),
    Categorical(CategoricalStats),
}

impl SufficientStats {
    /// Zero statistics matching a column's hypers.
    pub fn empty(hypers: &Hypers) -> Self {
        match hypers {
            Hypers::Gaussian(_) => SufficientStats::Gaussian(GaussianStats::default()),
            Hypers::Categorical(h) => SufficientStats::Categorical(CategoricalStats::empty(h.k)),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            SufficientStats::Gaussian(_) => ModelFamily::Gaussian,
            SufficientStats::Categorical(_) => ModelFamily::Categorical,
        }
    }

    /// Number of non-missing observations.
    pub fn count(&self) -> usize {
        match self {
            SufficientStats::Gaussian(s) => s.n,
            SufficientStats::Categorical(s) => s.n(),
        }
    }
}

/// A component model of either family.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Gaussian(GaussianComponent),
    Categorical(CategoricalComponent),
}

impl Component {
    /// Build a component from hypers and cached statistics of the same family.
    pub fn new(hypers: &Hypers, stats: &SufficientStats) -> Result<Self> {
        match (hypers, stats) {
            (Hypers::Gaussian(h), SufficientStats::Gaussian(s)) => {
                Ok(Component::Gaussian(GaussianComponent::new(*h, *s)))
            }
            (Hypers::Categorical(h), SufficientStats::Categorical(s)) => Ok(
                Component::Categorical(CategoricalComponent::new(*h, s.clone())?),
            ),
            _ => Err(CrossCatError::InvalidState(format!(
                "{} hypers paired with {} statistics",
                hypers.family(),
                stats.family()
            ))),
        }
    }

    /// A prior-only component with zero statistics.
    pub fn prior(hypers: &Hypers) -> Self {
        match hypers {
            Hypers::Gaussian(h) => Component::Gaussian(GaussianComponent::prior(*h)),
            Hypers::Categorical(h) => Component::Categorical(CategoricalComponent::prior(*h)),
        }
    }

    /// Snapshot of the current sufficient statistics.
    pub fn stats(&self) -> SufficientStats {
        match self {
            Component::Gaussian(c) => SufficientStats::Gaussian(*c.stats()),
            Component::Categorical(c) => SufficientStats::Categorical(c.stats().clone()),
        }
    }
}

impl ComponentModel for Component {
    fn family(&self) -> ModelFamily {
        match self {
            Component::Gaussian(c) => c.family(),
            Component::Categorical(c) => c.family(),
        }
    }

    fn insert(&mut self, value: f64) -> Result<()> {
        match self {
            Component::Gaussian(c) => c.insert(value),
            Component::Categorical(c) => c.insert(value),
        }
    }

    fn remove(&mut self, value: f64) -> Result<()> {
        match self {
            Component::Gaussian(c) => c.remove(value),
            Component::Categorical(c) => c.remove(value),
        }
    }

    fn predictive_logp(&self, value: f64, constraints: &[f64]) -> Result<f64> {
        match self {
            Component::Gaussian(c) => c.predictive_logp(value, constraints),
            Component::Categorical(c) => c.predictive_logp(value, constraints),
        }
    }

    fn draw(&self, rng: &mut dyn RngCore, constraints: &[f64]) -> Result<f64> {
        match self {
            Component::Gaussian(c) => c.draw(rng, constraints),
            Component::Categorical(c) => c.draw(rng, constraints),
        }
    }

    fn marginal_logp(&self) -> Result<f64> {
        match self {
            Component::Gaussian(c) => c.marginal_logp(),
            Component::Categorical(c) => c.marginal_logp(),
        }
    }
}

/// A row cluster within a view: one of the existing clusters, or the
/// prior-only cluster a row would open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cluster {
    Existing(usize),
    New,
}

impl Cluster {
    /// Interpret a positional index over `n_clusters` existing clusters
    /// followed by the new cluster.
    pub fn from_index(index: usize, n_clusters: usize) -> Result<Self> {
        if index < n_clusters {
            Ok(Cluster::Existing(index))
        } else if index == n_clusters {
            Ok(Cluster::New)
        } else {
            Err(CrossCatError::InvalidQuery(format!(
                "cluster index {} exceeds {} existing clusters plus one new",
                index, n_clusters
            )))
        }
    }

    /// Positional index of this cluster; `New` sits after the existing ones.
    pub fn index(&self, n_clusters: usize) -> usize {
        match self {
            Cluster::Existing(k) => *k,
            Cluster::New => n_clusters,
        }
    }

    /// Every existing cluster followed by the new one.
    pub fn all(n_clusters: usize) -> impl Iterator<Item = Cluster> {
        (0..n_clusters)
            .map(Cluster::Existing)
            .chain(std::iter::once(Cluster::New))
    }
}
