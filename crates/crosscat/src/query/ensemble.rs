//! Queries averaged over an ensemble of independent chains.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::analysis::{self, MutualInformation};
use crate::config::EngineConfig;
use crate::error::{CrossCatError, Result};
use crate::model::Hypers;
use crate::schema::{ModelFamily, TableSchema};
use crate::state::Chain;

use super::engine::{PredictiveEngine, check_draw_count, summarize_draws};
use super::types::{Cell, Imputation, Observation};

/// Split `n` draws over `n_chains` chains as evenly as possible, giving the
/// remainder to the first chains.
///
/// ```
/// assert_eq!(crosscat::split_draws(10, 3), vec![4, 3, 3]);
/// ```
pub fn split_draws(n: usize, n_chains: usize) -> Vec<usize> {
    if n_chains == 0 {
        return Vec::new();
    }
    let (base, remainder) = (n / n_chains, n % n_chains);
    (0..n_chains)
        .map(|chain| base + usize::from(chain < remainder))
        .collect()
}

/// One seed per chain, derived in chain order from a base seed.
pub fn chain_seeds(seed: u64, n_chains: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_chains).map(|_| rng.next_u64()).collect()
}

/// Every column must have the same family in both chains, and categorical
/// columns the same number of categories.
fn check_same_domains(first: &Chain, chain: &Chain, index: usize) -> Result<()> {
    for (col, (expected, actual)) in first
        .latent
        .column_hypers
        .iter()
        .zip(&chain.latent.column_hypers)
        .enumerate()
    {
        let agree = match (expected, actual) {
            (Hypers::Gaussian(_), Hypers::Gaussian(_)) => true,
            (Hypers::Categorical(a), Hypers::Categorical(b)) => a.k == b.k,
            _ => false,
        };
        if !agree {
            return Err(CrossCatError::InconsistentEnsemble(format!(
                "chain {} models column {} as {}, chain 0 as {}",
                index,
                col,
                describe(actual),
                describe(expected)
            )));
        }
    }
    Ok(())
}

fn describe(hypers: &Hypers) -> String {
    match hypers {
        Hypers::Gaussian(_) => "gaussian".to_string(),
        Hypers::Categorical(h) => format!("categorical with {} categories", h.k),
    }
}

/// An ensemble of chains sharing one schema and table shape.
///
/// Chains are evaluated independently, in parallel over the rayon pool when
/// [`EngineConfig::parallel`] is set, and reduced in chain order so
/// parallel and sequential runs agree bit for bit.
#[derive(Debug, Clone)]
pub struct Ensemble<'a> {
    schema: &'a TableSchema,
    chains: &'a [Chain],
    config: EngineConfig,
}

impl<'a> Ensemble<'a> {
    /// Create an ensemble, checking that every chain is valid and that all
    /// chains agree on the table shape.
    pub fn new(schema: &'a TableSchema, chains: &'a [Chain]) -> Result<Self> {
        let first = chains.first().ok_or_else(|| {
            CrossCatError::InconsistentEnsemble("ensemble holds no chains".to_string())
        })?;
        for (index, chain) in chains.iter().enumerate() {
            if chain.num_rows() != first.num_rows() || chain.num_columns() != first.num_columns() {
                return Err(CrossCatError::InconsistentEnsemble(format!(
                    "chain {} is {}x{} but chain 0 is {}x{}",
                    index,
                    chain.num_rows(),
                    chain.num_columns(),
                    first.num_rows(),
                    first.num_columns()
                )));
            }
            chain.validate(schema).map_err(|e| {
                CrossCatError::InconsistentEnsemble(format!("chain {}: {}", index, e))
            })?;
            check_same_domains(first, chain, index)?;
        }

        debug!(chains = chains.len(), rows = first.num_rows(), "ensemble ready");
        Ok(Self {
            schema,
            chains,
            config: EngineConfig::default(),
        })
    }

    /// Replace the ensemble configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn schema(&self) -> &TableSchema {
        self.schema
    }

    pub fn chains(&self) -> &[Chain] {
        self.chains
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn num_chains(&self) -> usize {
        self.chains.len()
    }

    /// Number of rows in the trained table.
    pub fn num_rows(&self) -> usize {
        self.chains[0].num_rows()
    }

    /// Single-chain engine sharing this ensemble's configuration.
    pub fn engine(&self, index: usize) -> Result<PredictiveEngine<'a>> {
        let chain = self.chains.get(index).ok_or_else(|| {
            CrossCatError::InvalidQuery(format!(
                "chain {} out of range ({} chains)",
                index,
                self.chains.len()
            ))
        })?;
        Ok(PredictiveEngine::from_validated(
            self.schema,
            chain,
            self.config.clone(),
        ))
    }

    /// Run `f` once per chain, in parallel when configured, collecting the
    /// results in chain order. The first error fails the whole call.
    fn map_chains<T, F>(&self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize, PredictiveEngine<'a>) -> Result<T> + Sync + Send,
    {
        let run = |index: usize| {
            let engine =
                PredictiveEngine::from_validated(self.schema, &self.chains[index], self.config.clone());
            f(index, engine)
        };
        if self.config.parallel {
            (0..self.chains.len()).into_par_iter().map(run).collect()
        } else {
            (0..self.chains.len()).map(run).collect()
        }
    }

    /// Draw `n` rows in total, split across chains and concatenated in
    /// chain order.
    pub fn simple_predictive_sample(
        &self,
        constraints: &[Observation],
        query: &[Cell],
        n: usize,
        seed: u64,
    ) -> Result<Vec<Vec<f64>>> {
        check_draw_count(n)?;
        let counts = split_draws(n, self.num_chains());
        let seeds = chain_seeds(seed, self.num_chains());
        debug!(n, chains = self.num_chains(), seed, "ensemble predictive sample");

        let per_chain = self.map_chains(|index, engine| {
            let mut rng = StdRng::seed_from_u64(seeds[index]);
            engine.sample_with_rng(constraints, query, counts[index], &mut rng)
        })?;
        Ok(per_chain.into_iter().flatten().collect())
    }

    /// Per-query log probability averaged over chains in probability space.
    pub fn simple_predictive_probability(
        &self,
        constraints: &[Observation],
        queries: &[Observation],
    ) -> Result<Vec<f64>> {
        let per_chain = self.map_chains(|_, engine| {
            engine.simple_predictive_probability(constraints, queries)
        })?;
        Ok((0..queries.len())
            .map(|q| {
                let lps: Vec<f64> = per_chain.iter().map(|lps| lps[q]).collect();
                self.average_logp(&lps)
            })
            .collect())
    }

    /// Joint log probability of cells of one row, averaged over chains.
    pub fn joint_predictive_probability(
        &self,
        constraints: &[Observation],
        queries: &[Observation],
    ) -> Result<f64> {
        let per_chain = self.map_chains(|_, engine| {
            engine.joint_predictive_probability(constraints, queries)
        })?;
        Ok(self.average_logp(&per_chain))
    }

    fn average_logp(&self, lps: &[f64]) -> f64 {
        crate::numeric::logsumexp(lps) - (lps.len() as f64).ln()
    }

    /// Impute a cell from `n` draws pooled across chains.
    pub fn impute(
        &self,
        constraints: &[Observation],
        cell: Cell,
        n: usize,
        seed: u64,
    ) -> Result<f64> {
        Ok(self.impute_and_confidence(constraints, cell, n, seed)?.value)
    }

    /// Impute a cell from `n` pooled draws and report the agreeing fraction.
    ///
    /// The Gaussian confidence band uses the column's population standard
    /// deviation averaged over chains.
    pub fn impute_and_confidence(
        &self,
        constraints: &[Observation],
        cell: Cell,
        n: usize,
        seed: u64,
    ) -> Result<Imputation> {
        check_draw_count(n)?;
        let n_chains = self.num_chains();
        let counts = split_draws(n, n_chains);
        // One extra seed drives the tie-break after pooling.
        let seeds = chain_seeds(seed, n_chains + 1);
        debug!(row = cell.row, col = cell.col, n, chains = n_chains, "ensemble impute");

        let family = self.schema.family(cell.col)?;
        let per_chain = self.map_chains(|index, engine| {
            let mut rng = StdRng::seed_from_u64(seeds[index]);
            engine.sample_with_rng(constraints, &[cell], counts[index], &mut rng)
        })?;
        let draws: Vec<f64> = per_chain.into_iter().flatten().flatten().collect();

        let spread = match family {
            ModelFamily::Gaussian => {
                let mut total = 0.0;
                for chain in self.chains {
                    total += chain.column_population_std(cell.col)?;
                }
                total / n_chains as f64
            }
            ModelFamily::Categorical => 0.0,
        };
        let mut rng = StdRng::seed_from_u64(seeds[n_chains]);
        summarize_draws(family, &draws, spread, self.config.confidence_band, &mut rng)
    }

    /// Monte Carlo mutual information of every column pair in every chain.
    pub fn mutual_information(
        &self,
        pairs: &[(usize, usize)],
        n_samples: usize,
        seed: u64,
    ) -> Result<Vec<MutualInformation>> {
        check_draw_count(n_samples)?;
        for &(a, b) in pairs {
            self.check_column(a)?;
            self.check_column(b)?;
        }
        let seeds = chain_seeds(seed, self.num_chains());
        debug!(pairs = pairs.len(), n_samples, chains = self.num_chains(), "mutual information");

        let per_chain = self.map_chains(|index, engine| {
            let mut rng = StdRng::seed_from_u64(seeds[index]);
            pairs
                .iter()
                .map(|&(a, b)| {
                    analysis::chain_mutual_information(
                        engine.schema(),
                        engine.chain(),
                        a,
                        b,
                        n_samples,
                        &mut rng,
                    )
                })
                .collect::<Result<Vec<f64>>>()
        })?;

        pairs
            .iter()
            .enumerate()
            .map(|(p, &(col_a, col_b))| {
                MutualInformation::new(col_a, col_b, per_chain.iter().map(|mi| mi[p]).collect())
            })
            .collect()
    }

    /// See [`analysis::row_structural_typicality`].
    pub fn row_structural_typicality(&self, row: usize) -> Result<f64> {
        analysis::row_structural_typicality(self.chains, row)
    }

    /// See [`analysis::column_structural_typicality`].
    pub fn column_structural_typicality(&self, col: usize) -> Result<f64> {
        analysis::column_structural_typicality(self.chains, col)
    }

    /// See [`analysis::similarity`].
    pub fn similarity(
        &self,
        given_row: usize,
        target_row: usize,
        target_columns: Option<&[usize]>,
    ) -> Result<f64> {
        analysis::similarity(self.chains, given_row, target_row, target_columns)
    }

    /// See [`analysis::dependence_probability`].
    pub fn dependence_probability(&self, col_a: usize, col_b: usize) -> Result<f64> {
        analysis::dependence_probability(self.chains, col_a, col_b)
    }

    fn check_column(&self, col: usize) -> Result<()> {
        if col >= self.schema.column_count() {
            return Err(CrossCatError::InvalidQuery(format!(
                "column {} out of range (table has {} columns)",
                col,
                self.schema.column_count()
            )));
        }
        Ok(())
    }
}
