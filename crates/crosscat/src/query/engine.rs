//! Posterior predictive queries against a single chain.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{CrossCatError, Result};
use crate::model::{Cluster, ClusterModelFactory, ClusterModels, ComponentModel};
use crate::numeric::{ensure_finite, logsumexp, median, sample_log_weights};
use crate::schema::{ModelFamily, TableSchema};
use crate::state::Chain;

use super::sampler::log_cluster_weights;
use super::types::{Cell, Imputation, Observation};

/// Answers sampling, probability and imputation queries for one chain.
///
/// Queried rows below the chain's row count are observed: their cluster in
/// every view is fixed by the assignment. Rows at or beyond it are
/// hypothetical and get a cluster drawn from the CRP mixture weights.
///
/// # Example
///
/// ```
/// use crosscat::{Cell, ChainBuilder, ColumnSchema, DataTable, PredictiveEngine, TableSchema};
///
/// let schema = TableSchema::with_columns(vec![ColumnSchema::gaussian("x")]);
/// let table = DataTable::from_rows(vec![vec![1.0], vec![1.2], vec![0.9]]).unwrap();
/// let chain = ChainBuilder::new(&schema, &table).build().unwrap();
///
/// let engine = PredictiveEngine::new(&schema, &chain).unwrap();
/// let draws = engine
///     .simple_predictive_sample(&[], &[Cell::new(3, 0)], 5, 42)
///     .unwrap();
/// assert_eq!(draws.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct PredictiveEngine<'a> {
    schema: &'a TableSchema,
    chain: &'a Chain,
    config: EngineConfig,
}

/// Cluster models of one view prepared for repeated draws.
struct ViewPlan {
    models: Vec<ClusterModels>,
    /// Mixture weights for a hypothetical row; `None` when the row's
    /// cluster is fixed and `models` holds that cluster alone.
    log_weights: Option<Vec<f64>>,
}

impl ViewPlan {
    fn choose(&self, rng: &mut dyn RngCore) -> Result<usize> {
        match &self.log_weights {
            Some(log_weights) => sample_log_weights(rng, log_weights),
            None => Ok(0),
        }
    }
}

impl<'a> PredictiveEngine<'a> {
    /// Create an engine over a chain, checking it against the schema.
    pub fn new(schema: &'a TableSchema, chain: &'a Chain) -> Result<Self> {
        chain.validate(schema)?;
        Ok(Self::from_validated(schema, chain, EngineConfig::default()))
    }

    pub(crate) fn from_validated(
        schema: &'a TableSchema,
        chain: &'a Chain,
        config: EngineConfig,
    ) -> Self {
        Self {
            schema,
            chain,
            config,
        }
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn schema(&self) -> &TableSchema {
        self.schema
    }

    pub fn chain(&self) -> &Chain {
        self.chain
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Draw `n` rows of values for the queried cells of a single row, in
    /// query order, conditioned on `constraints`.
    pub fn simple_predictive_sample(
        &self,
        constraints: &[Observation],
        query: &[Cell],
        n: usize,
        seed: u64,
    ) -> Result<Vec<Vec<f64>>> {
        check_draw_count(n)?;
        debug!(cells = query.len(), n, seed, "simple predictive sample");
        let mut rng = StdRng::seed_from_u64(seed);
        self.sample_with_rng(constraints, query, n, &mut rng)
    }

    pub(crate) fn sample_with_rng(
        &self,
        constraints: &[Observation],
        query: &[Cell],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<f64>>> {
        self.check_constraints(constraints)?;
        let row = single_row(query.iter().map(|cell| cell.row))?;
        for cell in query {
            self.check_column(cell.col)?;
        }

        let mut views: IndexMap<usize, Vec<usize>> = IndexMap::new();
        let mut slots = Vec::with_capacity(query.len());
        for cell in query {
            let view = self.chain.view_of(cell.col)?;
            let entry = views.entry(view);
            slots.push(entry.index());
            entry.or_default().push(cell.col);
        }

        let plans = views
            .iter()
            .map(|(&view, columns)| self.view_plan(constraints, row, view, columns))
            .collect::<Result<Vec<_>>>()?;
        let folds = query
            .iter()
            .map(|cell| self.fold_values(constraints, row, cell.col))
            .collect::<Result<Vec<_>>>()?;

        let mut draws = Vec::with_capacity(n);
        let mut chosen = vec![0usize; plans.len()];
        for _ in 0..n {
            for (choice, plan) in chosen.iter_mut().zip(&plans) {
                *choice = plan.choose(rng)?;
            }
            let mut draw = Vec::with_capacity(query.len());
            for ((cell, &slot), folded) in query.iter().zip(&slots).zip(&folds) {
                let models = &plans[slot].models[chosen[slot]];
                draw.push(models[&cell.col].draw(rng, folded)?);
            }
            draws.push(draw);
        }
        Ok(draws)
    }

    /// `log p(value | constraints)` of every query, each evaluated on its own.
    pub fn simple_predictive_probability(
        &self,
        constraints: &[Observation],
        queries: &[Observation],
    ) -> Result<Vec<f64>> {
        debug!(queries = queries.len(), "simple predictive probability");
        self.check_constraints(constraints)?;
        for query in queries {
            self.check_observation(query)?;
        }
        queries
            .iter()
            .map(|query| self.view_logp(constraints, query.row, &[*query]))
            .collect()
    }

    /// `log p(x_1, ..., x_m | constraints)` for several distinct columns of
    /// one row. Views factorize; within a view the cells share a cluster.
    pub fn joint_predictive_probability(
        &self,
        constraints: &[Observation],
        queries: &[Observation],
    ) -> Result<f64> {
        debug!(queries = queries.len(), "joint predictive probability");
        self.check_constraints(constraints)?;
        let row = single_row(queries.iter().map(|query| query.row))?;

        let mut views: IndexMap<usize, Vec<Observation>> = IndexMap::new();
        let mut seen = Vec::with_capacity(queries.len());
        for query in queries {
            self.check_observation(query)?;
            if seen.contains(&query.col) {
                return Err(CrossCatError::InvalidQuery(format!(
                    "column {} appears twice in a joint query",
                    query.col
                )));
            }
            seen.push(query.col);
            views
                .entry(self.chain.view_of(query.col)?)
                .or_default()
                .push(*query);
        }

        let mut total = 0.0;
        for cells in views.values() {
            total += self.view_logp(constraints, row, cells)?;
        }
        ensure_finite(total, "joint predictive log probability")
    }

    /// Impute a cell from `n` draws: the median for Gaussian columns, the
    /// mode for categorical ones.
    pub fn impute(
        &self,
        constraints: &[Observation],
        cell: Cell,
        n: usize,
        seed: u64,
    ) -> Result<f64> {
        Ok(self.impute_and_confidence(constraints, cell, n, seed)?.value)
    }

    /// Impute a cell and report the fraction of draws that agree with the
    /// imputed value.
    pub fn impute_and_confidence(
        &self,
        constraints: &[Observation],
        cell: Cell,
        n: usize,
        seed: u64,
    ) -> Result<Imputation> {
        check_draw_count(n)?;
        debug!(row = cell.row, col = cell.col, n, seed, "impute");
        let mut rng = StdRng::seed_from_u64(seed);
        let draws: Vec<f64> = self
            .sample_with_rng(constraints, &[cell], n, &mut rng)?
            .into_iter()
            .flatten()
            .collect();

        let family = self.schema.family(cell.col)?;
        let spread = match family {
            ModelFamily::Gaussian => self.chain.column_population_std(cell.col)?,
            ModelFamily::Categorical => 0.0,
        };
        summarize_draws(family, &draws, spread, self.config.confidence_band, &mut rng)
    }

    /// Log probability of cells of one row that share a view, summed over
    /// that view's cells.
    fn view_logp(&self, constraints: &[Observation], row: usize, cells: &[Observation]) -> Result<f64> {
        let view = self.chain.view_of(cells[0].col)?;
        let columns: Vec<usize> = cells.iter().map(|cell| cell.col).collect();
        let folds = columns
            .iter()
            .map(|&col| self.fold_values(constraints, row, col))
            .collect::<Result<Vec<_>>>()?;
        let plan = self.view_plan(constraints, row, view, &columns)?;

        let cell_logp = |models: &ClusterModels| -> Result<f64> {
            let mut lp = 0.0;
            for (cell, folded) in cells.iter().zip(&folds) {
                lp += models[&cell.col].predictive_logp(cell.value, folded)?;
            }
            Ok(lp)
        };

        let lp = match &plan.log_weights {
            None => cell_logp(&plan.models[0])?,
            Some(log_weights) => {
                let mut terms = Vec::with_capacity(log_weights.len());
                for (lw, models) in log_weights.iter().zip(&plan.models) {
                    terms.push(lw + cell_logp(models)?);
                }
                logsumexp(&terms) - logsumexp(log_weights)
            }
        };
        ensure_finite(lp, "predictive log probability")
    }

    /// Cluster models of `columns` for `row` in `view`.
    fn view_plan(
        &self,
        constraints: &[Observation],
        row: usize,
        view: usize,
        columns: &[usize],
    ) -> Result<ViewPlan> {
        let factory = ClusterModelFactory::new(self.schema, self.chain);
        match self.chain.cluster_of(view, row)? {
            Some(k) => Ok(ViewPlan {
                models: vec![factory.cluster_model(view, Cluster::Existing(k), Some(columns))?],
                log_weights: None,
            }),
            None => {
                let log_weights = log_cluster_weights(self.schema, self.chain, constraints, row, view)?;
                trace!(view, row, clusters = log_weights.len(), "hypothetical row weights");
                Ok(ViewPlan {
                    models: factory.all_cluster_models(view, Some(columns))?,
                    log_weights: Some(log_weights),
                })
            }
        }
    }

    /// Constraint values folded into the component model of `(row, col)`.
    ///
    /// A hypothetical row only sees constraints on itself. An observed row
    /// also sees constraints on observed rows sharing its cluster.
    fn fold_values(&self, constraints: &[Observation], row: usize, col: usize) -> Result<Vec<f64>> {
        let view = self.chain.view_of(col)?;
        let cluster = self.chain.cluster_of(view, row)?;
        let mut values = Vec::new();
        for constraint in constraints {
            if constraint.col != col || constraint.value.is_nan() {
                continue;
            }
            let same_cluster = cluster.is_some()
                && self.chain.cluster_of(view, constraint.row)? == cluster;
            if constraint.row == row || same_cluster {
                values.push(constraint.value);
            }
        }
        Ok(values)
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

    fn check_observation(&self, observation: &Observation) -> Result<()> {
        self.check_column(observation.col)?;
        self.chain.hypers(observation.col)?.check_value(observation.value)
    }

    fn check_constraints(&self, constraints: &[Observation]) -> Result<()> {
        constraints
            .iter()
            .try_for_each(|constraint| self.check_observation(constraint))
    }
}

/// The single row addressed by a multi-cell query.
fn single_row(mut rows: impl Iterator<Item = usize>) -> Result<usize> {
    let first = rows
        .next()
        .ok_or_else(|| CrossCatError::InvalidQuery("query names no cells".to_string()))?;
    if let Some(other) = rows.find(|&row| row != first) {
        return Err(CrossCatError::InconsistentRowReference(format!(
            "query addresses rows {} and {}; one query must target a single row",
            first, other
        )));
    }
    Ok(first)
}

pub(crate) fn check_draw_count(n: usize) -> Result<()> {
    if n == 0 {
        return Err(CrossCatError::InvalidQuery(
            "number of draws must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Reduce imputation draws to a value and its confidence.
///
/// Gaussian draws impute the median, with confidence the fraction of draws
/// within `band * spread` of it. Categorical draws impute the mode, ties
/// broken uniformly at random, with confidence the mode's frequency.
pub(crate) fn summarize_draws(
    family: ModelFamily,
    draws: &[f64],
    spread: f64,
    band: f64,
    rng: &mut dyn RngCore,
) -> Result<Imputation> {
    if draws.is_empty() {
        return Err(CrossCatError::InvalidQuery(
            "cannot impute from zero draws".to_string(),
        ));
    }
    let total = draws.len() as f64;

    match family {
        ModelFamily::Gaussian => {
            let value = median(draws)
                .ok_or_else(|| CrossCatError::NumericDegeneracy("empty draw set".to_string()))?;
            let width = band * spread;
            let agreeing = draws.iter().filter(|&&x| (x - value).abs() <= width).count();
            Ok(Imputation {
                value,
                confidence: agreeing as f64 / total,
            })
        }
        ModelFamily::Categorical => {
            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for &x in draws {
                *counts.entry(x as usize).or_insert(0) += 1;
            }
            let best = counts.values().copied().max().unwrap_or(0);
            let modes: Vec<usize> = counts
                .iter()
                .filter(|&(_, &count)| count == best)
                .map(|(&code, _)| code)
                .collect();
            let mode = if modes.len() > 1 {
                modes[rng.gen_range(0..modes.len())]
            } else {
                modes[0]
            };
            Ok(Imputation {
                value: mode as f64,
                confidence: best as f64 / total,
            })
        }
    }
}
