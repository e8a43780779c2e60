//! Multi-group graded response estimation by EM marginal maximum likelihood
//!
//! The reference group's latent trait is fixed at N(0, 1); the focal group's
//! mean and standard deviation are estimated alongside item parameters. Items
//! in the invariance set share one parameter vector across groups, the rest
//! are estimated separately per group.

use itertools::Itertools;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::algorithm::irt::grm::{GrmItemParams, ItemMStep};
use crate::algorithm::ordinal::optimizer::{LbfgsOptimizer, ObjectiveFunction};
use crate::config::EstimatorConfig;
use crate::error::{AnalysisError, Result};
use crate::math::QuadratureGrid;
use crate::math::logistic::log_sum_exp;
use crate::models::invariance::{InvarianceSet, MIN_INVARIANT_ITEMS};
use crate::models::respondent::Respondent;
use crate::models::types::{Group, Item, N_CATEGORIES, N_ITEMS};
use crate::models::ResponseData;

/// Respondents per E-step work unit; fixed so partial sums combine in a fixed order
const E_STEP_CHUNK: usize = 256;

/// Floor on the focal-group latent standard deviation
const MIN_FOCAL_SD: f64 = 0.05;

/// Item calibrations after one M-step
struct MStepOutcome {
    items: Vec<ItemCalibration>,
    /// Items whose update failed and kept their previous parameters
    failed: Vec<Item>,
}

/// Calibrated parameters of one item in both groups
#[derive(Debug, Clone, Serialize)]
pub struct ItemCalibration {
    /// Item
    pub item: Item,
    /// Whether the item is constrained equal across groups
    pub invariant: bool,
    /// Parameters in the reference group
    pub reference: GrmItemParams,
    /// Parameters in the focal group
    pub focal: GrmItemParams,
}

impl ItemCalibration {
    /// Parameters for one group
    #[must_use]
    pub const fn params(&self, group: Group) -> &GrmItemParams {
        match group {
            Group::Reference => &self.reference,
            Group::Focal => &self.focal,
        }
    }

    fn max_abs_diff(&self, other: &Self) -> f64 {
        self.reference
            .max_abs_diff(&other.reference)
            .max(self.focal.max_abs_diff(&other.focal))
    }
}

/// A converged multi-group graded response model
#[derive(Debug, Clone, Serialize)]
pub struct GrmFit {
    /// Items constrained equal across groups
    pub invariance: InvarianceSet,
    /// Item parameters in questionnaire order
    pub items: Vec<ItemCalibration>,
    /// Focal-group latent mean (reference fixed at 0)
    pub focal_mean: f64,
    /// Focal-group latent standard deviation (reference fixed at 1)
    pub focal_sd: f64,
    /// Marginal log-likelihood at the final E-step
    pub log_likelihood: f64,
    /// EM iterations used
    pub iterations: usize,
}

impl GrmFit {
    /// Calibration of one item
    #[must_use]
    pub fn item(&self, item: Item) -> &ItemCalibration {
        &self.items[item.index()]
    }

    /// Latent mean and standard deviation of a group
    #[must_use]
    pub const fn latent_distribution(&self, group: Group) -> (f64, f64) {
        match group {
            Group::Reference => (0.0, 1.0),
            Group::Focal => (self.focal_mean, self.focal_sd),
        }
    }
}

/// Log category probabilities for every item, group and node
pub(crate) struct LogProbTable {
    n_nodes: usize,
    values: Vec<f64>,
}

impl LogProbTable {
    pub(crate) fn build(items: &[ItemCalibration], nodes: &[f64]) -> Self {
        let n_nodes = nodes.len();
        let mut values = Vec::with_capacity(N_ITEMS * 2 * n_nodes * N_CATEGORIES);
        for calibration in items {
            for group in Group::BOTH {
                let params = calibration.params(group);
                for &theta in nodes {
                    values.extend_from_slice(&params.log_category_probabilities(theta));
                }
            }
        }
        Self { n_nodes, values }
    }

    #[inline]
    const fn offset(&self, item: usize, group: usize) -> usize {
        (item * 2 + group) * self.n_nodes * N_CATEGORIES
    }

    /// Fill `out` with the normalized log posterior over nodes and return the
    /// log marginal likelihood of the respondent
    pub(crate) fn log_posterior(
        &self,
        respondent: &Respondent,
        log_prior: &[f64],
        out: &mut [f64],
    ) -> f64 {
        out.copy_from_slice(log_prior);
        let g = respondent.group.index();
        for (j, &x) in respondent.responses.iter().enumerate() {
            let base = self.offset(j, g) + usize::from(x);
            for (q, lp) in out.iter_mut().enumerate() {
                *lp += self.values[base + q * N_CATEGORIES];
            }
        }
        let marginal = log_sum_exp(out);
        for lp in out.iter_mut() {
            *lp -= marginal;
        }
        marginal
    }
}

/// Expected sufficient statistics of one E-step
struct ExpectedCounts {
    n_nodes: usize,
    /// Indexed by `(item * 2 + group) * n_nodes + node`
    counts: Vec<[f64; N_CATEGORIES]>,
    focal_posterior: Vec<f64>,
    log_likelihood: f64,
}

impl ExpectedCounts {
    fn zeros(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            counts: vec![[0.0; N_CATEGORIES]; N_ITEMS * 2 * n_nodes],
            focal_posterior: vec![0.0; n_nodes],
            log_likelihood: 0.0,
        }
    }

    fn merge(mut self, other: &Self) -> Self {
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            for k in 0..N_CATEGORIES {
                a[k] += b[k];
            }
        }
        for (a, b) in self.focal_posterior.iter_mut().zip(&other.focal_posterior) {
            *a += b;
        }
        self.log_likelihood += other.log_likelihood;
        self
    }

    fn slice(&self, item: usize, group: usize) -> &[[f64; N_CATEGORIES]] {
        let start = (item * 2 + group) * self.n_nodes;
        &self.counts[start..start + self.n_nodes]
    }

    fn pooled(&self, item: usize) -> Vec<[f64; N_CATEGORIES]> {
        self.slice(item, 0)
            .iter()
            .zip(self.slice(item, 1))
            .map(|(a, b)| std::array::from_fn(|k| a[k] + b[k]))
            .collect()
    }
}

/// EM estimator for the multi-group graded response model
#[derive(Debug, Clone)]
pub struct GradedResponseEstimator {
    config: EstimatorConfig,
    grid: QuadratureGrid,
    optimizer: LbfgsOptimizer,
}

impl GradedResponseEstimator {
    /// Create an estimator
    ///
    /// # Errors
    /// Returns `InputValidation` for an unusable quadrature specification.
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        let grid = QuadratureGrid::new(config.quadrature_points, config.quadrature_half_width)?;
        let optimizer = LbfgsOptimizer::new(config.optimizer.clone());
        Ok(Self {
            config,
            grid,
            optimizer,
        })
    }

    /// Quadrature grid shared by estimation and scoring
    #[must_use]
    pub const fn grid(&self) -> &QuadratureGrid {
        &self.grid
    }

    /// Estimator settings
    #[must_use]
    pub const fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Fit from data-driven start values
    pub fn fit(&self, data: &ResponseData, invariance: &InvarianceSet) -> Result<GrmFit> {
        self.fit_from(data, invariance, None)
    }

    /// Fit, optionally warm-started from an earlier solution
    ///
    /// # Errors
    /// `Identifiability` with fewer than two invariant items, `InputValidation`
    /// when a group-specific item has no response variance within a group, and
    /// `Convergence` when EM exhausts its iteration budget, naming any item
    /// whose M-step was still failing.
    pub fn fit_from(
        &self,
        data: &ResponseData,
        invariance: &InvarianceSet,
        start: Option<&GrmFit>,
    ) -> Result<GrmFit> {
        if !invariance.is_identified() {
            return Err(AnalysisError::Identifiability {
                invariant: invariance.len(),
                required: MIN_INVARIANT_ITEMS,
            });
        }
        for item in invariance.free_items() {
            for group in Group::BOTH {
                if data.is_constant(item, Some(group)) {
                    return Err(AnalysisError::validation(
                        format!("{item}, group {}", data.group_label(group)),
                        "group-specific item has no response variance within the group",
                    ));
                }
            }
        }

        let items = match start {
            Some(previous) => Self::warm_start(previous, invariance),
            None => self.cold_start(data, invariance),
        };
        let focal = start.map_or((0.0, 1.0), |s| (s.focal_mean, s.focal_sd));
        self.run_em(data, invariance, items, focal, |expected, current| {
            self.m_step(expected, current, invariance)
        })
    }

    /// EM iterations from `items`; convergence is only accepted on an
    /// iteration where every item's M-step succeeded
    fn run_em<M>(
        &self,
        data: &ResponseData,
        invariance: &InvarianceSet,
        mut items: Vec<ItemCalibration>,
        (mut focal_mean, mut focal_sd): (f64, f64),
        m_step: M,
    ) -> Result<GrmFit>
    where
        M: Fn(&ExpectedCounts, &[ItemCalibration]) -> Result<MStepOutcome>,
    {
        let n_focal = data.count_in(Group::Focal) as f64;
        let mut log_likelihood = f64::NEG_INFINITY;
        let mut failing: Vec<Item> = Vec::new();

        for iteration in 1..=self.config.max_em_iterations {
            let expected = self.e_step(data, &items, focal_mean, focal_sd);
            log_likelihood = expected.log_likelihood;
            if !log_likelihood.is_finite() {
                return Err(AnalysisError::Computation(format!(
                    "non-finite marginal log-likelihood at EM iteration {iteration} ({invariance})"
                )));
            }

            let MStepOutcome { items: updated, failed } = m_step(&expected, &items)?;
            if failed.len() == N_ITEMS {
                return Err(AnalysisError::Computation(format!(
                    "every M-step failed at EM iteration {iteration} ({invariance})"
                )));
            }
            failing = failed;

            let mut max_change = items
                .iter()
                .zip(&updated)
                .map(|(old, new)| old.max_abs_diff(new))
                .fold(0.0, f64::max);
            items = updated;

            if self.config.free_focal_distribution && n_focal > 0.0 {
                let weights: Vec<f64> = expected
                    .focal_posterior
                    .iter()
                    .map(|w| w / n_focal)
                    .collect();
                let (mean, var) = self.grid.moments(&weights);
                let sd = var.sqrt().max(MIN_FOCAL_SD);
                max_change = max_change
                    .max((mean - focal_mean).abs())
                    .max((sd - focal_sd).abs());
                focal_mean = mean;
                focal_sd = sd;
            }

            if iteration % 25 == 0 {
                debug!(
                    "EM iteration {iteration} ({invariance}): loglik {log_likelihood:.4}, max change {max_change:.2e}"
                );
            }

            if max_change < self.config.em_tolerance && failing.is_empty() {
                debug!(
                    "EM converged after {iteration} iterations ({invariance}): loglik {log_likelihood:.4}, focal N({focal_mean:.3}, {focal_sd:.3}^2)"
                );
                return Ok(GrmFit {
                    invariance: invariance.clone(),
                    items,
                    focal_mean,
                    focal_sd,
                    log_likelihood,
                    iterations: iteration,
                });
            }
        }

        warn!(
            "EM did not converge within {} iterations ({invariance}), last loglik {log_likelihood:.4}",
            self.config.max_em_iterations
        );
        let mut context = format!("graded response model, invariant {invariance}");
        if !failing.is_empty() {
            context.push_str(&format!(
                "; M-step still failing for {}",
                failing.iter().map(|item| item.code()).join(", ")
            ));
        }
        Err(AnalysisError::Convergence {
            context,
            iterations: self.config.max_em_iterations,
        })
    }

    fn cold_start(&self, data: &ResponseData, invariance: &InvarianceSet) -> Vec<ItemCalibration> {
        let mut rng = self.config.seed.map(StdRng::seed_from_u64);
        let mut slope = || rng.as_mut().map_or(1.0, |r| 1.0 + r.random_range(-0.1..0.1));

        Item::ALL
            .into_iter()
            .map(|item| {
                let invariant = invariance.contains(item);
                if invariant {
                    let params = GrmItemParams::from_counts(&data.category_counts(item, None), slope());
                    ItemCalibration {
                        item,
                        invariant,
                        reference: params,
                        focal: params,
                    }
                } else {
                    let reference = GrmItemParams::from_counts(
                        &data.category_counts(item, Some(Group::Reference)),
                        slope(),
                    );
                    let focal = GrmItemParams::from_counts(
                        &data.category_counts(item, Some(Group::Focal)),
                        slope(),
                    );
                    ItemCalibration {
                        item,
                        invariant,
                        reference,
                        focal,
                    }
                }
            })
            .collect()
    }

    fn warm_start(previous: &GrmFit, invariance: &InvarianceSet) -> Vec<ItemCalibration> {
        previous
            .items
            .iter()
            .map(|c| {
                let invariant = invariance.contains(c.item);
                // An item that becomes shared starts from its reference-group parameters.
                let focal = if invariant { c.reference } else { c.focal };
                ItemCalibration {
                    item: c.item,
                    invariant,
                    reference: c.reference,
                    focal,
                }
            })
            .collect()
    }

    fn e_step(
        &self,
        data: &ResponseData,
        items: &[ItemCalibration],
        focal_mean: f64,
        focal_sd: f64,
    ) -> ExpectedCounts {
        let nodes = self.grid.nodes();
        let n_nodes = nodes.len();
        let table = LogProbTable::build(items, nodes);
        let priors = [
            self.grid.log_normal_weights(0.0, 1.0),
            self.grid.log_normal_weights(focal_mean, focal_sd),
        ];

        let partials: Vec<ExpectedCounts> = data
            .respondents()
            .par_chunks(E_STEP_CHUNK)
            .map(|chunk| {
                let mut acc = ExpectedCounts::zeros(n_nodes);
                let mut posterior = vec![0.0; n_nodes];
                for respondent in chunk {
                    let g = respondent.group.index();
                    acc.log_likelihood +=
                        table.log_posterior(respondent, &priors[g], &mut posterior);
                    for p in &mut posterior {
                        *p = p.exp();
                    }
                    for (j, &x) in respondent.responses.iter().enumerate() {
                        let start = (j * 2 + g) * n_nodes;
                        for (q, &w) in posterior.iter().enumerate() {
                            acc.counts[start + q][usize::from(x)] += w;
                        }
                    }
                    if respondent.group == Group::Focal {
                        for (a, &w) in acc.focal_posterior.iter_mut().zip(&posterior) {
                            *a += w;
                        }
                    }
                }
                acc
            })
            .collect();

        partials
            .iter()
            .fold(ExpectedCounts::zeros(n_nodes), ExpectedCounts::merge)
    }

    /// Update every item; items whose optimizer failed keep their previous
    /// parameters and are listed in the outcome
    fn m_step(
        &self,
        expected: &ExpectedCounts,
        items: &[ItemCalibration],
        invariance: &InvarianceSet,
    ) -> Result<MStepOutcome> {
        let updated: Vec<(ItemCalibration, bool)> = items
            .par_iter()
            .map(|current| {
                let j = current.item.index();
                if invariance.contains(current.item) {
                    let pooled = expected.pooled(j);
                    let (params, ok) = self.optimize_item(&pooled, &current.reference)?;
                    Ok((
                        ItemCalibration {
                            item: current.item,
                            invariant: true,
                            reference: params,
                            focal: params,
                        },
                        ok,
                    ))
                } else {
                    let (reference, ok_ref) =
                        self.optimize_item(expected.slice(j, 0), &current.reference)?;
                    let (focal, ok_foc) =
                        self.optimize_item(expected.slice(j, 1), &current.focal)?;
                    Ok((
                        ItemCalibration {
                            item: current.item,
                            invariant: false,
                            reference,
                            focal,
                        },
                        ok_ref && ok_foc,
                    ))
                }
            })
            .collect::<Result<_>>()?;

        let failed = updated
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(c, _)| c.item)
            .collect();
        Ok(MStepOutcome {
            items: updated.into_iter().map(|(c, _)| c).collect(),
            failed,
        })
    }

    /// One generalized M-step: accept the optimizer's answer only if it
    /// does not worsen the expected log-likelihood
    fn optimize_item(
        &self,
        counts: &[[f64; N_CATEGORIES]],
        current: &GrmItemParams,
    ) -> Result<(GrmItemParams, bool)> {
        let objective = ItemMStep::new(self.grid.nodes(), counts)?;
        let init = current.to_raw();
        let before = objective.eval(&init)?;
        match self
            .optimizer
            .minimize(&objective, &init, &GrmItemParams::raw_bounds())
        {
            Ok(result) if result.fval <= before => {
                Ok((GrmItemParams::from_raw(&result.parameters), true))
            }
            Ok(_) => Ok((*current, true)),
            Err(e) => {
                debug!("M-step kept previous parameters: {e}");
                Ok((*current, false))
            }
        }
    }
}
