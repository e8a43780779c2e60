//! Fitting ordered-logit response models and summarizing them
//!
//! Outcomes are recoded to their observed levels before fitting, so an unused
//! response category never drives a cutpoint to infinity; predictions map back
//! onto all four categories with zero probability for unobserved ones.

use nalgebra::DMatrix;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::algorithm::ordinal::logit::{
    OrderedLogitModel, cutpoints_from_raw, level_probabilities, row_dot,
};
use crate::algorithm::ordinal::optimizer::{LbfgsOptimizer, ObjectiveFunction};
use crate::config::PseudoR2;
use crate::error::{AnalysisError, Result};
use crate::models::types::N_CATEGORIES;

/// One estimated coefficient with its Wald interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientEstimate {
    /// Term name (`theta`, `group`, `theta:group`)
    pub term: String,
    /// Log-odds estimate
    pub estimate: f64,
    /// Standard error from the observed information
    pub std_error: f64,
    /// `exp(estimate)`
    pub odds_ratio: f64,
    /// Lower 95% bound on the odds-ratio scale
    pub ci_lower: f64,
    /// Upper 95% bound on the odds-ratio scale
    pub ci_upper: f64,
}

/// Coefficient table and fit statistics of one response model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Coefficients in design order
    pub coefficients: Vec<CoefficientEstimate>,
    /// Pseudo-R² relative to the thresholds-only model
    pub pseudo_r2: f64,
    /// Log-likelihood at the estimate
    pub log_likelihood: f64,
    /// Observations
    pub n: usize,
}

/// A fitted ordered-logit model
#[derive(Debug, Clone)]
pub struct OrderedLogitFit {
    terms: Vec<String>,
    coefficients: Vec<f64>,
    std_errors: Vec<f64>,
    cutpoints: Vec<f64>,
    levels: Vec<u8>,
    log_likelihood: f64,
    null_log_likelihood: f64,
    n: usize,
}

impl OrderedLogitFit {
    /// Fit `y` (original category codes 0..=3) on the design rows `x`
    ///
    /// # Errors
    /// `InputValidation` if `y` has a single observed level, `Convergence` if
    /// the optimizer exhausts its budget, `Computation` for a singular Hessian.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        terms: &[&str],
        optimizer: &LbfgsOptimizer,
        context: &str,
    ) -> Result<Self> {
        let mut levels: Vec<u8> = y.to_vec();
        levels.sort_unstable();
        levels.dedup();
        if levels.len() < 2 {
            return Err(AnalysisError::validation(
                context,
                "outcome has a single observed level",
            ));
        }
        if levels.iter().any(|&l| usize::from(l) >= N_CATEGORIES) {
            return Err(AnalysisError::validation(
                context,
                "outcome level outside 0..=3",
            ));
        }
        let recoded: Vec<u8> = y
            .iter()
            .map(|v| levels.iter().position(|l| l == v).unwrap_or_default() as u8)
            .collect();

        let model = OrderedLogitModel::new(x, recoded.clone(), levels.len())?;
        if terms.len() != model.n_coefficients() {
            return Err(AnalysisError::Computation(format!(
                "{context}: {} term names for {} columns",
                terms.len(),
                model.n_coefficients()
            )));
        }

        let result = optimizer.minimize(
            &model,
            &model.parameter_init(),
            &model.parameter_bounds(),
        )?;
        if !result.converged {
            return Err(AnalysisError::Convergence {
                context: format!("ordered logit, {context}: {}", result.message),
                iterations: usize::try_from(result.n_iter).unwrap_or(usize::MAX),
            });
        }
        let params = result.parameters;
        let log_likelihood = -model.eval(&params)? * model.n_obs() as f64;

        let hessian = model.hessian_nll(&params)?;
        let d = model.dim();
        let flat: Vec<f64> = hessian.into_iter().flatten().collect();
        let covariance = DMatrix::from_row_slice(d, d, &flat)
            .try_inverse()
            .ok_or_else(|| {
                AnalysisError::Computation(format!("{context}: singular information matrix"))
            })?;

        let p = model.n_coefficients();
        let std_errors: Vec<f64> = (0..p).map(|j| covariance[(j, j)].max(0.0).sqrt()).collect();
        let coefficients = params[..p].to_vec();
        let cutpoints = cutpoints_from_raw(&params[p..]);

        Ok(Self {
            terms: terms.iter().map(ToString::to_string).collect(),
            coefficients,
            std_errors,
            cutpoints,
            null_log_likelihood: null_log_likelihood(&recoded, levels.len()),
            levels,
            log_likelihood,
            n: model.n_obs(),
        })
    }

    /// Log-likelihood at the estimate
    #[must_use]
    pub const fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Log-likelihood of the thresholds-only model
    #[must_use]
    pub const fn null_log_likelihood(&self) -> f64 {
        self.null_log_likelihood
    }

    /// Observations used
    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }

    /// Estimated coefficients in design order
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Coefficient for a named term
    #[must_use]
    pub fn coefficient(&self, term: &str) -> Option<f64> {
        self.terms
            .iter()
            .position(|t| t == term)
            .map(|j| self.coefficients[j])
    }

    /// Pseudo-R² relative to the thresholds-only model
    #[must_use]
    pub fn pseudo_r2(&self, kind: PseudoR2) -> f64 {
        pseudo_r2(kind, self.log_likelihood, self.null_log_likelihood, self.n)
    }

    /// Probabilities of all four response categories at the design row `x`
    #[must_use]
    pub fn category_probabilities(&self, x: &[f64]) -> [f64; N_CATEGORIES] {
        let eta = row_dot(x, &self.coefficients);
        let mut out = [0.0; N_CATEGORIES];
        for (level, p) in self.levels.iter().zip(level_probabilities(&self.cutpoints, eta)) {
            out[usize::from(*level)] = p;
        }
        out
    }

    /// Expected response (in original category codes) at the design row `x`
    #[must_use]
    pub fn expected_response(&self, x: &[f64]) -> f64 {
        self.category_probabilities(x)
            .iter()
            .enumerate()
            .map(|(k, p)| k as f64 * p)
            .sum()
    }

    /// Coefficient table with odds ratios and 95% Wald intervals
    pub fn summary(&self, kind: PseudoR2) -> Result<ModelSummary> {
        let z = Normal::new(0.0, 1.0)
            .map_err(|e| AnalysisError::Computation(e.to_string()))?
            .inverse_cdf(0.975);
        let coefficients = self
            .terms
            .iter()
            .zip(self.coefficients.iter().zip(&self.std_errors))
            .map(|(term, (&estimate, &se))| CoefficientEstimate {
                term: term.clone(),
                estimate,
                std_error: se,
                odds_ratio: estimate.exp(),
                ci_lower: z.mul_add(-se, estimate).exp(),
                ci_upper: z.mul_add(se, estimate).exp(),
            })
            .collect();
        Ok(ModelSummary {
            coefficients,
            pseudo_r2: self.pseudo_r2(kind),
            log_likelihood: self.log_likelihood,
            n: self.n,
        })
    }
}

/// Log-likelihood of a model with thresholds only: `sum n_k ln(n_k / n)`
fn null_log_likelihood(levels: &[u8], n_levels: usize) -> f64 {
    let mut counts = vec![0usize; n_levels];
    for &l in levels {
        counts[usize::from(l)] += 1;
    }
    let n = levels.len() as f64;
    counts
        .into_iter()
        .filter(|&c| c > 0)
        .map(|c| c as f64 * (c as f64 / n).ln())
        .sum()
}

/// Pseudo-R² from model and null log-likelihoods
#[must_use]
pub fn pseudo_r2(kind: PseudoR2, ll: f64, ll0: f64, n: usize) -> f64 {
    let n = n as f64;
    let cox_snell = 1.0 - (2.0 * (ll0 - ll) / n).exp();
    match kind {
        PseudoR2::McFadden => {
            if ll0 == 0.0 {
                0.0
            } else {
                1.0 - ll / ll0
            }
        }
        PseudoR2::CoxSnell => cox_snell,
        PseudoR2::Nagelkerke => {
            let max = 1.0 - (2.0 * ll0 / n).exp();
            if max <= 0.0 { 0.0 } else { cox_snell / max }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn simulate(n: usize, beta: f64, cuts: &[f64], seed: u64) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for _ in 0..n {
            let xi: f64 = rng.random_range(-2.0..2.0);
            let u: f64 = rng.random();
            let probs = level_probabilities(cuts, beta * xi);
            let mut acc = 0.0;
            let mut level = probs.len() - 1;
            for (k, p) in probs.iter().enumerate() {
                acc += p;
                if u < acc {
                    level = k;
                    break;
                }
            }
            x.push(vec![xi]);
            y.push(level as u8);
        }
        (x, y)
    }

    #[test]
    fn test_recovers_slope_and_interval_covers_truth() {
        let (x, y) = simulate(3000, 1.2, &[-1.0, 0.5, 1.5], 7);
        let opt = LbfgsOptimizer::new(OptimizerConfig::default());
        let fit = OrderedLogitFit::fit(&x, &y, &["theta"], &opt, "toy").unwrap();
        let beta = fit.coefficient("theta").unwrap();
        assert!((beta - 1.2).abs() < 0.15, "beta = {beta}");

        let summary = fit.summary(PseudoR2::Nagelkerke).unwrap();
        let c = &summary.coefficients[0];
        assert!(c.ci_lower < 1.2f64.exp() && 1.2f64.exp() < c.ci_upper);
        assert!(summary.pseudo_r2 > 0.0 && summary.pseudo_r2 < 1.0);
        assert!(fit.log_likelihood() > fit.null_log_likelihood());
    }

    #[test]
    fn test_unobserved_category_gets_zero_probability() {
        let (x, y) = simulate(500, 1.0, &[-0.5, 0.5, 1.0], 11);
        // Collapse category 2 into 1 so it never appears.
        let y: Vec<u8> = y.into_iter().map(|v| if v == 2 { 1 } else { v }).collect();
        let opt = LbfgsOptimizer::default();
        let fit = OrderedLogitFit::fit(&x, &y, &["theta"], &opt, "toy").unwrap();
        let probs = fit.category_probabilities(&[0.3]);
        assert_eq!(probs[2], 0.0);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_level_outcome_is_rejected() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let err = OrderedLogitFit::fit(&x, &[1, 1, 1], &["theta"], &LbfgsOptimizer::default(), "phq3")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InputValidation { .. }));
    }

    #[test]
    fn test_pseudo_r2_definitions() {
        let (ll, ll0, n) = (-80.0, -100.0, 100);
        let cs = pseudo_r2(PseudoR2::CoxSnell, ll, ll0, n);
        assert!((cs - (1.0 - (-0.4f64).exp())).abs() < 1e-12);
        assert!((pseudo_r2(PseudoR2::McFadden, ll, ll0, n) - 0.2).abs() < 1e-12);
        assert!(pseudo_r2(PseudoR2::Nagelkerke, ll, ll0, n) > cs);
    }
}
