//! Graded response model for one four-category item
//!
//! Slope-intercept form: `P(X >= k | theta) = sigmoid(a * theta + d_k)` for
//! `k = 1..=3` with `d_1 > d_2 > d_3`, so category probabilities are
//! differences of adjacent cumulative curves.

use serde::Serialize;

use crate::algorithm::ordinal::optimizer::ObjectiveFunction;
use crate::error::{AnalysisError, Result};
use crate::math::logistic::{logit, sigmoid, softplus, softplus_inv};
use crate::models::types::N_CATEGORIES;

/// Number of intercepts (category boundaries)
pub const N_BOUNDARIES: usize = N_CATEGORIES - 1;

/// Number of free parameters per item
pub const N_ITEM_PARAMS: usize = N_BOUNDARIES + 1;

const MIN_PROB: f64 = 1e-300;

/// Slope and ordered intercepts of one item in one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrmItemParams {
    /// Discrimination
    pub slope: f64,
    /// Boundary intercepts, strictly decreasing
    pub intercepts: [f64; N_BOUNDARIES],
}

impl GrmItemParams {
    /// Start values from marginal category counts
    #[must_use]
    pub fn from_counts(counts: &[usize; N_CATEGORIES], slope: f64) -> Self {
        let n = counts.iter().sum::<usize>().max(1) as f64;
        let mut intercepts = [0.0; N_BOUNDARIES];
        let mut at_or_above = n;
        for k in 0..N_BOUNDARIES {
            at_or_above -= counts[k] as f64;
            // Marginal logits shrink toward zero under a N(0, 1) trait; inflate them back.
            let d = 1.2 * logit(at_or_above / n);
            intercepts[k] = if k == 0 { d } else { d.min(intercepts[k - 1] - 0.1) };
        }
        Self { slope, intercepts }
    }

    /// Probabilities of responding at or above each boundary
    #[inline]
    fn cumulative(&self, theta: f64) -> [f64; N_CATEGORIES + 1] {
        let mut s = [0.0; N_CATEGORIES + 1];
        s[0] = 1.0;
        for k in 0..N_BOUNDARIES {
            s[k + 1] = sigmoid(self.slope.mul_add(theta, self.intercepts[k]));
        }
        s
    }

    /// Category probabilities, summing to one
    #[must_use]
    pub fn category_probabilities(&self, theta: f64) -> [f64; N_CATEGORIES] {
        let s = self.cumulative(theta);
        let mut p = [0.0; N_CATEGORIES];
        for k in 0..N_CATEGORIES {
            p[k] = (s[k] - s[k + 1]).max(0.0);
        }
        p
    }

    /// Log category probabilities, floored away from `-inf`
    #[must_use]
    pub fn log_category_probabilities(&self, theta: f64) -> [f64; N_CATEGORIES] {
        self.category_probabilities(theta).map(|p| p.max(MIN_PROB).ln())
    }

    /// Expected response at `theta`
    #[must_use]
    pub fn expected_response(&self, theta: f64) -> f64 {
        self.category_probabilities(theta)
            .iter()
            .enumerate()
            .map(|(k, p)| k as f64 * p)
            .sum()
    }

    /// Boundary locations on the theta scale (`-d_k / a`)
    #[must_use]
    pub fn difficulties(&self) -> [f64; N_BOUNDARIES] {
        self.intercepts.map(|d| -d / self.slope)
    }

    /// Unconstrained parameter vector `[a, d_1, raw_2, raw_3]`
    #[must_use]
    pub fn to_raw(&self) -> Vec<f64> {
        let mut raw = Vec::with_capacity(N_ITEM_PARAMS);
        raw.push(self.slope);
        raw.push(self.intercepts[0]);
        for k in 1..N_BOUNDARIES {
            raw.push(softplus_inv(self.intercepts[k - 1] - self.intercepts[k]));
        }
        raw
    }

    /// Inverse of [`to_raw`](Self::to_raw)
    #[must_use]
    pub fn from_raw(raw: &[f64]) -> Self {
        let mut intercepts = [0.0; N_BOUNDARIES];
        intercepts[0] = raw[1];
        for k in 1..N_BOUNDARIES {
            intercepts[k] = intercepts[k - 1] - softplus(raw[k + 1]);
        }
        Self {
            slope: raw[0],
            intercepts,
        }
    }

    /// Box bounds for the raw vector
    #[must_use]
    pub fn raw_bounds() -> Vec<(f64, f64)> {
        let mut bounds = vec![(0.05, 10.0), (-25.0, 25.0)];
        bounds.extend(std::iter::repeat_n((-15.0, 15.0), N_BOUNDARIES - 1));
        bounds
    }

    /// Largest absolute difference to another parameter set
    #[must_use]
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.intercepts
            .iter()
            .zip(&other.intercepts)
            .map(|(a, b)| (a - b).abs())
            .fold((self.slope - other.slope).abs(), f64::max)
    }
}

/// Expected complete-data NLL of one item given expected counts at quadrature nodes
///
/// `counts[q][k]` is the posterior-expected number of respondents at node `q`
/// who gave response `k`.
pub struct ItemMStep<'a> {
    nodes: &'a [f64],
    counts: &'a [[f64; N_CATEGORIES]],
    total: f64,
}

impl<'a> ItemMStep<'a> {
    /// Create the objective
    pub fn new(nodes: &'a [f64], counts: &'a [[f64; N_CATEGORIES]]) -> Result<Self> {
        if nodes.len() != counts.len() {
            return Err(AnalysisError::Computation(format!(
                "M-step: {} nodes but {} count rows",
                nodes.len(),
                counts.len()
            )));
        }
        let total: f64 = counts.iter().flat_map(|row| row.iter()).sum();
        if total <= 0.0 {
            return Err(AnalysisError::Computation(
                "M-step: no expected counts".to_string(),
            ));
        }
        Ok(Self {
            nodes,
            counts,
            total,
        })
    }
}

impl ObjectiveFunction for ItemMStep<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        let item = GrmItemParams::from_raw(params);
        let mut nll = 0.0;
        for (&theta, row) in self.nodes.iter().zip(self.counts) {
            let logp = item.log_category_probabilities(theta);
            for k in 0..N_CATEGORIES {
                nll -= row[k] * logp[k];
            }
        }
        if !nll.is_finite() {
            return Err(AnalysisError::Computation(
                "M-step produced a non-finite objective".to_string(),
            ));
        }
        Ok(nll / self.total)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let item = GrmItemParams::from_raw(params);
        let mut g_slope = 0.0;
        let mut g_d = [0.0; N_BOUNDARIES];

        for (&theta, row) in self.nodes.iter().zip(self.counts) {
            let s = item.cumulative(theta);
            // W[k] = ds_k/dz_k, zero for the fixed ends s_0 = 1 and s_4 = 0.
            let mut w = [0.0; N_CATEGORIES + 1];
            for k in 1..=N_BOUNDARIES {
                w[k] = s[k] * (1.0 - s[k]);
            }
            let mut ratio = [0.0; N_CATEGORIES];
            for k in 0..N_CATEGORIES {
                let p = (s[k] - s[k + 1]).max(MIN_PROB);
                ratio[k] = row[k] / p;
                g_slope -= theta * ratio[k] * (w[k] - w[k + 1]);
            }
            for m in 1..=N_BOUNDARIES {
                g_d[m - 1] -= w[m] * (ratio[m] - ratio[m - 1]);
            }
        }

        let mut grad = Vec::with_capacity(N_ITEM_PARAMS);
        grad.push(g_slope / self.total);
        grad.push(g_d.iter().sum::<f64>() / self.total);
        for k in 1..N_BOUNDARIES {
            let tail: f64 = g_d[k..].iter().sum();
            grad.push(-sigmoid(params[k + 1]) * tail / self.total);
        }
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn item() -> GrmItemParams {
        GrmItemParams {
            slope: 1.7,
            intercepts: [1.0, -0.5, -2.0],
        }
    }

    #[test]
    fn test_probabilities_sum_to_one_and_are_monotone() {
        let it = item();
        let mut prev_expected = f64::NEG_INFINITY;
        for i in -40..=40 {
            let theta = f64::from(i) / 10.0;
            let p = it.category_probabilities(theta);
            assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            let e = it.expected_response(theta);
            assert!(e > prev_expected);
            prev_expected = e;
        }
    }

    #[test]
    fn test_raw_round_trip() {
        let it = item();
        let back = GrmItemParams::from_raw(&it.to_raw());
        assert!(it.max_abs_diff(&back) < 1e-9);
        let diffs = it.difficulties();
        assert!(diffs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_m_step_gradient_matches_finite_differences() {
        let nodes: Vec<f64> = (0..11).map(|q| -3.0 + 0.6 * f64::from(q)).collect();
        let counts: Vec<[f64; N_CATEGORIES]> = nodes
            .iter()
            .enumerate()
            .map(|(q, _)| {
                let q = q as f64;
                [10.0 - 0.8 * q, 3.0 + 0.2 * q, 1.0 + 0.4 * q, 0.5 + 0.5 * q]
            })
            .collect();
        let obj = ItemMStep::new(&nodes, &counts).unwrap();
        let raw = vec![1.3, 0.7, 0.2, -0.4];
        let g = obj.gradient(&raw).unwrap();
        for i in 0..raw.len() {
            let eps = 1e-6;
            let mut hi = raw.clone();
            let mut lo = raw.clone();
            hi[i] += eps;
            lo[i] -= eps;
            let fd = (obj.eval(&hi).unwrap() - obj.eval(&lo).unwrap()) / (2.0 * eps);
            assert_relative_eq!(g[i], fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_start_values_are_ordered() {
        let start = GrmItemParams::from_counts(&[500, 300, 150, 50], 1.0);
        assert!(start.intercepts[0] > start.intercepts[1]);
        assert!(start.intercepts[1] > start.intercepts[2]);
        // Empty middle category still yields strictly ordered intercepts.
        let sparse = GrmItemParams::from_counts(&[500, 0, 0, 50], 1.0);
        assert!(sparse.intercepts[0] > sparse.intercepts[1]);
        assert!(sparse.intercepts[1] > sparse.intercepts[2]);
    }
}
