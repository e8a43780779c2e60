//! Ordered logistic regression (proportional odds model).
//!
//! Observed outcome levels: `y_i ∈ {0, 1, ..., K-1}` with `K >= 2`.
//!
//! Linear predictor `eta_i = X_i * beta` (no intercept; the cutpoints play that
//! role). Cutpoints `c_1 < ... < c_{K-1}` give cumulative probabilities
//! `P(y <= k | eta) = sigmoid(c_{k+1} - eta)`.
//!
//! Ordering is enforced with an unconstrained raw parameterization:
//! - `c_1 = raw_1`
//! - `c_j = c_{j-1} + softplus(raw_j)` for `j = 2..K-1`
//!
//! Parameter vector layout: `beta[0..p)` then `cut_raw[0..K-1)`.
//!
//! With `K = 2` this is binary logistic regression with intercept `-c_1`.

use crate::algorithm::ordinal::optimizer::ObjectiveFunction;
use crate::error::{AnalysisError, Result};
use crate::math::logistic::{log_sigmoid, log1mexp, logit, sigmoid, softplus, softplus_inv};

const MIN_TAIL: f64 = 1e-300;

/// Dense row-major design matrix
#[derive(Debug, Clone)]
pub(crate) struct DenseX {
    pub(crate) n: usize,
    pub(crate) p: usize,
    data: Vec<f64>,
}

impl DenseX {
    pub(crate) fn from_rows(x: &[Vec<f64>]) -> Result<Self> {
        let n = x.len();
        let p = x.first().map_or(0, Vec::len);
        if n == 0 || p == 0 {
            return Err(AnalysisError::Computation(
                "design matrix must be non-empty".to_string(),
            ));
        }
        let mut data = Vec::with_capacity(n * p);
        for (i, row) in x.iter().enumerate() {
            if row.len() != p {
                return Err(AnalysisError::Computation(format!(
                    "design matrix row {i} has {} columns, expected {p}",
                    row.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(AnalysisError::Computation(format!(
                    "design matrix row {i} contains a non-finite value"
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { n, p, data })
    }

    #[inline]
    pub(crate) fn row(&self, i: usize) -> &[f64] {
        let start = i * self.p;
        &self.data[start..start + self.p]
    }
}

#[inline]
pub(crate) fn row_dot(x_row: &[f64], beta: &[f64]) -> f64 {
    x_row.iter().zip(beta).map(|(&x, &b)| x * b).sum()
}

/// Map raw cutpoint parameters to ordered cutpoints
pub(crate) fn cutpoints_from_raw(cut_raw: &[f64]) -> Vec<f64> {
    let mut c = Vec::with_capacity(cut_raw.len());
    for (j, &raw) in cut_raw.iter().enumerate() {
        if j == 0 {
            c.push(raw);
        } else {
            c.push(c[j - 1] + softplus(raw));
        }
    }
    c
}

/// Category probabilities at linear predictor `eta` for ordered cutpoints
pub(crate) fn level_probabilities(cuts: &[f64], eta: f64) -> Vec<f64> {
    let mut probs = Vec::with_capacity(cuts.len() + 1);
    let mut below = 0.0;
    for &c in cuts {
        let cum = sigmoid(c - eta);
        probs.push((cum - below).max(0.0));
        below = cum;
    }
    probs.push((1.0 - below).max(0.0));
    probs
}

/// Ordered logit negative log-likelihood over a fixed dataset
///
/// The objective is the mean NLL so optimizer tolerances do not depend on `n`.
#[derive(Debug, Clone)]
pub struct OrderedLogitModel {
    pub(crate) x: DenseX,
    y: Vec<u8>,
    n_levels: usize,
}

impl OrderedLogitModel {
    /// Create a model from row-wise `x` and consecutive levels `y`
    pub fn new(x: &[Vec<f64>], y: Vec<u8>, n_levels: usize) -> Result<Self> {
        if n_levels < 2 {
            return Err(AnalysisError::Computation(
                "ordered logit needs at least 2 outcome levels".to_string(),
            ));
        }
        let x = DenseX::from_rows(x)?;
        if y.len() != x.n {
            return Err(AnalysisError::Computation(format!(
                "outcome has {} rows, design matrix has {}",
                y.len(),
                x.n
            )));
        }
        if y.iter().any(|&k| usize::from(k) >= n_levels) {
            return Err(AnalysisError::Computation(format!(
                "outcome contains a level >= {n_levels}"
            )));
        }
        Ok(Self { x, y, n_levels })
    }

    /// Number of observations
    #[must_use]
    pub fn n_obs(&self) -> usize {
        self.x.n
    }

    /// Number of regression coefficients
    #[must_use]
    pub fn n_coefficients(&self) -> usize {
        self.x.p
    }

    #[inline]
    fn n_cuts(&self) -> usize {
        self.n_levels - 1
    }

    /// Total parameter count
    #[must_use]
    pub fn dim(&self) -> usize {
        self.x.p + self.n_cuts()
    }

    /// Start values: zero slopes, cutpoints at the marginal cumulative logits
    #[must_use]
    pub fn parameter_init(&self) -> Vec<f64> {
        let mut counts = vec![0usize; self.n_levels];
        for &k in &self.y {
            counts[usize::from(k)] += 1;
        }
        let n = self.y.len() as f64;
        let mut init = vec![0.0; self.dim()];
        let mut cum = 0usize;
        let mut prev = 0.0;
        for j in 0..self.n_cuts() {
            cum += counts[j];
            let c = logit(cum as f64 / n);
            init[self.x.p + j] = if j == 0 {
                c
            } else {
                softplus_inv((c - prev).max(1e-3))
            };
            prev = if j == 0 { c } else { prev + (c - prev).max(1e-3) };
        }
        init
    }

    /// Box bounds keeping the optimizer away from overflow
    #[must_use]
    pub fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        let mut bounds = vec![(-50.0, 50.0); self.x.p];
        for j in 0..self.n_cuts() {
            bounds.push(if j == 0 { (-50.0, 50.0) } else { (-25.0, 25.0) });
        }
        bounds
    }

    fn split_params<'a>(&self, params: &'a [f64]) -> Result<(&'a [f64], &'a [f64])> {
        if params.len() != self.dim() {
            return Err(AnalysisError::Computation(format!(
                "expected {} parameters, got {}",
                self.dim(),
                params.len()
            )));
        }
        if params.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::Computation(
                "parameters must be finite".to_string(),
            ));
        }
        Ok(params.split_at(self.x.p))
    }

    /// Total log-likelihood at `params`
    pub fn log_likelihood(&self, params: &[f64]) -> Result<f64> {
        let (beta, cut_raw) = self.split_params(params)?;
        let cuts = cutpoints_from_raw(cut_raw);

        let mut ll = 0.0;
        for i in 0..self.x.n {
            let eta = row_dot(self.x.row(i), beta);
            let yi = usize::from(self.y[i]);

            let logp = if yi == 0 {
                log_sigmoid(cuts[0] - eta)
            } else if yi + 1 == self.n_levels {
                log_sigmoid(eta - cuts[self.n_cuts() - 1])
            } else {
                // log(sigmoid(a) - sigmoid(b)), a > b
                let la = log_sigmoid(cuts[yi] - eta);
                let lb = log_sigmoid(cuts[yi - 1] - eta);
                la + log1mexp(lb - la)
            };

            if !logp.is_finite() {
                return Err(AnalysisError::Computation(
                    "ordered logit produced a non-finite log probability".to_string(),
                ));
            }
            ll += logp;
        }
        Ok(ll)
    }

    /// Gradient of the total negative log-likelihood
    pub fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        let (beta, cut_raw) = self.split_params(params)?;
        let cuts = cutpoints_from_raw(cut_raw);

        let mut grad_beta = vec![0.0f64; self.x.p];
        let mut grad_c = vec![0.0f64; self.n_cuts()];

        for i in 0..self.x.n {
            let eta = row_dot(self.x.row(i), beta);
            let yi = usize::from(self.y[i]);

            let g_eta = if yi == 0 {
                let s = sigmoid(cuts[0] - eta);
                grad_c[0] -= 1.0 - s;
                1.0 - s
            } else if yi + 1 == self.n_levels {
                let s = sigmoid(eta - cuts[self.n_cuts() - 1]);
                grad_c[self.n_cuts() - 1] += 1.0 - s;
                -(1.0 - s)
            } else {
                let sa = sigmoid(cuts[yi] - eta);
                let sb = sigmoid(cuts[yi - 1] - eta);
                let spa = sa * (1.0 - sa);
                let spb = sb * (1.0 - sb);
                let p = (sa - sb).max(MIN_TAIL);
                grad_c[yi - 1] += spb / p;
                grad_c[yi] -= spa / p;
                (spa - spb) / p
            };

            for (g, &x) in grad_beta.iter_mut().zip(self.x.row(i)) {
                *g += g_eta * x;
            }
        }

        // Constrained cutpoint gradients -> raw parameters via suffix sums.
        let mut grad_cut_raw = vec![0.0f64; self.n_cuts()];
        grad_cut_raw[0] = grad_c.iter().sum::<f64>();
        let mut suffix = 0.0f64;
        for j in (1..self.n_cuts()).rev() {
            suffix += grad_c[j];
            grad_cut_raw[j] = sigmoid(cut_raw[j]) * suffix;
        }

        let mut grad = grad_beta;
        grad.extend_from_slice(&grad_cut_raw);
        Ok(grad)
    }

    /// Numerical Hessian of the total NLL from central differences of the gradient
    pub fn hessian_nll(&self, params: &[f64]) -> Result<Vec<Vec<f64>>> {
        let d = self.dim();
        let mut h = vec![vec![0.0; d]; d];
        for i in 0..d {
            let step = 1e-5 * params[i].abs().max(1.0);
            let mut hi = params.to_vec();
            let mut lo = params.to_vec();
            hi[i] += step;
            lo[i] -= step;
            let g_hi = self.grad_nll(&hi)?;
            let g_lo = self.grad_nll(&lo)?;
            for j in 0..d {
                h[i][j] = (g_hi[j] - g_lo[j]) / (2.0 * step);
            }
        }
        for i in 0..d {
            for j in (i + 1)..d {
                let avg = 0.5 * (h[i][j] + h[j][i]);
                h[i][j] = avg;
                h[j][i] = avg;
            }
        }
        Ok(h)
    }
}

impl ObjectiveFunction for OrderedLogitModel {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        Ok(-self.log_likelihood(params)? / self.x.n as f64)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let n = self.x.n as f64;
        Ok(self.grad_nll(params)?.into_iter().map(|g| g / n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finite_diff_grad(m: &OrderedLogitModel, params: &[f64], eps: f64) -> Vec<f64> {
        (0..params.len())
            .map(|i| {
                let mut hi = params.to_vec();
                let mut lo = params.to_vec();
                hi[i] += eps;
                lo[i] -= eps;
                let f_hi = -m.log_likelihood(&hi).unwrap();
                let f_lo = -m.log_likelihood(&lo).unwrap();
                (f_hi - f_lo) / (2.0 * eps)
            })
            .collect()
    }

    fn toy() -> OrderedLogitModel {
        let x = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![2.0, 1.0],
            vec![3.0, 0.0],
            vec![4.0, 1.0],
            vec![-1.0, 0.0],
        ];
        OrderedLogitModel::new(&x, vec![0, 0, 1, 2, 3, 1], 4).unwrap()
    }

    #[test]
    fn test_grad_matches_finite_diff() {
        let m = toy();
        let p = vec![0.3, -0.4, 0.1, -0.2, 0.5];
        let g = m.grad_nll(&p).unwrap();
        let g_fd = finite_diff_grad(&m, &p, 1e-6);
        for (a, b) in g.iter().zip(&g_fd) {
            assert!((a - b).abs() < 5e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_init_is_finite_and_ordered() {
        let m = toy();
        let init = m.parameter_init();
        assert_eq!(init.len(), m.dim());
        let cuts = cutpoints_from_raw(&init[2..]);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
        assert!(m.log_likelihood(&init).unwrap().is_finite());
    }

    #[test]
    fn test_level_probabilities_sum_to_one() {
        let probs = level_probabilities(&[-1.0, 0.5, 2.0], 0.7);
        assert_eq!(probs.len(), 4);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_rejects_bad_levels() {
        let x = vec![vec![0.0], vec![1.0]];
        assert!(OrderedLogitModel::new(&x, vec![0, 2], 2).is_err());
        assert!(OrderedLogitModel::new(&x, vec![0], 2).is_err());
        assert!(OrderedLogitModel::new(&x, vec![0, 0], 1).is_err());
    }
}
