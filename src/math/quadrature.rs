//! Fixed rectangular quadrature over the latent trait
//!
//! Marginal likelihoods integrate over theta on an equally spaced grid with
//! normal prior weights, the same grid for both groups so that expected counts
//! are directly comparable.

use crate::error::{AnalysisError, Result};
use crate::math::logistic::log_sum_exp;

/// Equally spaced nodes on `[-half_width, half_width]`
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureGrid {
    nodes: Vec<f64>,
}

impl QuadratureGrid {
    /// Build a grid with `n_points` nodes
    ///
    /// # Errors
    /// Returns `InputValidation` for fewer than 5 points or a non-positive width.
    pub fn new(n_points: usize, half_width: f64) -> Result<Self> {
        if n_points < 5 {
            return Err(AnalysisError::validation(
                "quadrature",
                format!("at least 5 quadrature points required, got {n_points}"),
            ));
        }
        if !(half_width.is_finite() && half_width > 0.0) {
            return Err(AnalysisError::validation(
                "quadrature",
                format!("half width must be positive, got {half_width}"),
            ));
        }
        let step = 2.0 * half_width / (n_points - 1) as f64;
        let nodes = (0..n_points)
            .map(|q| -half_width + q as f64 * step)
            .collect();
        Ok(Self { nodes })
    }

    /// Node locations
    #[must_use]
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the grid has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Normalized log prior weights of `N(mean, sd^2)` at the nodes
    #[must_use]
    pub fn log_normal_weights(&self, mean: f64, sd: f64) -> Vec<f64> {
        let raw: Vec<f64> = self
            .nodes
            .iter()
            .map(|&t| {
                let z = (t - mean) / sd;
                -0.5 * z * z
            })
            .collect();
        let norm = log_sum_exp(&raw);
        raw.into_iter().map(|w| w - norm).collect()
    }

    /// Mean and variance of a distribution given by normalized weights
    #[must_use]
    pub fn moments(&self, weights: &[f64]) -> (f64, f64) {
        let mean: f64 = self.nodes.iter().zip(weights).map(|(t, w)| t * w).sum();
        let var: f64 = self
            .nodes
            .iter()
            .zip(weights)
            .map(|(t, w)| (t - mean).powi(2) * w)
            .sum();
        (mean, var)
    }
}
