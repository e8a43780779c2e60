//! Evaluation grid: theta swept over its observed range, crossed with group

use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::models::theta::ThetaScores;
use crate::models::types::Group;

/// One grid point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPoint {
    /// Latent trait value
    pub theta: f64,
    /// Group
    pub group: Group,
}

/// Equally spaced theta values, evaluated once per group
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationGrid {
    thetas: Vec<f64>,
    step: f64,
}

impl EvaluationGrid {
    /// Sweep `[min, max]` at `step`
    ///
    /// Points are `min + i * step` (not accumulated), so the grid is identical
    /// across calls with the same arguments.
    ///
    /// # Errors
    /// `InputValidation` for a non-positive step or an empty or non-finite range.
    pub fn from_range(min: f64, max: f64, step: f64) -> Result<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(AnalysisError::validation(
                "evaluation grid",
                format!("step must be positive, got {step}"),
            ));
        }
        if !(min.is_finite() && max.is_finite()) || max < min {
            return Err(AnalysisError::validation(
                "evaluation grid",
                format!("invalid theta range [{min}, {max}]"),
            ));
        }
        // Tolerate rounding so that `max` itself is included when it lies on the grid.
        let intervals = ((max - min) / step + 1e-9).floor() as usize;
        let thetas = (0..=intervals).map(|i| min + i as f64 * step).collect();
        Ok(Self { thetas, step })
    }

    /// Sweep the observed range of a theta column
    pub fn from_scores(scores: &ThetaScores, step: f64) -> Result<Self> {
        if scores.is_empty() {
            return Err(AnalysisError::validation(
                format!("evaluation grid ({})", scores.variant),
                "no theta scores",
            ));
        }
        let (min, max) = scores.range();
        Self::from_range(min, max, step)
    }

    /// Theta values
    #[must_use]
    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    /// Step between adjacent values
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Theta values per group
    #[must_use]
    pub fn len(&self) -> usize {
        self.thetas.len()
    }

    /// Whether the grid has no points
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thetas.is_empty()
    }

    /// All points, reference group first
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        Group::BOTH.into_iter().flat_map(move |group| {
            self.thetas
                .iter()
                .map(move |&theta| GridPoint { theta, group })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_spans_range() {
        let grid = EvaluationGrid::from_range(-1.0, 1.0, 0.01).unwrap();
        assert_eq!(grid.len(), 201);
        assert_eq!(grid.thetas()[0], -1.0);
        assert!((grid.thetas()[200] - 1.0).abs() < 1e-12);
        assert_eq!(grid.points().count(), 402);
        assert_eq!(grid.points().nth(201).map(|p| p.group), Some(Group::Focal));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(EvaluationGrid::from_range(0.0, 1.0, 0.0).is_err());
        assert!(EvaluationGrid::from_range(1.0, 0.0, 0.1).is_err());
        assert_eq!(EvaluationGrid::from_range(0.5, 0.5, 0.1).unwrap().len(), 1);
    }
}
