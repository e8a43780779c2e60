//! Latent trait score columns
//!
//! Several model variants produce a theta per respondent. Each variant is an
//! independent, standardized column; a `ThetaTable` collects them without
//! mutating earlier columns.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnalysisError, Result};
use crate::math::stats;
use crate::models::types::Item;

/// Which fitted model produced a theta column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThetaVariant {
    /// All nine items invariant across groups
    FullyConstrained,
    /// All items invariant except the released one
    Released(Item),
    /// Anchors from the final DIF purification iteration
    DifCalibrated,
    /// Only the two core symptoms invariant
    CoreConstrained,
}

impl fmt::Display for ThetaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullyConstrained => f.write_str("theta_constrained"),
            Self::Released(item) => write!(f, "theta_release_{}", item.code()),
            Self::DifCalibrated => f.write_str("theta_dif"),
            Self::CoreConstrained => f.write_str("theta_core"),
        }
    }
}

/// Standardized theta scores from one model variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThetaScores {
    /// Producing model variant
    pub variant: ThetaVariant,
    values: Vec<f64>,
}

impl ThetaScores {
    /// Standardize raw scores to mean 0, standard deviation 1
    ///
    /// # Errors
    /// Returns `Computation` if the scores are empty, non-finite or constant.
    pub fn standardized(variant: ThetaVariant, raw: &[f64]) -> Result<Self> {
        let values = stats::standardize(raw).ok_or_else(|| {
            AnalysisError::Computation(format!(
                "cannot standardize {variant}: scores are empty, non-finite or constant"
            ))
        })?;
        Ok(Self { variant, values })
    }

    /// Same scores filed under another variant
    #[must_use]
    pub fn with_variant(self, variant: ThetaVariant) -> Self {
        Self { variant, ..self }
    }

    /// Scores in respondent order
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of scores
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no scores
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observed range
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

/// Named theta columns keyed by variant
#[derive(Debug, Clone, Default, Serialize)]
pub struct ThetaTable {
    columns: Vec<ThetaScores>,
}

impl ThetaTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new table with the column added (replacing one of the same variant)
    #[must_use]
    pub fn with_column(&self, scores: ThetaScores) -> Self {
        let mut columns: Vec<ThetaScores> = self
            .columns
            .iter()
            .filter(|c| c.variant != scores.variant)
            .cloned()
            .collect();
        columns.push(scores);
        Self { columns }
    }

    /// Column for a variant
    #[must_use]
    pub fn get(&self, variant: ThetaVariant) -> Option<&ThetaScores> {
        self.columns.iter().find(|c| c.variant == variant)
    }

    /// Column for a variant, or an error naming the missing variant
    pub fn require(&self, variant: ThetaVariant) -> Result<&ThetaScores> {
        self.get(variant).ok_or_else(|| {
            AnalysisError::validation("theta table", format!("no {variant} column"))
        })
    }

    /// All columns in insertion order
    #[must_use]
    pub fn columns(&self) -> &[ThetaScores] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardized_scores() {
        let scores =
            ThetaScores::standardized(ThetaVariant::FullyConstrained, &[1.0, 2.0, 3.0, 6.0])
                .unwrap();
        let (mean, sd) = stats::mean_sd(scores.values()).unwrap();
        assert!(mean.abs() < 1e-12);
        assert!((sd - 1.0).abs() < 1e-12);
        assert!(ThetaScores::standardized(ThetaVariant::DifCalibrated, &[2.0, 2.0]).is_err());
    }

    #[test]
    fn test_table_is_replaced_not_mutated() {
        let a = ThetaScores::standardized(ThetaVariant::FullyConstrained, &[0.0, 1.0]).unwrap();
        let b = ThetaScores::standardized(ThetaVariant::FullyConstrained, &[1.0, 0.0]).unwrap();
        let t1 = ThetaTable::new().with_column(a.clone());
        let t2 = t1.with_column(b.clone());
        assert_eq!(t1.get(ThetaVariant::FullyConstrained), Some(&a));
        assert_eq!(t2.get(ThetaVariant::FullyConstrained), Some(&b));
        assert_eq!(t2.columns().len(), 1);
        assert!(t2.require(ThetaVariant::CoreConstrained).is_err());
        assert_eq!(
            ThetaVariant::Released(Item::Sleep).to_string(),
            "theta_release_phq3"
        );
    }
}
