//! Error handling for the invariance analysis.

use std::io;

use arrow::error::ArrowError;
use itertools::Itertools;
use parquet::errors::ParquetError;

use crate::models::types::Item;

/// Errors raised while validating input, fitting models or scanning for DIF
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Input data or configuration violates the analysis contract
    #[error("Input validation error ({context}): {message}")]
    InputValidation {
        /// Where the problem was found (column, item, group or config field)
        context: String,
        /// What is wrong
        message: String,
    },

    /// An iterative fit did not converge within its iteration budget
    #[error("Convergence error ({context}): no convergence after {iterations} iterations")]
    Convergence {
        /// Which fit failed (model and invariance set or item)
        context: String,
        /// Iterations spent
        iterations: usize,
    },

    /// Too few invariant items to place both groups on one latent scale
    #[error(
        "Identifiability error: {invariant} invariant item(s), at least {required} required"
    )]
    Identifiability {
        /// Number of items constrained equal across groups
        invariant: usize,
        /// Minimum needed
        required: usize,
    },

    /// The DIF purification loop kept changing its flagged set
    #[error(
        "DIF purification did not stabilise after {iterations} iterations (last flagged: {})",
        format_items(.last_flagged)
    )]
    DifNonConvergence {
        /// Iterations spent
        iterations: usize,
        /// Items flagged in the final iteration
        last_flagged: Vec<Item>,
    },

    /// Flagging would leave fewer anchors than identification requires
    #[error(
        "DIF anchor conflict: flagging {} leaves {remaining} anchor item(s), at least {required} required",
        format_items(.flagged)
    )]
    AnchorConflict {
        /// Items the criterion wants to flag
        flagged: Vec<Item>,
        /// Anchors that would remain
        remaining: usize,
        /// Minimum anchor count
        required: usize,
    },

    /// Numerical failure (non-finite likelihood, singular matrix)
    #[error("Computation error: {0}")]
    Computation(String),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error converting result records to or from a tabular/JSON form
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AnalysisError {
    /// Build an input validation error
    pub fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputValidation {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable name of the error kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InputValidation { .. } => "input_validation",
            Self::Convergence { .. } => "convergence",
            Self::Identifiability { .. } => "identifiability",
            Self::DifNonConvergence { .. } => "dif_non_convergence",
            Self::AnchorConflict { .. } => "anchor_conflict",
            Self::Computation(_) => "computation",
            Self::Arrow(_) => "arrow",
            Self::Parquet(_) => "parquet",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

fn format_items(items: &[Item]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items.iter().map(|item| item.code()).join(", ")
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_items() {
        let err = AnalysisError::AnchorConflict {
            flagged: vec![Item::Sleep, Item::Appetite],
            remaining: 1,
            required: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("phq3, phq5"));
        assert_eq!(err.kind(), "anchor_conflict");

        let err = AnalysisError::DifNonConvergence {
            iterations: 10,
            last_flagged: Vec::new(),
        };
        assert!(err.to_string().contains("none"));
    }
}
