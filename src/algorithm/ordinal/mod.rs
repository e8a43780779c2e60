//! Ordinal and linear response models
//!
//! Ordered-logit regressions carry the DIF tests and the per-item response
//! curves; the polynomial least-squares model carries the sum-score curves.

pub mod fit;
pub mod linear;
pub mod logit;
pub mod optimizer;

pub use fit::{CoefficientEstimate, ModelSummary, OrderedLogitFit, pseudo_r2};
pub use linear::SumScoreModel;
pub use logit::OrderedLogitModel;
pub use optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult};
