//! Response-curve projection
//!
//! Fitted response models are evaluated on a theta grid crossed with group to
//! produce mean-response and category curves and the average between-group
//! difference that summarizes each item's impact.

pub mod curves;
pub mod grid;
pub mod item;
pub mod sum_score;

pub use curves::{GroupDifference, ProjectedCurve, ProjectedPoint, ResponseModel, project};
pub use grid::{EvaluationGrid, GridPoint};
pub use item::{ItemImpact, ItemResponseModel, ModelSpec, Outcome, item_impact};
pub use sum_score::{SumScoreCoefficient, SumScoreImpact, sum_score_impact};
