//! Domain models for the invariance analysis
//!
//! This module contains the entities every analysis stage exchanges: the item
//! catalogue, respondents, the validated dataset, invariance sets and theta
//! score columns.

pub mod dataset;
pub mod invariance;
pub mod respondent;
pub mod theta;
pub mod types;

// Re-export commonly used types
pub use dataset::{DataSummary, GroupSummary, ResponseData};
pub use invariance::{InvarianceSet, MIN_INVARIANT_ITEMS};
pub use respondent::Respondent;
pub use theta::{ThetaScores, ThetaTable, ThetaVariant};
pub use types::{Group, Item, N_CATEGORIES, N_ITEMS};
