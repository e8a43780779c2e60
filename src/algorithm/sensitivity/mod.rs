//! Item-level sensitivity of theta to invariance assumptions

pub mod release;

pub use release::{Baseline, ReleaseEstimator, ReleaseResult, compare};
