//! Graded response latent-trait estimation
//!
//! Calibrates a two-group graded response model under a chosen invariance set
//! and scores respondents on the resulting common latent scale.

pub mod estimator;
pub mod grm;
pub mod scoring;

pub use estimator::{GradedResponseEstimator, GrmFit, ItemCalibration};
pub use grm::GrmItemParams;
pub use scoring::{EapScore, eap_scores};
