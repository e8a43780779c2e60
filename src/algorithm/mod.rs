//! Algorithm implementations
//!
//! This module contains the statistical procedures of the invariance
//! analysis: latent trait estimation, DIF detection, release-and-test
//! sensitivity, response-curve projection and the per-item batch runner.

pub mod batch;
pub mod dif;
pub mod irt;
pub mod ordinal;
pub mod projection;
pub mod sensitivity;
