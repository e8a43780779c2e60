//! Measurement invariance analysis of the PHQ-9 across two samples.
//!
//! Graded response calibration with configurable invariance sets, ordinal
//! logistic DIF detection with iterative purification, release-and-test
//! sensitivity of individual scores and response-curve projection of group
//! differences.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod simulation;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{AnalysisConfig, AnalysisConfigBuilder, DifCriterion, PseudoR2};
pub use error::{AnalysisError, Result};
pub use models::{
    Group, InvarianceSet, Item, Respondent, ResponseData, ThetaScores, ThetaTable, ThetaVariant,
};

// Analysis stages
pub use algorithm::batch::{BatchOutcome, BatchRunner, ItemFailure};
pub use algorithm::dif::{DifClass, DifScan, DifScanner, ItemDifStatistics};
pub use algorithm::irt::{GradedResponseEstimator, GrmFit};
pub use algorithm::projection::{EvaluationGrid, ProjectedCurve, ResponseModel, project};
pub use algorithm::sensitivity::{Baseline, ReleaseEstimator, ReleaseResult};
pub use pipeline::{AnalysisReport, Pipeline};

// Data input and output
pub use io::{grid_to_batch, read_responses_parquet, responses_from_batch, write_batch_parquet};
pub use simulation::{SimulationSpec, simulate_responses};

// Arrow types
pub use arrow::record_batch::RecordBatch;
