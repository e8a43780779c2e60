//! Prediction grid export
//!
//! Projected curves become flat rows `{model, theta, group, expected, p0..p3}`
//! ready for plotting, serialized to arrow with `serde_arrow` and persisted as
//! parquet.

use std::fs::File;
use std::path::Path;

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::algorithm::projection::ProjectedCurve;
use crate::error::{AnalysisError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// One grid point of one curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    /// Model name
    pub model: String,
    /// Latent trait value
    pub theta: f64,
    /// Group indicator (0 reference, 1 focal)
    pub group: u8,
    /// Expected response or sum score
    pub expected: f64,
    /// Probability of category 0
    pub p0: Option<f64>,
    /// Probability of category 1
    pub p1: Option<f64>,
    /// Probability of category 2
    pub p2: Option<f64>,
    /// Probability of category 3
    pub p3: Option<f64>,
}

/// Flatten curves into rows, curves in the given order
#[must_use]
pub fn grid_rows(curves: &[&ProjectedCurve]) -> Vec<GridRow> {
    curves
        .iter()
        .flat_map(|curve| {
            curve.points.iter().map(|p| {
                let [p0, p1, p2, p3] = p.probabilities.map_or([None; 4], |probs| probs.map(Some));
                GridRow {
                    model: curve.model.clone(),
                    theta: p.theta,
                    group: p.group.indicator(),
                    expected: p.expected,
                    p0,
                    p1,
                    p2,
                    p3,
                }
            })
        })
        .collect()
}

/// Serialize curves to a single record batch
///
/// # Errors
/// `Serialization` if `serde_arrow` cannot build the schema or the batch.
pub fn grid_to_batch(curves: &[&ProjectedCurve]) -> Result<RecordBatch> {
    let rows = grid_rows(curves);
    let fields = Vec::<FieldRef>::from_type::<GridRow>(TracingOptions::default())
        .map_err(|e| AnalysisError::Serialization(format!("grid schema: {e}")))?;
    serde_arrow::to_record_batch(&fields, &rows)
        .map_err(|e| AnalysisError::Serialization(format!("grid rows: {e}")))
}

/// Write one record batch to a parquet file
///
/// # Errors
/// `Io` or `Parquet` on write failure.
pub fn write_batch_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let start = std::time::Instant::now();
    log_operation_start("Writing parquet file", path);

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;

    log_operation_complete("wrote", path, batch.num_rows(), Some(start.elapsed()));
    Ok(())
}
