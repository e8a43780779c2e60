//! Response table conversion
//!
//! Reads the harmonized response table (`phq1`..`phq9`, `sum_score`, `group`,
//! optional `group_label` and `weight`) from arrow record batches or a parquet
//! file, and writes a dataset back in the same layout.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{AnalysisError, Result};
use crate::models::types::{Group, Item, N_ITEMS};
use crate::models::{ResponseData, Respondent};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Sum-score column
pub const SUM_SCORE_COLUMN: &str = "sum_score";
/// Binary group indicator column
pub const GROUP_COLUMN: &str = "group";
/// Group label column
pub const GROUP_LABEL_COLUMN: &str = "group_label";
/// Sampling weight column
pub const WEIGHT_COLUMN: &str = "weight";

/// Get a column cast to `expected`, or `None` when it is absent and optional
fn get_column(
    batch: &RecordBatch,
    name: &str,
    expected: &DataType,
    required: bool,
) -> Result<Option<ArrayRef>> {
    let Ok(idx) = batch.schema().index_of(name) else {
        if required {
            return Err(AnalysisError::validation(
                format!("column {name}"),
                "required column not found",
            ));
        }
        return Ok(None);
    };
    let column = batch.column(idx);
    if column.data_type() == expected {
        return Ok(Some(Arc::clone(column)));
    }
    cast(column, expected).map(Some).map_err(|e| {
        AnalysisError::validation(
            format!("column {name}"),
            format!("cannot read {} as {expected:?}: {e}", column.data_type()),
        )
    })
}

fn int_column(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let array = get_column(batch, name, &DataType::Int64, true)?
        .ok_or_else(|| AnalysisError::validation(format!("column {name}"), "not found"))?;
    let ints = array
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| AnalysisError::validation(format!("column {name}"), "not an integer column"))?
        .clone();
    if ints.null_count() > 0 {
        return Err(AnalysisError::validation(
            format!("column {name}"),
            format!("{} missing value(s)", ints.null_count()),
        ));
    }
    Ok(ints)
}

/// Respondents and group labels decoded from one batch
struct DecodedBatch {
    respondents: Vec<Respondent>,
    labels: [Option<String>; 2],
}

fn decode_batch(batch: &RecordBatch, offset: usize) -> Result<DecodedBatch> {
    let items: Vec<Int64Array> = Item::ALL
        .iter()
        .map(|item| int_column(batch, item.code()))
        .collect::<Result<_>>()?;
    let sum_scores = int_column(batch, SUM_SCORE_COLUMN)?;
    let groups = int_column(batch, GROUP_COLUMN)?;
    let labels_column = get_column(batch, GROUP_LABEL_COLUMN, &DataType::Utf8, false)?;
    let labels_array = labels_column
        .as_ref()
        .and_then(|a| a.as_any().downcast_ref::<StringArray>());
    let weights_column = get_column(batch, WEIGHT_COLUMN, &DataType::Float64, false)?;
    let weights = weights_column
        .as_ref()
        .and_then(|a| a.as_any().downcast_ref::<Float64Array>());

    let mut respondents = Vec::with_capacity(batch.num_rows());
    let mut labels: [Option<String>; 2] = [None, None];

    for row in 0..batch.num_rows() {
        let line = offset + row;
        let mut responses = [0u8; N_ITEMS];
        for (item, (slot, column)) in Item::ALL.iter().zip(responses.iter_mut().zip(&items)) {
            let value = column.value(row);
            *slot = u8::try_from(value)
                .ok()
                .filter(|v| *v <= 3)
                .ok_or_else(|| {
                    AnalysisError::validation(
                        format!("row {line}, {item}"),
                        format!("response {value} outside 0..=3"),
                    )
                })?;
        }

        let group = Group::try_from(groups.value(row))
            .map_err(|e| AnalysisError::validation(format!("row {line}, group"), e))?;

        let mut respondent = Respondent::new(responses, group);
        let stated = sum_scores.value(row);
        if stated != i64::from(respondent.sum_score()) {
            return Err(AnalysisError::validation(
                format!("row {line}, {SUM_SCORE_COLUMN}"),
                format!(
                    "stated sum score {stated} differs from item total {}",
                    respondent.sum_score()
                ),
            ));
        }

        respondent.weight = weights.and_then(|w| (!w.is_null(row)).then(|| w.value(row)));

        if let Some(label_array) = labels_array {
            let slot = &mut labels[group.index()];
            if slot.is_none() && !label_array.is_null(row) {
                *slot = Some(label_array.value(row).to_string());
            }
        }
        respondents.push(respondent);
    }

    Ok(DecodedBatch {
        respondents,
        labels,
    })
}

/// Decode and validate a set of record batches as one dataset
///
/// # Errors
/// `InputValidation` for a missing column, a null or out-of-range value,
/// an inconsistent sum score, or any dataset-level violation.
pub fn responses_from_batches(batches: &[RecordBatch]) -> Result<ResponseData> {
    let mut respondents = Vec::new();
    let mut labels: [Option<String>; 2] = [None, None];
    for batch in batches {
        let decoded = decode_batch(batch, respondents.len())?;
        respondents.extend(decoded.respondents);
        for (slot, found) in labels.iter_mut().zip(decoded.labels) {
            if slot.is_none() {
                *slot = found;
            }
        }
    }
    let [reference, focal] = labels;
    ResponseData::new(
        respondents,
        [
            reference.unwrap_or_else(|| Group::Reference.to_string()),
            focal.unwrap_or_else(|| Group::Focal.to_string()),
        ],
    )
}

/// Decode and validate a single record batch
///
/// # Errors
/// See [`responses_from_batches`].
pub fn responses_from_batch(batch: &RecordBatch) -> Result<ResponseData> {
    responses_from_batches(std::slice::from_ref(batch))
}

/// Encode a dataset in the response table layout
///
/// # Errors
/// `Arrow` if the batch cannot be assembled.
pub fn responses_to_batch(data: &ResponseData) -> Result<RecordBatch> {
    let respondents = data.respondents();
    let mut fields = Vec::with_capacity(N_ITEMS + 4);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(N_ITEMS + 4);

    for item in Item::ALL {
        fields.push(Field::new(item.code(), DataType::Int64, false));
        columns.push(Arc::new(Int64Array::from_iter_values(
            respondents.iter().map(|r| i64::from(r.response(item))),
        )));
    }
    fields.push(Field::new(SUM_SCORE_COLUMN, DataType::Int64, false));
    columns.push(Arc::new(Int64Array::from_iter_values(
        respondents.iter().map(|r| i64::from(r.sum_score())),
    )));
    fields.push(Field::new(GROUP_COLUMN, DataType::Int64, false));
    columns.push(Arc::new(Int64Array::from_iter_values(
        respondents.iter().map(|r| i64::from(r.group.indicator())),
    )));
    fields.push(Field::new(GROUP_LABEL_COLUMN, DataType::Utf8, false));
    columns.push(Arc::new(StringArray::from_iter_values(
        respondents.iter().map(|r| data.group_label(r.group)),
    )));
    fields.push(Field::new(WEIGHT_COLUMN, DataType::Float64, true));
    columns.push(Arc::new(Float64Array::from(
        respondents.iter().map(|r| r.weight).collect::<Vec<_>>(),
    )));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Read the response table from a parquet file
///
/// # Errors
/// `Io` or `Parquet` when the file cannot be read, otherwise as
/// [`responses_from_batches`].
pub fn read_responses_parquet(path: &Path) -> Result<ResponseData> {
    let start = std::time::Instant::now();
    log_operation_start("Reading response table", path);

    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let data = responses_from_batches(&batches)?;

    log_operation_complete("read", path, data.len(), Some(start.elapsed()));
    Ok(data)
}
