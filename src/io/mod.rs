//! Tabular input and output
//!
//! Arrow record batches and parquet files in, typed records out; prediction
//! grids back out as parquet.

pub mod grid;
pub mod responses;

pub use grid::{GridRow, grid_rows, grid_to_batch, write_batch_parquet};
pub use responses::{
    read_responses_parquet, responses_from_batch, responses_from_batches, responses_to_batch,
};
