//! Differential item functioning detection
//!
//! Ordinal logistic regression DIF with iterative purification of the anchor
//! set.

pub mod scanner;
pub mod stats;

pub use scanner::{DifScan, DifScanner};
pub use stats::{DifClass, ItemDifStatistics, classify, item_dif_statistics};
