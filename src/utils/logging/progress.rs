//! Progress reporting utilities for long-running operations
//!
//! Per-item batches (nine model refits) report through these bars. Bars are
//! hidden when progress display is off so callers never branch on it.

use indicatif::{ProgressBar, ProgressStyle};

/// Default style for a main progress bar
pub const DEFAULT_MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

fn main_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(DEFAULT_MAIN_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Create a main progress bar with a standardized style
///
/// # Arguments
/// * `length` - Total length for the progress bar
/// * `description` - Optional description to display as the initial message
#[must_use]
pub fn create_main_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    pb.set_style(main_style());

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

/// Create a progress bar for a per-item batch, hidden unless `visible`
#[must_use]
pub fn create_item_progress_bar(length: u64, description: &str, visible: bool) -> ProgressBar {
    if visible {
        create_main_progress_bar(length, Some(description))
    } else {
        ProgressBar::hidden()
    }
}

/// Finish a progress bar with a closing message
pub fn finish_progress_bar(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(message.to_string());
}
