//! Per-item batch runner
//!
//! Runs one independent task per item on a dedicated rayon pool. A failing
//! item is recorded with its error kind and message; the others still run.

use log::{info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::BatchConfig;
use crate::error::{AnalysisError, Result};
use crate::models::types::Item;
use crate::utils::logging::{create_item_progress_bar, finish_progress_bar};

/// An item whose task failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Batch the failure belongs to
    pub stage: String,
    /// Item
    pub item: Item,
    /// Error kind (`convergence`, `input_validation`, ...)
    pub kind: String,
    /// Full error message
    pub message: String,
}

/// Results of one batch, successes in input order
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    successes: Vec<(Item, T)>,
    index: FxHashMap<Item, usize>,
    /// Items that failed
    pub failures: Vec<ItemFailure>,
}

impl<T> BatchOutcome<T> {
    /// Result for one item, if it succeeded
    #[must_use]
    pub fn get(&self, item: Item) -> Option<&T> {
        self.index.get(&item).map(|&i| &self.successes[i].1)
    }

    /// Successful results in input order
    #[must_use]
    pub fn successes(&self) -> &[(Item, T)] {
        &self.successes
    }

    /// Whether every item succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Split into successful values and failures
    #[must_use]
    pub fn into_parts(self) -> (Vec<T>, Vec<ItemFailure>) {
        (
            self.successes.into_iter().map(|(_, v)| v).collect(),
            self.failures,
        )
    }
}

/// Parallel per-item executor
pub struct BatchRunner {
    pool: ThreadPool,
    show_progress: bool,
}

impl BatchRunner {
    /// Create a runner with its own thread pool
    ///
    /// # Errors
    /// `Computation` if the pool cannot be built.
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("phq-item-{i}"))
            .build()
            .map_err(|e| AnalysisError::Computation(format!("thread pool: {e}")))?;
        Ok(Self {
            pool,
            show_progress: config.show_progress,
        })
    }

    /// Worker threads in the pool
    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` once per item; never aborts on an item's failure
    pub fn run<T, F>(&self, stage: &str, items: &[Item], task: F) -> BatchOutcome<T>
    where
        T: Send,
        F: Fn(Item) -> Result<T> + Sync,
    {
        let pb = create_item_progress_bar(items.len() as u64, stage, self.show_progress);

        let results: Vec<(Item, Result<T>)> = self.pool.install(|| {
            items
                .par_iter()
                .map(|&item| {
                    let result = task(item);
                    pb.inc(1);
                    (item, result)
                })
                .collect()
        });

        let mut successes = Vec::with_capacity(items.len());
        let mut index = FxHashMap::default();
        let mut failures = Vec::new();
        for (item, result) in results {
            match result {
                Ok(value) => {
                    index.insert(item, successes.len());
                    successes.push((item, value));
                }
                Err(e) => {
                    warn!("{stage}: {item} failed: {e}");
                    failures.push(ItemFailure {
                        stage: stage.to_string(),
                        item,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        finish_progress_bar(&pb, &format!("{stage}: {} ok, {} failed", successes.len(), failures.len()));
        info!(
            "{stage}: {} of {} items succeeded",
            successes.len(),
            items.len()
        );

        BatchOutcome {
            successes,
            index,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> BatchRunner {
        BatchRunner::new(&BatchConfig {
            workers: 3,
            show_progress: false,
        })
        .unwrap()
    }

    #[test]
    fn test_failures_do_not_abort_the_batch() {
        let outcome = runner().run("square", &Item::ALL, |item| {
            if item == Item::Sleep {
                Err(AnalysisError::Convergence {
                    context: item.code().to_string(),
                    iterations: 500,
                })
            } else {
                Ok(item.index() * item.index())
            }
        });
        assert_eq!(outcome.successes().len(), 8);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].item, Item::Sleep);
        assert_eq!(outcome.failures[0].kind, "convergence");
        assert_eq!(outcome.get(Item::Fatigue), Some(&9));
        assert!(outcome.get(Item::Sleep).is_none());
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_results_keep_input_order() {
        let runner = runner();
        assert_eq!(runner.workers(), 3);
        let outcome = runner.run("identity", &Item::ALL, Ok);
        let order: Vec<Item> = outcome.successes().iter().map(|(i, _)| *i).collect();
        assert_eq!(order, Item::ALL.to_vec());
        let (values, failures) = outcome.into_parts();
        assert_eq!(values, Item::ALL.to_vec());
        assert!(failures.is_empty());
    }
}
