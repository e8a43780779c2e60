//! Iterative purification DIF scanner
//!
//! Starting from all items as anchors, each round scores respondents on a
//! graded response model anchored by the current set, tests every item with
//! three nested ordinal models, and frees the flagged items. The loop ends once
//! two consecutive rounds flag the same items.

use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::algorithm::dif::stats::{ItemDifStatistics, item_dif_statistics};
use crate::algorithm::irt::{GradedResponseEstimator, GrmFit};
use crate::algorithm::ordinal::LbfgsOptimizer;
use crate::config::DifConfig;
use crate::error::{AnalysisError, Result};
use crate::models::theta::{ThetaScores, ThetaVariant};
use crate::models::types::{Group, Item, N_ITEMS};
use crate::models::{InvarianceSet, ResponseData};

/// Outcome of a purification run
#[derive(Debug, Clone, Serialize)]
pub struct DifScan {
    /// Items still treated as invariant
    pub anchors: InvarianceSet,
    /// Items flagged in the final round, in questionnaire order
    pub flagged: Vec<Item>,
    /// Rounds run, including the one that confirmed stability
    pub iterations: usize,
    /// Flagged items per round
    pub history: Vec<Vec<Item>>,
    /// Statistics from the final round, in questionnaire order
    pub statistics: Vec<ItemDifStatistics>,
    /// Model anchored by the final set
    #[serde(skip)]
    pub fit: GrmFit,
    /// Standardized theta from the final round
    #[serde(skip)]
    pub theta: ThetaScores,
}

impl DifScan {
    /// Statistics of one item
    #[must_use]
    pub fn statistics_for(&self, item: Item) -> Option<&ItemDifStatistics> {
        self.statistics.iter().find(|s| s.item == item)
    }
}

/// Runs the purification loop against a graded response estimator
pub struct DifScanner<'a> {
    config: DifConfig,
    estimator: &'a GradedResponseEstimator,
    optimizer: LbfgsOptimizer,
}

impl<'a> DifScanner<'a> {
    /// Create a scanner
    #[must_use]
    pub fn new(config: DifConfig, estimator: &'a GradedResponseEstimator) -> Self {
        let optimizer = LbfgsOptimizer::new(config.optimizer.clone());
        Self {
            config,
            estimator,
            optimizer,
        }
    }

    /// Scan starting from a freshly fitted fully constrained model
    pub fn scan(&self, data: &ResponseData) -> Result<DifScan> {
        let (fit, theta) = self.estimator.estimate_theta(
            data,
            &InvarianceSet::all(),
            ThetaVariant::DifCalibrated,
            None,
        )?;
        self.scan_from(data, fit, theta)
    }

    /// Scan starting from an existing fully constrained fit and its scores
    ///
    /// # Errors
    /// `AnchorConflict` if a round would leave fewer anchors than required,
    /// `DifNonConvergence` if the flagged set never stabilises, and any error
    /// from refitting the anchored model or the per-item regressions.
    pub fn scan_from(
        &self,
        data: &ResponseData,
        baseline_fit: GrmFit,
        baseline_theta: ThetaScores,
    ) -> Result<DifScan> {
        let groups: Vec<Group> = data.respondents().iter().map(|r| r.group).collect();
        let responses: Vec<Vec<u8>> = Item::ALL
            .iter()
            .map(|&item| data.item_responses(item))
            .collect();

        let mut fit = baseline_fit;
        let mut theta = baseline_theta.with_variant(ThetaVariant::DifCalibrated);
        let mut previous: Vec<Item> = Vec::new();
        let mut history = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            let statistics: Vec<ItemDifStatistics> = Item::ALL
                .par_iter()
                .map(|&item| {
                    item_dif_statistics(
                        item,
                        &responses[item.index()],
                        theta.values(),
                        &groups,
                        &self.config,
                        &self.optimizer,
                    )
                })
                .collect::<Result<_>>()?;

            let flagged: Vec<Item> = statistics
                .iter()
                .filter(|s| s.flagged())
                .map(|s| s.item)
                .collect();
            debug!(
                "DIF round {iteration}: flagged [{}]",
                flagged.iter().map(|i| i.code()).join(", ")
            );
            history.push(flagged.clone());

            let remaining = N_ITEMS - flagged.len();
            if remaining < self.config.min_anchor_items {
                return Err(AnalysisError::AnchorConflict {
                    flagged,
                    remaining,
                    required: self.config.min_anchor_items,
                });
            }

            if flagged == previous {
                info!(
                    "DIF purification stable after {iteration} round(s): {} item(s) flagged",
                    flagged.len()
                );
                return Ok(DifScan {
                    anchors: fit.invariance.clone(),
                    flagged,
                    iterations: iteration,
                    history,
                    statistics,
                    fit,
                    theta,
                });
            }

            let anchors = InvarianceSet::from_items(
                Item::ALL.into_iter().filter(|item| !flagged.contains(item)),
            );
            let (next_fit, next_theta) = self.estimator.estimate_theta(
                data,
                &anchors,
                ThetaVariant::DifCalibrated,
                Some(&fit),
            )?;
            fit = next_fit;
            theta = next_theta;
            previous = flagged;
        }

        Err(AnalysisError::DifNonConvergence {
            iterations: self.config.max_iterations,
            last_flagged: previous,
        })
    }
}
