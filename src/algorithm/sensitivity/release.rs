//! Release-and-test: refit with one item freed and compare thetas to baseline

use log::debug;
use serde::Serialize;

use crate::algorithm::irt::{GradedResponseEstimator, GrmFit};
use crate::config::SensitivityConfig;
use crate::error::{AnalysisError, Result};
use crate::math::stats::mean_differences;
use crate::models::theta::{ThetaScores, ThetaVariant};
use crate::models::types::Item;
use crate::models::{InvarianceSet, ResponseData};

/// Shift of individual thetas when one item is released
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseResult {
    /// Released item
    pub item: Item,
    /// Mean of `released - baseline`
    pub mean_signed_difference: f64,
    /// Mean of `|released - baseline|`
    pub mean_absolute_difference: f64,
    /// Largest absolute shift
    pub max_absolute_difference: f64,
    /// Share of respondents whose absolute shift exceeds the threshold
    pub share_exceeding: f64,
    /// Practical-significance threshold applied (SD units)
    pub threshold: f64,
    /// Whether the share exceeds the configured minimum
    pub impactful: bool,
    /// Focal-group latent mean of the released model
    pub focal_mean: f64,
    /// Respondents compared
    pub n: usize,
    /// Theta column of the released model
    #[serde(skip)]
    pub theta: ThetaScores,
}

/// The fixed comparison point shared by every release run
#[derive(Debug, Clone)]
pub struct Baseline {
    /// Fully constrained fit, used as warm start
    pub fit: GrmFit,
    /// Its standardized theta
    pub theta: ThetaScores,
}

/// Compare a released theta column to the baseline
///
/// # Errors
/// `Computation` when the columns differ in length.
pub fn compare(
    item: Item,
    released: ThetaScores,
    baseline: &ThetaScores,
    focal_mean: f64,
    config: &SensitivityConfig,
) -> Result<ReleaseResult> {
    if released.len() != baseline.len() {
        return Err(AnalysisError::Computation(format!(
            "{item}: released theta has {} scores, baseline {}",
            released.len(),
            baseline.len()
        )));
    }
    let (signed, unsigned) = mean_differences(released.values(), baseline.values());
    let (exceeding, max_abs) = released
        .values()
        .iter()
        .zip(baseline.values())
        .map(|(r, b)| (r - b).abs())
        .fold((0usize, 0.0f64), |(count, max), d| {
            (count + usize::from(d > config.practical_threshold), max.max(d))
        });
    let n = released.len();
    let share = if n == 0 { 0.0 } else { exceeding as f64 / n as f64 };

    Ok(ReleaseResult {
        item,
        mean_signed_difference: signed,
        mean_absolute_difference: unsigned,
        max_absolute_difference: max_abs,
        share_exceeding: share,
        threshold: config.practical_threshold,
        impactful: share > config.min_impacted_share,
        focal_mean,
        n,
        theta: released,
    })
}

/// Release-and-test runner bound to one estimator and baseline
pub struct ReleaseEstimator<'a> {
    config: SensitivityConfig,
    estimator: &'a GradedResponseEstimator,
    baseline: &'a Baseline,
}

impl<'a> ReleaseEstimator<'a> {
    /// Create a runner
    #[must_use]
    pub const fn new(
        config: SensitivityConfig,
        estimator: &'a GradedResponseEstimator,
        baseline: &'a Baseline,
    ) -> Self {
        Self {
            config,
            estimator,
            baseline,
        }
    }

    /// Refit with `item` released and compare to the baseline
    ///
    /// Independent of any other release run: reads only the data and the baseline.
    pub fn run(&self, data: &ResponseData, item: Item) -> Result<ReleaseResult> {
        let invariance = InvarianceSet::all_except(item);
        let (fit, theta) = self.estimator.estimate_theta(
            data,
            &invariance,
            ThetaVariant::Released(item),
            Some(&self.baseline.fit),
        )?;
        let result = compare(item, theta, &self.baseline.theta, fit.focal_mean, &self.config)?;
        debug!(
            "Released {item}: mean |d| {:.4}, share > {} = {:.3}",
            result.mean_absolute_difference, result.threshold, result.share_exceeding
        );
        Ok(result)
    }
}
