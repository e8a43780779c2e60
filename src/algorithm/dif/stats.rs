//! Nested ordinal logistic models for one item
//!
//! Model 1 regresses the item on theta, model 2 adds group, model 3 adds the
//! theta-by-group interaction. Uniform DIF shows as the 1 to 2 increment,
//! non-uniform DIF as the 2 to 3 increment.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::fmt;

use crate::algorithm::ordinal::{LbfgsOptimizer, OrderedLogitFit};
use crate::config::{DifConfig, DifCriterion, PseudoR2};
use crate::error::{AnalysisError, Result};
use crate::models::types::{Group, Item};

/// Kind of differential functioning detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DifClass {
    /// Item behaves the same in both groups
    None,
    /// Constant group offset at every trait level
    Uniform,
    /// Group difference that varies with the trait level
    NonUniform,
}

impl fmt::Display for DifClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Uniform => "uniform",
            Self::NonUniform => "non-uniform",
        })
    }
}

/// Likelihood-ratio and effect-size statistics for one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDifStatistics {
    /// Item tested
    pub item: Item,
    /// LR statistic, model 1 vs 2 (1 df)
    pub chi12: f64,
    /// LR statistic, model 1 vs 3 (2 df)
    pub chi13: f64,
    /// LR statistic, model 2 vs 3 (1 df)
    pub chi23: f64,
    /// p-value of `chi12`
    pub p12: f64,
    /// p-value of `chi13`
    pub p13: f64,
    /// p-value of `chi23`
    pub p23: f64,
    /// Pseudo-R² of models 1, 2 and 3
    pub pseudo_r2: [f64; 3],
    /// Pseudo-R² increment, model 1 to 2
    pub r2_change_12: f64,
    /// Pseudo-R² increment, model 1 to 3
    pub r2_change_13: f64,
    /// Pseudo-R² increment, model 2 to 3
    pub r2_change_23: f64,
    /// Relative change of the theta coefficient when group is added
    pub beta_change: f64,
    /// Classification under the configured criterion
    pub class: DifClass,
}

impl ItemDifStatistics {
    /// Whether the item is flagged as exhibiting DIF
    #[must_use]
    pub fn flagged(&self) -> bool {
        self.class != DifClass::None
    }
}

fn chi_square_p(statistic: f64, df: f64) -> Result<f64> {
    let dist = ChiSquared::new(df).map_err(|e| AnalysisError::Computation(e.to_string()))?;
    Ok(dist.sf(statistic.max(0.0)))
}

/// Fit the three nested models of `item` on `theta` and classify it
///
/// # Errors
/// Propagates ordered-logit failures with the item in their context.
pub fn item_dif_statistics(
    item: Item,
    responses: &[u8],
    theta: &[f64],
    groups: &[Group],
    config: &DifConfig,
    optimizer: &LbfgsOptimizer,
) -> Result<ItemDifStatistics> {
    if responses.len() != theta.len() || responses.len() != groups.len() {
        return Err(AnalysisError::validation(
            item.code(),
            "responses, theta and groups differ in length",
        ));
    }

    let rows = |width: usize| -> Vec<Vec<f64>> {
        theta
            .iter()
            .zip(groups)
            .map(|(&t, g)| {
                let g = g.as_f64();
                [t, g, t * g][..width].to_vec()
            })
            .collect()
    };

    let context = item.code();
    let m1 = OrderedLogitFit::fit(&rows(1), responses, &["theta"], optimizer, context)?;
    let m2 = OrderedLogitFit::fit(&rows(2), responses, &["theta", "group"], optimizer, context)?;
    let m3 = OrderedLogitFit::fit(
        &rows(3),
        responses,
        &["theta", "group", "theta:group"],
        optimizer,
        context,
    )?;

    // Nested fits can land a hair below their parent; increments are clamped at zero.
    let chi12 = (2.0 * (m2.log_likelihood() - m1.log_likelihood())).max(0.0);
    let chi13 = (2.0 * (m3.log_likelihood() - m1.log_likelihood())).max(0.0);
    let chi23 = (2.0 * (m3.log_likelihood() - m2.log_likelihood())).max(0.0);

    let r2 = [&m1, &m2, &m3].map(|m| m.pseudo_r2(config.pseudo_r2));
    let beta1 = m1.coefficient("theta").unwrap_or_default();
    let beta2 = m2.coefficient("theta").unwrap_or_default();
    let beta_change = if beta1 == 0.0 {
        0.0
    } else {
        ((beta1 - beta2) / beta1).abs()
    };

    let mut stats = ItemDifStatistics {
        item,
        chi12,
        chi13,
        chi23,
        p12: chi_square_p(chi12, 1.0)?,
        p13: chi_square_p(chi13, 2.0)?,
        p23: chi_square_p(chi23, 1.0)?,
        pseudo_r2: r2,
        r2_change_12: (r2[1] - r2[0]).max(0.0),
        r2_change_13: (r2[2] - r2[0]).max(0.0),
        r2_change_23: (r2[2] - r2[1]).max(0.0),
        beta_change,
        class: DifClass::None,
    };
    stats.class = classify(&stats, config.criterion);
    Ok(stats)
}

/// Apply a flagging criterion; non-uniform wins when the interaction step qualifies
#[must_use]
pub fn classify(stats: &ItemDifStatistics, criterion: DifCriterion) -> DifClass {
    match criterion {
        DifCriterion::R2Change { threshold } => {
            if stats.r2_change_23 >= threshold {
                DifClass::NonUniform
            } else if stats.r2_change_12 >= threshold || stats.r2_change_13 >= threshold {
                DifClass::Uniform
            } else {
                DifClass::None
            }
        }
        DifCriterion::ChiSquare { alpha } => {
            if stats.p23 < alpha {
                DifClass::NonUniform
            } else if stats.p12 < alpha || stats.p13 < alpha {
                DifClass::Uniform
            } else {
                DifClass::None
            }
        }
        DifCriterion::BetaChange { threshold } => {
            if stats.beta_change >= threshold {
                DifClass::Uniform
            } else {
                DifClass::None
            }
        }
    }
}

/// Display name of a pseudo-R² flavour
#[must_use]
pub const fn pseudo_r2_label(kind: PseudoR2) -> &'static str {
    match kind {
        PseudoR2::Nagelkerke => "Nagelkerke",
        PseudoR2::McFadden => "McFadden",
        PseudoR2::CoxSnell => "Cox-Snell",
    }
}
