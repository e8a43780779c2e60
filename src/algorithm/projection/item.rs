//! Per-item ordinal response models on a theta column
//!
//! Every item gets a main-effects and an interaction ordered-logit model for
//! its full 0..=3 response and for its binary "elevated" indicator. The
//! interaction models drive the projected curves.

use serde::Serialize;
use std::fmt;

use crate::algorithm::ordinal::{LbfgsOptimizer, ModelSummary, OrderedLogitFit};
use crate::algorithm::projection::curves::{
    GroupDifference, ProjectedCurve, ResponseModel, project,
};
use crate::algorithm::projection::grid::EvaluationGrid;
use crate::config::PseudoR2;
use crate::error::{AnalysisError, Result};
use crate::models::theta::ThetaScores;
use crate::models::types::{Group, Item, N_CATEGORIES};
use crate::models::ResponseData;

/// Right-hand side of a response model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelSpec {
    /// `theta + group`
    MainEffects,
    /// `theta + group + theta:group`
    Interaction,
}

impl ModelSpec {
    /// Coefficient names in design order
    #[must_use]
    pub const fn terms(self) -> &'static [&'static str] {
        match self {
            Self::MainEffects => &["theta", "group"],
            Self::Interaction => &["theta", "group", "theta:group"],
        }
    }

    /// Design row for one respondent or grid point
    #[must_use]
    pub fn design_row(self, theta: f64, group: Group) -> Vec<f64> {
        let g = group.as_f64();
        match self {
            Self::MainEffects => vec![theta, g],
            Self::Interaction => vec![theta, g, theta * g],
        }
    }
}

/// What the model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Full response, 0..=3
    Ordinal,
    /// Response of 2 or more
    Elevated,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ordinal => "response",
            Self::Elevated => "elevated",
        })
    }
}

/// A fitted ordered-logit model of one item
#[derive(Debug, Clone)]
pub struct ItemResponseModel {
    /// Item
    pub item: Item,
    /// Modelled outcome
    pub outcome: Outcome,
    /// Design
    pub spec: ModelSpec,
    fit: OrderedLogitFit,
}

impl ItemResponseModel {
    /// Fit the item on a theta column
    ///
    /// # Errors
    /// `InputValidation` on length mismatch or a single observed outcome level,
    /// `Convergence` when the optimizer fails.
    pub fn fit(
        data: &ResponseData,
        theta: &ThetaScores,
        item: Item,
        outcome: Outcome,
        spec: ModelSpec,
        optimizer: &LbfgsOptimizer,
    ) -> Result<Self> {
        if theta.len() != data.len() {
            return Err(AnalysisError::validation(
                format!("{item} ({})", theta.variant),
                format!("{} theta scores for {} respondents", theta.len(), data.len()),
            ));
        }
        let x: Vec<Vec<f64>> = data
            .respondents()
            .iter()
            .zip(theta.values())
            .map(|(r, &t)| spec.design_row(t, r.group))
            .collect();
        let y = match outcome {
            Outcome::Ordinal => data.item_responses(item),
            Outcome::Elevated => data.elevated_responses(item),
        };
        let context = format!("{item} {outcome}");
        let fit = OrderedLogitFit::fit(&x, &y, spec.terms(), optimizer, &context)?;
        Ok(Self {
            item,
            outcome,
            spec,
            fit,
        })
    }

    /// Coefficient table
    pub fn summary(&self, kind: PseudoR2) -> Result<ModelSummary> {
        self.fit.summary(kind)
    }
}

impl ResponseModel for ItemResponseModel {
    fn name(&self) -> String {
        let spec = match self.spec {
            ModelSpec::MainEffects => "main",
            ModelSpec::Interaction => "interaction",
        };
        format!("{}_{}_{spec}", self.item.code(), self.outcome)
    }

    fn expected(&self, theta: f64, group: Group) -> f64 {
        self.fit.expected_response(&self.spec.design_row(theta, group))
    }

    fn category_probabilities(&self, theta: f64, group: Group) -> Option<[f64; N_CATEGORIES]> {
        Some(
            self.fit
                .category_probabilities(&self.spec.design_row(theta, group)),
        )
    }
}

/// Coefficient tables and projected group differences of one item
#[derive(Debug, Clone, Serialize)]
pub struct ItemImpact {
    /// Item
    pub item: Item,
    /// Response on theta + group
    pub main_effects: ModelSummary,
    /// Response on theta + group + theta:group
    pub interaction: ModelSummary,
    /// Elevated indicator on theta + group
    pub elevated_main_effects: ModelSummary,
    /// Elevated indicator on theta + group + theta:group
    pub elevated_interaction: ModelSummary,
    /// Expected response gap over the grid
    pub response_difference: GroupDifference,
    /// Elevated probability gap over the grid
    pub elevated_difference: GroupDifference,
    /// Expected response and category curves
    #[serde(skip)]
    pub response_curve: ProjectedCurve,
    /// Elevated probability curves
    #[serde(skip)]
    pub elevated_curve: ProjectedCurve,
}

/// Fit all four models of `item` and project the interaction models on `grid`
///
/// # Errors
/// Any model failure, with the item in its context.
pub fn item_impact(
    data: &ResponseData,
    theta: &ThetaScores,
    grid: &EvaluationGrid,
    item: Item,
    pseudo_r2: PseudoR2,
    optimizer: &LbfgsOptimizer,
) -> Result<ItemImpact> {
    let fit = |outcome, spec| ItemResponseModel::fit(data, theta, item, outcome, spec, optimizer);

    let main = fit(Outcome::Ordinal, ModelSpec::MainEffects)?;
    let interaction = fit(Outcome::Ordinal, ModelSpec::Interaction)?;
    let elevated_main = fit(Outcome::Elevated, ModelSpec::MainEffects)?;
    let elevated_interaction = fit(Outcome::Elevated, ModelSpec::Interaction)?;

    let response_curve = project(&interaction, grid);
    let elevated_curve = project(&elevated_interaction, grid);

    Ok(ItemImpact {
        item,
        main_effects: main.summary(pseudo_r2)?,
        interaction: interaction.summary(pseudo_r2)?,
        elevated_main_effects: elevated_main.summary(pseudo_r2)?,
        elevated_interaction: elevated_interaction.summary(pseudo_r2)?,
        response_difference: response_curve.difference,
        elevated_difference: elevated_curve.difference,
        response_curve,
        elevated_curve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThetaVariant;
    use crate::simulation::{SimulationSpec, simulate_responses};

    /// Anhedonia is harder to endorse in the focal group; theta is the
    /// standardized sum score.
    fn toy() -> (ResponseData, ThetaScores) {
        let data = simulate_responses(&SimulationSpec {
            n_per_group: 300,
            dif_item: Some(Item::Anhedonia),
            ..SimulationSpec::default()
        })
        .unwrap();
        let raw: Vec<f64> = data.sum_scores().into_iter().map(f64::from).collect();
        let theta = ThetaScores::standardized(ThetaVariant::DifCalibrated, &raw).unwrap();
        (data, theta)
    }

    #[test]
    fn test_probabilities_sum_to_one_on_grid() {
        let (data, theta) = toy();
        let grid = EvaluationGrid::from_scores(&theta, 0.05).unwrap();
        let impact = item_impact(
            &data,
            &theta,
            &grid,
            Item::Anhedonia,
            PseudoR2::Nagelkerke,
            &LbfgsOptimizer::default(),
        )
        .unwrap();
        for point in &impact.response_curve.points {
            let probs = point.probabilities.unwrap();
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        }
        assert!(impact.response_difference.signed < 0.0);
        assert!(impact.response_difference.unsigned >= impact.response_difference.signed.abs());
        assert_eq!(impact.interaction.coefficients.len(), 3);
        assert_eq!(impact.elevated_main_effects.coefficients.len(), 2);
    }
}
