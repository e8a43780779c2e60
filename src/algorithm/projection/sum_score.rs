//! Sum-score projection and screening impact

use serde::Serialize;

use crate::algorithm::ordinal::SumScoreModel;
use crate::algorithm::projection::curves::{
    GroupDifference, ProjectedCurve, ResponseModel, project,
};
use crate::algorithm::projection::grid::EvaluationGrid;
use crate::error::Result;
use crate::models::theta::ThetaScores;
use crate::models::types::Group;
use crate::models::ResponseData;

impl ResponseModel for SumScoreModel {
    fn name(&self) -> String {
        "sum_score".to_string()
    }

    fn expected(&self, theta: f64, group: Group) -> f64 {
        self.predict(theta, group)
    }
}

/// Named coefficient of the sum-score model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SumScoreCoefficient {
    /// Term name
    pub term: String,
    /// OLS estimate
    pub estimate: f64,
}

/// How group membership shifts the expected sum score and screening
#[derive(Debug, Clone, Serialize)]
pub struct SumScoreImpact {
    /// Model coefficients
    pub coefficients: Vec<SumScoreCoefficient>,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Expected sum score gap over the grid
    pub difference: GroupDifference,
    /// Screening cutoff on the sum score
    pub screening_cutoff: u32,
    /// Lowest grid theta at which each group's expected sum score reaches the
    /// cutoff (reference, focal)
    pub cutoff_crossing: [Option<f64>; 2],
    /// Observed share screening positive (reference, focal)
    pub screen_positive_rate: [f64; 2],
    /// Expected sum score curves
    #[serde(skip)]
    pub curve: ProjectedCurve,
}

/// Fit the polynomial sum-score model on `theta` and project it on `grid`
///
/// # Errors
/// `InputValidation` on length mismatch or too few respondents,
/// `Computation` for a singular design.
pub fn sum_score_impact(
    data: &ResponseData,
    theta: &ThetaScores,
    grid: &EvaluationGrid,
    degree: usize,
    screening_cutoff: u32,
) -> Result<SumScoreImpact> {
    let groups: Vec<Group> = data.respondents().iter().map(|r| r.group).collect();
    let model = SumScoreModel::fit(theta.values(), &groups, &data.sum_scores(), degree)?;
    let curve = project(&model, grid);

    let cutoff = f64::from(screening_cutoff);
    let cutoff_crossing = Group::BOTH.map(|group| {
        curve
            .group_points(group)
            .find(|p| p.expected >= cutoff)
            .map(|p| p.theta)
    });
    let summary = data.summary(screening_cutoff);
    let screen_positive_rate = summary.groups.map(|g| g.screen_positive_rate);

    Ok(SumScoreImpact {
        coefficients: model
            .coefficients()
            .into_iter()
            .map(|(term, estimate)| SumScoreCoefficient {
                term: term.to_string(),
                estimate,
            })
            .collect(),
        r_squared: model.r_squared(),
        difference: curve.difference,
        screening_cutoff,
        cutoff_crossing,
        screen_positive_rate,
        curve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThetaVariant;
    use crate::simulation::{SimulationSpec, simulate_responses};

    #[test]
    fn test_sum_score_tracks_theta() {
        let data = simulate_responses(&SimulationSpec {
            n_per_group: 400,
            ..SimulationSpec::default()
        })
        .unwrap();
        let raw: Vec<f64> = data.sum_scores().into_iter().map(f64::from).collect();
        let theta = ThetaScores::standardized(ThetaVariant::FullyConstrained, &raw).unwrap();
        let grid = EvaluationGrid::from_scores(&theta, 0.01).unwrap();
        let impact = sum_score_impact(&data, &theta, &grid, 4, 10).unwrap();

        // Theta is a linear transform of the sum score, so the fit is exact.
        assert!(impact.r_squared > 0.999);
        assert!(impact.difference.unsigned < 0.05);
        assert_eq!(impact.coefficients.len(), 10);
        if let (Some(r), Some(f)) = (impact.cutoff_crossing[0], impact.cutoff_crossing[1]) {
            assert!((r - f).abs() < 0.05);
        }
        assert!(impact.screen_positive_rate.iter().all(|r| (0.0..=1.0).contains(r)));
    }
}
