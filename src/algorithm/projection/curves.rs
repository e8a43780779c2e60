//! Response-curve projection and between-group differences

use serde::Serialize;

use crate::algorithm::projection::grid::EvaluationGrid;
use crate::models::types::{Group, N_CATEGORIES};

/// A fitted model that predicts a response from theta and group
pub trait ResponseModel: Send + Sync {
    /// Short name of the model, used to label curves
    fn name(&self) -> String;

    /// Expected response (or expected sum score)
    fn expected(&self, theta: f64, group: Group) -> f64;

    /// Category probabilities, for models of an ordinal outcome
    fn category_probabilities(&self, _theta: f64, _group: Group) -> Option<[f64; N_CATEGORIES]> {
        None
    }
}

/// Prediction at one grid point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedPoint {
    /// Latent trait value
    pub theta: f64,
    /// Group
    pub group: Group,
    /// Expected response
    pub expected: f64,
    /// Category probabilities, when the model has categories
    pub probabilities: Option<[f64; N_CATEGORIES]>,
}

/// Average between-group prediction gap over the grid (focal minus reference)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GroupDifference {
    /// Mean of `focal - reference`
    pub signed: f64,
    /// Mean of `|focal - reference|`
    pub unsigned: f64,
}

/// A model's predictions over a whole grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedCurve {
    /// Model name
    pub model: String,
    /// Points, reference group first
    pub points: Vec<ProjectedPoint>,
    /// Headline between-group difference
    pub difference: GroupDifference,
}

impl ProjectedCurve {
    /// Points of one group
    pub fn group_points(&self, group: Group) -> impl Iterator<Item = &ProjectedPoint> {
        self.points.iter().filter(move |p| p.group == group)
    }
}

/// Predict `model` at every grid point and summarize the group gap
#[must_use]
pub fn project(model: &dyn ResponseModel, grid: &EvaluationGrid) -> ProjectedCurve {
    let points: Vec<ProjectedPoint> = grid
        .points()
        .map(|p| ProjectedPoint {
            theta: p.theta,
            group: p.group,
            expected: model.expected(p.theta, p.group),
            probabilities: model.category_probabilities(p.theta, p.group),
        })
        .collect();

    let n = grid.len();
    let (reference, focal) = points.split_at(n);
    let difference = if n == 0 {
        GroupDifference::default()
    } else {
        let (signed, unsigned) = reference
            .iter()
            .zip(focal)
            .map(|(r, f)| f.expected - r.expected)
            .fold((0.0, 0.0), |(s, u), d| (s + d, u + d.abs()));
        GroupDifference {
            signed: signed / n as f64,
            unsigned: unsigned / n as f64,
        }
    };

    ProjectedCurve {
        model: model.name(),
        points,
        difference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Focal curve sits `offset` above the reference everywhere, with a
    /// sign flip at theta = 0 when `crossing` is set
    struct Shifted {
        offset: f64,
        crossing: bool,
    }

    impl ResponseModel for Shifted {
        fn name(&self) -> String {
            "shifted".to_string()
        }

        fn expected(&self, theta: f64, group: Group) -> f64 {
            let gap = match (self.crossing, theta.partial_cmp(&0.0)) {
                (false, _) => self.offset,
                (true, Some(std::cmp::Ordering::Greater)) => self.offset,
                (true, Some(std::cmp::Ordering::Less)) => -self.offset,
                (true, _) => 0.0,
            };
            theta + gap * group.as_f64()
        }
    }

    #[test]
    fn test_constant_gap() {
        let grid = EvaluationGrid::from_range(-1.0, 1.0, 0.5).unwrap();
        let curve = project(&Shifted { offset: 0.4, crossing: false }, &grid);
        assert_eq!(curve.points.len(), 10);
        assert_relative_eq!(curve.difference.signed, 0.4, epsilon = 1e-12);
        assert_relative_eq!(curve.difference.unsigned, 0.4, epsilon = 1e-12);
        assert!(curve.points.iter().all(|p| p.probabilities.is_none()));
    }

    #[test]
    fn test_crossing_gap_cancels_in_signed_only() {
        let grid = EvaluationGrid::from_range(-1.0, 1.0, 0.5).unwrap();
        let curve = project(&Shifted { offset: 0.4, crossing: true }, &grid);
        assert_relative_eq!(curve.difference.signed, 0.0, epsilon = 1e-12);
        // Four of five points are off zero.
        assert_relative_eq!(curve.difference.unsigned, 0.32, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_is_repeatable() {
        let grid = EvaluationGrid::from_range(-2.0, 2.0, 0.01).unwrap();
        let model = Shifted { offset: -0.2, crossing: false };
        assert_eq!(project(&model, &grid), project(&model, &grid));
        assert_eq!(project(&model, &grid).group_points(Group::Focal).count(), grid.len());
    }
}
