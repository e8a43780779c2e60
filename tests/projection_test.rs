//! Response-curve projection of fitted item and sum-score models

mod utils;

use phq_dif::algorithm::ordinal::LbfgsOptimizer;
use phq_dif::algorithm::projection::{
    ItemResponseModel, ModelSpec, Outcome, item_impact, sum_score_impact,
};
use phq_dif::config::{EstimatorConfig, OptimizerConfig};
use phq_dif::{
    EvaluationGrid, GradedResponseEstimator, Group, InvarianceSet, Item, PseudoR2, ThetaScores,
    ThetaVariant, project,
};

use utils::{DIF_ITEM, dif_data};

fn dif_theta(data: &phq_dif::ResponseData) -> ThetaScores {
    let est = GradedResponseEstimator::new(EstimatorConfig::default()).unwrap();
    let (_, theta) = est
        .estimate_theta(
            data,
            &InvarianceSet::all_except(DIF_ITEM),
            ThetaVariant::DifCalibrated,
            None,
        )
        .unwrap();
    theta
}

#[test]
fn test_category_probabilities_are_distributions() {
    let data = dif_data(400);
    let theta = dif_theta(&data);
    let grid = EvaluationGrid::from_scores(&theta, 0.05).unwrap();
    let optimizer = LbfgsOptimizer::new(OptimizerConfig::default());

    for item in Item::ALL {
        let impact = item_impact(&data, &theta, &grid, item, PseudoR2::Nagelkerke, &optimizer).unwrap();
        assert_eq!(impact.response_curve.points.len(), 2 * grid.len());
        for point in &impact.response_curve.points {
            let probs = point.probabilities.expect("ordinal curves carry probabilities");
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)), "{item}: {probs:?}");
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
            assert!((0.0..=3.0).contains(&point.expected));
        }
        for point in &impact.elevated_curve.points {
            let probs = point.probabilities.unwrap();
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
            // Two-level outcome: upper categories carry no mass
            assert!(probs[2].abs() < 1e-12 && probs[3].abs() < 1e-12);
        }
        assert!(impact.response_difference.unsigned >= impact.response_difference.signed.abs() - 1e-12);
    }
}

#[test]
fn test_projection_is_repeatable() {
    let data = dif_data(300);
    let theta = dif_theta(&data);
    let grid = EvaluationGrid::from_range(-3.0, 3.0, 0.01).unwrap();
    assert_eq!(grid.len(), 601);
    let optimizer = LbfgsOptimizer::new(OptimizerConfig::default());
    let model = ItemResponseModel::fit(
        &data,
        &theta,
        Item::Sleep,
        Outcome::Ordinal,
        ModelSpec::Interaction,
        &optimizer,
    )
    .unwrap();

    let first = project(&model, &grid);
    let second = project(&model, &grid);
    assert_eq!(first, second);
    assert_eq!(first.model, "phq3_response_interaction");
    assert_eq!(first.group_points(Group::Reference).count(), 601);
}

#[test]
fn test_dif_item_is_lower_for_the_focal_group() {
    let data = dif_data(500);
    let theta = dif_theta(&data);
    let grid = EvaluationGrid::from_range(-2.0, 2.0, 0.01).unwrap();
    let optimizer = LbfgsOptimizer::new(OptimizerConfig::default());
    let impact = item_impact(&data, &theta, &grid, DIF_ITEM, PseudoR2::Nagelkerke, &optimizer).unwrap();
    assert!(impact.response_difference.signed < 0.0);
    assert!(impact.elevated_difference.signed < 0.0);
    let group = impact
        .main_effects
        .coefficients
        .iter()
        .find(|c| c.term == "group")
        .unwrap();
    assert!(group.ci_upper < 1.0, "odds ratio interval {:?}", (group.ci_lower, group.ci_upper));
}

#[test]
fn test_sum_score_curves() {
    let data = dif_data(400);
    let theta = dif_theta(&data);
    let grid = EvaluationGrid::from_scores(&theta, 0.01).unwrap();
    let impact = sum_score_impact(&data, &theta, &grid, 4, 10).unwrap();
    assert_eq!(impact.coefficients.len(), 10);
    assert!(impact.r_squared > 0.8);
    assert!(impact.curve.points.iter().all(|p| p.probabilities.is_none()));
    // Focal respondents endorse the DIF item less at equal theta
    assert!(impact.difference.signed < 0.0);
    for crossing in impact.cutoff_crossing.into_iter().flatten() {
        assert!(crossing >= grid.thetas()[0]);
    }
}
