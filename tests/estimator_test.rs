//! Graded response estimator on simulated samples

mod utils;

use approx::assert_abs_diff_eq;
use phq_dif::config::EstimatorConfig;
use phq_dif::math::stats::mean_sd;
use phq_dif::{
    AnalysisError, GradedResponseEstimator, InvarianceSet, Item, Respondent, ResponseData,
    ThetaVariant,
};

use utils::{dif_data, no_dif_data, with_constant_focal_item};

fn estimator() -> GradedResponseEstimator {
    GradedResponseEstimator::new(EstimatorConfig::default()).unwrap()
}

#[test]
fn test_every_variant_is_standardized() {
    let data = no_dif_data(400);
    let est = estimator();
    let variants = [
        (InvarianceSet::all(), ThetaVariant::FullyConstrained),
        (InvarianceSet::core(), ThetaVariant::CoreConstrained),
        (InvarianceSet::all_except(Item::Sleep), ThetaVariant::Released(Item::Sleep)),
    ];
    for (invariance, variant) in variants {
        let (fit, theta) = est.estimate_theta(&data, &invariance, variant, None).unwrap();
        assert_eq!(theta.variant, variant);
        assert_eq!(theta.len(), data.len());
        assert_eq!(fit.invariance, invariance);
        let (mean, sd) = mean_sd(theta.values()).unwrap();
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sd, 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_free_items_get_group_specific_parameters() {
    let data = dif_data(500);
    let fit = estimator()
        .fit(&data, &InvarianceSet::all_except(utils::DIF_ITEM))
        .unwrap();
    let released = fit.item(utils::DIF_ITEM);
    assert!(!released.invariant);
    // Harder to endorse in the focal group: lower first intercept
    assert!(released.focal.intercepts[0] < released.reference.intercepts[0]);
    for item in Item::ALL.into_iter().filter(|&i| i != utils::DIF_ITEM) {
        let c = fit.item(item);
        assert!(c.invariant);
        assert_eq!(c.reference, c.focal);
    }
}

#[test]
fn test_same_input_same_fit() {
    let data = no_dif_data(300);
    let a = estimator().fit(&data, &InvarianceSet::all()).unwrap();
    let b = estimator().fit(&data, &InvarianceSet::all()).unwrap();
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.log_likelihood, b.log_likelihood);
    assert_eq!(a.focal_mean, b.focal_mean);
}

#[test]
fn test_empty_invariance_set_is_not_identified() {
    let data = no_dif_data(100);
    let err = estimator()
        .fit(&data, &InvarianceSet::from_items(Vec::<Item>::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Identifiability {
            invariant: 0,
            required: 2
        }
    ));
}

#[test]
fn test_item_constant_within_a_group_cannot_be_released() {
    let data = with_constant_focal_item(&no_dif_data(200), Item::Psychomotor);
    let err = estimator()
        .fit(&data, &InvarianceSet::all_except(Item::Psychomotor))
        .unwrap_err();
    match err {
        AnalysisError::InputValidation { context, .. } => {
            assert!(context.contains("phq8"), "{context}");
        }
        other => panic!("expected input validation, got {other}"),
    }
}

#[test]
fn test_zero_variance_item_is_rejected_before_fitting() {
    let respondents: Vec<Respondent> = no_dif_data(50)
        .respondents()
        .iter()
        .cloned()
        .map(|mut r| {
            r.responses[Item::SuicidalIdeation.index()] = 0;
            r
        })
        .collect();
    let err = ResponseData::with_default_labels(respondents).unwrap_err();
    assert_eq!(err.kind(), "input_validation");
    assert!(err.to_string().contains("phq9"));
}
