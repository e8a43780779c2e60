//! Release-and-test sensitivity on the simulated scenarios

mod utils;

use phq_dif::config::{BatchConfig, EstimatorConfig, SensitivityConfig};
use phq_dif::{
    Baseline, BatchRunner, GradedResponseEstimator, InvarianceSet, Item, ReleaseEstimator,
    ResponseData, ThetaVariant,
};

use utils::{DIF_ITEM, SCENARIO_N, dif_data, mean_abs_diff, no_dif_data};

fn baseline(est: &GradedResponseEstimator, data: &ResponseData) -> Baseline {
    let (fit, theta) = est
        .estimate_theta(data, &InvarianceSet::all(), ThetaVariant::FullyConstrained, None)
        .unwrap();
    Baseline { fit, theta }
}

fn estimator() -> GradedResponseEstimator {
    GradedResponseEstimator::new(EstimatorConfig::default()).unwrap()
}

#[test]
fn test_zero_threshold_makes_every_release_impactful() {
    let data = no_dif_data(300);
    let est = estimator();
    let base = baseline(&est, &data);
    let config = SensitivityConfig {
        practical_threshold: 0.0,
        ..SensitivityConfig::default()
    };
    let release = ReleaseEstimator::new(config, &est, &base);
    let runner = BatchRunner::new(&BatchConfig {
        workers: 3,
        show_progress: false,
    })
    .unwrap();

    let outcome = runner.run("release", &Item::ALL, |item| release.run(&data, item));
    assert!(outcome.is_complete(), "{:?}", outcome.failures);
    let (results, _) = outcome.into_parts();
    assert_eq!(results.len(), 9);
    for r in &results {
        assert!(r.impactful, "{}", r.item);
        assert!(r.mean_absolute_difference > 0.0);
        assert!(r.max_absolute_difference >= r.mean_absolute_difference);
        assert_eq!(r.theta.variant, ThetaVariant::Released(r.item));
        assert_eq!(r.n, data.len());
    }
}

#[test]
fn test_release_differences_match_theta_columns() {
    let data = dif_data(300);
    let est = estimator();
    let base = baseline(&est, &data);
    let release = ReleaseEstimator::new(SensitivityConfig::default(), &est, &base);
    let result = release.run(&data, Item::Concentration).unwrap();
    let expected = mean_abs_diff(result.theta.values(), base.theta.values());
    assert!((result.mean_absolute_difference - expected).abs() < 1e-12);
    assert!((0.0..=1.0).contains(&result.share_exceeding));
}

#[test]
fn test_dif_item_release_exceeds_no_dif_noise_floor() {
    let est = estimator();

    let clean = no_dif_data(SCENARIO_N);
    let clean_base = baseline(&est, &clean);
    let floor = ReleaseEstimator::new(SensitivityConfig::default(), &est, &clean_base)
        .run(&clean, DIF_ITEM)
        .unwrap()
        .mean_absolute_difference;

    let shifted = dif_data(SCENARIO_N);
    let shifted_base = baseline(&est, &shifted);
    let result = ReleaseEstimator::new(SensitivityConfig::default(), &est, &shifted_base)
        .run(&shifted, DIF_ITEM)
        .unwrap();

    assert!(
        result.mean_absolute_difference > floor,
        "released {} vs floor {floor}",
        result.mean_absolute_difference
    );
}
