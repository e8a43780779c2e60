//! Iterative DIF purification on the simulated scenarios

mod utils;

use phq_dif::config::{DifConfig, EstimatorConfig};
use phq_dif::{DifClass, DifCriterion, DifScanner, GradedResponseEstimator, PseudoR2};

use utils::{DIF_ITEM, SCENARIO_N, dif_data, no_dif_data};

fn estimator() -> GradedResponseEstimator {
    GradedResponseEstimator::new(EstimatorConfig::default()).unwrap()
}

#[test]
fn test_no_dif_keeps_the_anchor_set() {
    let data = no_dif_data(SCENARIO_N);
    let est = estimator();
    let scan = DifScanner::new(DifConfig::default(), &est).scan(&data).unwrap();

    assert!(scan.anchors.len() >= 7, "anchors: {}", scan.anchors);
    assert_eq!(scan.statistics.len(), 9);
    assert_eq!(scan.history.len(), scan.iterations);
    for s in &scan.statistics {
        assert!(s.chi12 >= 0.0 && s.chi13 >= 0.0 && s.chi23 >= 0.0);
        assert!((0.0..=1.0).contains(&s.p12));
        assert!(s.r2_change_13 >= s.r2_change_12 - 1e-6);
    }
}

#[test]
fn test_shifted_item_is_the_only_one_flagged() {
    let data = dif_data(SCENARIO_N);
    let est = estimator();
    let scan = DifScanner::new(DifConfig::default(), &est).scan(&data).unwrap();

    assert_eq!(scan.flagged, vec![DIF_ITEM]);
    assert!(!scan.anchors.contains(DIF_ITEM));
    assert_eq!(scan.anchors.len(), 8);
    let stats = scan.statistics_for(DIF_ITEM).unwrap();
    assert_eq!(stats.class, DifClass::Uniform);
    assert!(stats.r2_change_12 >= 0.02);
    // Released in the final model
    assert!(!scan.fit.item(DIF_ITEM).invariant);
}

#[test]
fn test_repeated_scans_are_identical() {
    let data = dif_data(400);
    let est = estimator();
    let scanner = DifScanner::new(DifConfig::default(), &est);
    let first = scanner.scan(&data).unwrap();
    let second = scanner.scan(&data).unwrap();

    assert_eq!(first.anchors, second.anchors);
    assert_eq!(first.history, second.history);
    assert_eq!(first.theta.values(), second.theta.values());
    assert_eq!(first.statistics, second.statistics);
}

#[test]
fn test_chi_square_criterion_flags_the_shifted_item() {
    let data = dif_data(600);
    let est = estimator();
    let config = DifConfig {
        criterion: DifCriterion::ChiSquare { alpha: 0.001 },
        pseudo_r2: PseudoR2::McFadden,
        ..DifConfig::default()
    };
    let scan = DifScanner::new(config, &est).scan(&data).unwrap();
    assert!(scan.flagged.contains(&DIF_ITEM));
    assert!(scan.statistics_for(DIF_ITEM).unwrap().p12 < 0.001);
}
