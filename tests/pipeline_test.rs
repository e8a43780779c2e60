//! End-to-end analysis runs on simulated samples

mod utils;

use std::sync::OnceLock;

use phq_dif::io::{read_responses_parquet, responses_to_batch};
use phq_dif::{
    AnalysisConfig, AnalysisReport, Item, Pipeline, ThetaVariant, grid_to_batch, report,
    write_batch_parquet,
};

use utils::{DIF_ITEM, SCENARIO_N, dif_data, mean_abs_diff, no_dif_data, test_config};

fn no_dif_report() -> &'static AnalysisReport {
    static REPORT: OnceLock<AnalysisReport> = OnceLock::new();
    REPORT.get_or_init(|| Pipeline::run(&no_dif_data(SCENARIO_N), &test_config()).unwrap())
}

fn dif_report() -> &'static AnalysisReport {
    static REPORT: OnceLock<AnalysisReport> = OnceLock::new();
    REPORT.get_or_init(|| Pipeline::run(&dif_data(SCENARIO_N), &test_config()).unwrap())
}

#[test]
fn test_no_dif_scenario() {
    let report = no_dif_report();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(report.dif.anchors.len() >= 7, "anchors: {}", report.dif.anchors);

    let constrained = report.theta.require(ThetaVariant::FullyConstrained).unwrap();
    let calibrated = report.theta.require(ThetaVariant::DifCalibrated).unwrap();
    let shift = mean_abs_diff(calibrated.values(), constrained.values());
    assert!(shift < 0.1, "mean |theta shift| = {shift}");

    assert_eq!(report.releases.len(), 9);
    assert_eq!(report.impacts.len(), 9);
    assert_eq!(report.models.len(), 3);
}

#[test]
fn test_dif_scenario() {
    let report = dif_report();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.dif.flagged, vec![DIF_ITEM]);

    let floor = no_dif_report()
        .release(DIF_ITEM)
        .unwrap()
        .mean_absolute_difference;
    let released = report.release(DIF_ITEM).unwrap().mean_absolute_difference;
    assert!(released > floor, "released {released} vs floor {floor}");

    let impact = report.impact(DIF_ITEM).unwrap();
    assert!(impact.response_difference.signed < 0.0);
    assert!(impact.response_difference.unsigned > 0.0);
}

#[test]
fn test_theta_columns_are_kept_side_by_side() {
    let report = no_dif_report();
    // Fully constrained, core, DIF calibrated and one per release
    assert_eq!(report.theta.columns().len(), 3 + 9);
    for item in Item::ALL {
        assert!(report.theta.get(ThetaVariant::Released(item)).is_some());
    }
    assert_eq!(report.theta_means.len(), report.theta.columns().len());
    let means = report.theta_means(ThetaVariant::CoreConstrained).unwrap();
    assert!(means.difference().is_finite());
}

#[test]
fn test_report_serialization_and_text() {
    let report = dif_report();
    let json = report::to_json(report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["releases"].as_array().unwrap().len(), 9);
    assert_eq!(value["dif"]["flagged"][0], "Appetite");
    assert!(value.get("theta").is_none());

    let text = report::render(report);
    assert!(text.contains("DIF summary"));
    assert!(text.contains("phq5"));
    assert!(text.contains("sum score"));
}

#[test]
fn test_outputs_round_trip_through_parquet() {
    let dir = std::env::temp_dir().join(format!("phq-dif-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let data = no_dif_data(100);
    let input = dir.join("responses.parquet");
    write_batch_parquet(&input, &responses_to_batch(&data).unwrap()).unwrap();
    let back = read_responses_parquet(&input).unwrap();
    assert_eq!(back.respondents(), data.respondents());

    let impact = dif_report().impact(Item::Sleep).unwrap();
    let batch = grid_to_batch(&[&impact.response_curve, &impact.elevated_curve]).unwrap();
    assert_eq!(batch.num_rows(), impact.response_curve.points.len() * 2);
    write_batch_parquet(&dir.join("grid_phq3.parquet"), &batch).unwrap();

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_invalid_configuration_is_rejected_up_front() {
    let mut config = AnalysisConfig::new();
    config.batch.workers = 0;
    let err = Pipeline::run(&no_dif_data(50), &config).unwrap_err();
    assert_eq!(err.kind(), "input_validation");
    assert!(err.to_string().contains("batch.workers"));
}
