//! Shared fixtures for the integration tests
#![allow(dead_code)]

use phq_dif::config::BatchConfig;
use phq_dif::{AnalysisConfig, Item, Respondent, ResponseData, SimulationSpec, simulate_responses};

/// Respondents per group in the end-to-end scenarios
pub const SCENARIO_N: usize = 1000;

/// Item carrying uniform DIF in the DIF scenario
pub const DIF_ITEM: Item = Item::Appetite;

/// Default analysis settings without progress bars and with a small pool
#[must_use]
pub fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        batch: BatchConfig {
            workers: 4,
            show_progress: false,
        },
        ..AnalysisConfig::default()
    }
}

/// Two groups drawn from one model: no DIF, equal latent distributions
#[must_use]
pub fn no_dif_data(n_per_group: usize) -> ResponseData {
    simulate_responses(&SimulationSpec {
        n_per_group,
        dif_item: None,
        ..SimulationSpec::default()
    })
    .expect("simulation without DIF")
}

/// Same draw with `DIF_ITEM` one logit harder to endorse in the focal group
#[must_use]
pub fn dif_data(n_per_group: usize) -> ResponseData {
    simulate_responses(&SimulationSpec {
        n_per_group,
        dif_item: Some(DIF_ITEM),
        ..SimulationSpec::default()
    })
    .expect("simulation with DIF")
}

/// Copy of `data` where every focal respondent answers 0 to `item`
#[must_use]
pub fn with_constant_focal_item(data: &ResponseData, item: Item) -> ResponseData {
    let respondents: Vec<Respondent> = data
        .respondents()
        .iter()
        .cloned()
        .map(|mut r| {
            if r.group == phq_dif::Group::Focal {
                r.responses[item.index()] = 0;
            }
            r
        })
        .collect();
    ResponseData::with_default_labels(respondents).expect("item still varies in the reference group")
}

/// Mean absolute difference of two equally long columns
#[must_use]
pub fn mean_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f64>() / a.len() as f64
}
