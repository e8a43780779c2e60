//! Expected a posteriori trait scores

use rayon::prelude::*;
use serde::Serialize;

use crate::algorithm::irt::estimator::{GradedResponseEstimator, GrmFit, LogProbTable};
use crate::error::Result;
use crate::math::QuadratureGrid;
use crate::models::theta::{ThetaScores, ThetaVariant};
use crate::models::types::Group;
use crate::models::{InvarianceSet, ResponseData};

/// Posterior mean and standard deviation of one respondent's trait
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EapScore {
    /// Posterior mean
    pub theta: f64,
    /// Posterior standard deviation
    pub se: f64,
}

/// EAP scores for every respondent under a fitted model, in respondent order
#[must_use]
pub fn eap_scores(fit: &GrmFit, data: &ResponseData, grid: &QuadratureGrid) -> Vec<EapScore> {
    let nodes = grid.nodes();
    let table = LogProbTable::build(&fit.items, nodes);
    let priors = Group::BOTH.map(|g| {
        let (mean, sd) = fit.latent_distribution(g);
        grid.log_normal_weights(mean, sd)
    });

    data.respondents()
        .par_iter()
        .map_init(
            || vec![0.0; nodes.len()],
            |posterior, respondent| {
                table.log_posterior(respondent, &priors[respondent.group.index()], posterior);
                let mut mean = 0.0;
                let mut second = 0.0;
                for (&t, &lp) in nodes.iter().zip(posterior.iter()) {
                    let w = lp.exp();
                    mean += w * t;
                    second += w * t * t;
                }
                EapScore {
                    theta: mean,
                    se: (second - mean * mean).max(0.0).sqrt(),
                }
            },
        )
        .collect()
}

impl GradedResponseEstimator {
    /// Fit a model variant and return it with its standardized theta column
    ///
    /// # Errors
    /// Propagates estimator errors; `Computation` if the scores are constant.
    pub fn estimate_theta(
        &self,
        data: &ResponseData,
        invariance: &InvarianceSet,
        variant: ThetaVariant,
        start: Option<&GrmFit>,
    ) -> Result<(GrmFit, ThetaScores)> {
        let fit = self.fit_from(data, invariance, start)?;
        let raw: Vec<f64> = eap_scores(&fit, data, self.grid())
            .into_iter()
            .map(|s| s.theta)
            .collect();
        let scores = ThetaScores::standardized(variant, &raw)?;
        Ok((fit, scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;
    use crate::math::stats::mean_sd;
    use crate::simulation::{SimulationSpec, simulate_responses};
    use approx::assert_relative_eq;

    #[test]
    fn test_standardized_scores_and_ordering() {
        let data = simulate_responses(&SimulationSpec {
            n_per_group: 250,
            ..SimulationSpec::default()
        })
        .unwrap();
        let estimator = GradedResponseEstimator::new(EstimatorConfig::default()).unwrap();
        let (fit, scores) = estimator
            .estimate_theta(&data, &InvarianceSet::all(), ThetaVariant::FullyConstrained, None)
            .unwrap();
        assert_eq!(scores.len(), data.len());
        let (mean, sd) = mean_sd(scores.values()).unwrap();
        assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        assert_relative_eq!(sd, 1.0, epsilon = 1e-9);

        // Highest sum score outranks the lowest.
        let eap = eap_scores(&fit, &data, estimator.grid());
        let sums = data.sum_scores();
        let (lo, hi) = sums
            .iter()
            .enumerate()
            .fold((0, 0), |(lo, hi), (i, &s)| {
                (
                    if s < sums[lo] { i } else { lo },
                    if s > sums[hi] { i } else { hi },
                )
            });
        assert!(eap[hi].theta > eap[lo].theta);
        assert!(eap.iter().all(|s| s.se > 0.0 && s.se < 1.5));
    }
}
