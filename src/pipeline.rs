//! End-to-end invariance analysis
//!
//! Each stage reads the validated dataset and the records of earlier stages
//! and returns new records; nothing is mutated in place. Per-item stages run
//! through the batch runner, so one item's failure is reported alongside the
//! other eight results instead of aborting the run.

use std::fmt;
use std::time::Instant;

use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::algorithm::batch::{BatchRunner, ItemFailure};
use crate::algorithm::dif::{DifScan, DifScanner};
use crate::algorithm::irt::{GradedResponseEstimator, GrmFit};
use crate::algorithm::ordinal::LbfgsOptimizer;
use crate::algorithm::projection::{EvaluationGrid, ItemImpact, SumScoreImpact, item_impact, sum_score_impact};
use crate::algorithm::sensitivity::{Baseline, ReleaseEstimator, ReleaseResult};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::math::stats::mean_sd;
use crate::models::theta::{ThetaScores, ThetaTable, ThetaVariant};
use crate::models::types::{Group, Item};
use crate::models::{DataSummary, InvarianceSet, ResponseData};
use crate::utils::logging::{create_item_progress_bar, finish_progress_bar, log_stage_complete};

/// Stages reported on the main progress bar
const N_STAGES: u64 = 5;

/// Fit summary of one whole-scale model variant
#[derive(Debug, Clone, Serialize)]
pub struct ModelFitSummary {
    /// Theta column the model produced
    pub variant: ThetaVariant,
    /// Items constrained equal across groups
    pub invariance: InvarianceSet,
    /// Focal-group latent mean
    pub focal_mean: f64,
    /// Focal-group latent SD
    pub focal_sd: f64,
    /// Marginal log-likelihood
    pub log_likelihood: f64,
    /// EM iterations
    pub iterations: usize,
}

impl ModelFitSummary {
    fn new(variant: ThetaVariant, fit: &GrmFit) -> Self {
        Self {
            variant,
            invariance: fit.invariance.clone(),
            focal_mean: fit.focal_mean,
            focal_sd: fit.focal_sd,
            log_likelihood: fit.log_likelihood,
            iterations: fit.iterations,
        }
    }
}

/// Group means of one standardized theta column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThetaGroupMeans {
    /// Column
    pub variant: ThetaVariant,
    /// Mean theta in the reference group
    pub reference: f64,
    /// Mean theta in the focal group
    pub focal: f64,
}

impl ThetaGroupMeans {
    /// Compute group means of `scores` for the respondents of `data`
    #[must_use]
    pub fn new(data: &ResponseData, scores: &ThetaScores) -> Self {
        let means = Group::BOTH.map(|group| {
            let values: Vec<f64> = data
                .respondents()
                .iter()
                .zip(scores.values())
                .filter(|(r, _)| r.group == group)
                .map(|(_, &t)| t)
                .collect();
            mean_sd(&values).map_or(f64::NAN, |(m, _)| m)
        });
        Self {
            variant: scores.variant,
            reference: means[0],
            focal: means[1],
        }
    }

    /// Focal minus reference
    #[must_use]
    pub fn difference(&self) -> f64 {
        self.focal - self.reference
    }
}

/// Everything one analysis run produces
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Settings the run used
    pub config: AnalysisConfig,
    /// Sample description
    pub data: DataSummary,
    /// Whole-scale fits (fully constrained, core constrained, DIF calibrated)
    pub models: Vec<ModelFitSummary>,
    /// Group means of every theta column
    pub theta_means: Vec<ThetaGroupMeans>,
    /// DIF purification outcome
    pub dif: DifScan,
    /// Release-and-test results in questionnaire order
    pub releases: Vec<ReleaseResult>,
    /// Per-item projections in questionnaire order
    pub impacts: Vec<ItemImpact>,
    /// Sum-score projection
    pub sum_score: SumScoreImpact,
    /// Items whose per-item stage failed
    pub failures: Vec<ItemFailure>,
    /// All theta columns
    #[serde(skip)]
    pub theta: ThetaTable,
}

impl AnalysisReport {
    /// Release result of one item, if it succeeded
    #[must_use]
    pub fn release(&self, item: Item) -> Option<&ReleaseResult> {
        self.releases.iter().find(|r| r.item == item)
    }

    /// Projection of one item, if it succeeded
    #[must_use]
    pub fn impact(&self, item: Item) -> Option<&ItemImpact> {
        self.impacts.iter().find(|i| i.item == item)
    }

    /// Group means of one theta column
    #[must_use]
    pub fn theta_means(&self, variant: ThetaVariant) -> Option<&ThetaGroupMeans> {
        self.theta_means.iter().find(|m| m.variant == variant)
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Report:")?;
        writeln!(f, "  Respondents: {}", self.data.n)?;
        writeln!(
            f,
            "  DIF flagged: {} after {} round(s)",
            if self.dif.flagged.is_empty() {
                "none".to_string()
            } else {
                self.dif.flagged.iter().map(|i| i.code()).join(", ")
            },
            self.dif.iterations
        )?;
        writeln!(
            f,
            "  Impactful releases: {} of {}",
            self.releases.iter().filter(|r| r.impactful).count(),
            self.releases.len()
        )?;
        writeln!(f, "  Item projections: {}", self.impacts.len())?;
        writeln!(f, "  Failures: {}", self.failures.len())?;
        Ok(())
    }
}

/// The configured analysis
pub struct Pipeline {
    config: AnalysisConfig,
    estimator: GradedResponseEstimator,
    runner: BatchRunner,
    optimizer: LbfgsOptimizer,
}

impl Pipeline {
    /// Validate the configuration and set up the estimator and worker pool
    ///
    /// # Errors
    /// `InputValidation` for an invalid configuration.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let estimator = GradedResponseEstimator::new(config.estimator.clone())?;
        let runner = BatchRunner::new(&config.batch)?;
        let optimizer = LbfgsOptimizer::new(config.projection.optimizer.clone());
        Ok(Self {
            config,
            estimator,
            runner,
            optimizer,
        })
    }

    /// Run the complete analysis with `config` on `data`
    ///
    /// # Errors
    /// Configuration errors, and any error of a whole-scale stage (baseline
    /// fits, DIF scan, sum-score model). Per-item failures are collected in
    /// the report instead.
    pub fn run(data: &ResponseData, config: &AnalysisConfig) -> Result<AnalysisReport> {
        Self::new(config.clone())?.execute(data)
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the analysis on `data`
    ///
    /// # Errors
    /// See [`Pipeline::run`].
    pub fn execute(&self, data: &ResponseData) -> Result<AnalysisReport> {
        let start = Instant::now();
        info!(
            "Starting invariance analysis of {} respondents with {} workers",
            data.len(),
            self.runner.workers()
        );
        let pb = create_item_progress_bar(N_STAGES, "analysis", self.config.batch.show_progress);
        let mut failures = Vec::new();

        // Baseline and core-anchored theta
        let stage = Instant::now();
        pb.set_message("baseline");
        let (baseline_fit, baseline_theta) = self.estimator.estimate_theta(
            data,
            &InvarianceSet::all(),
            ThetaVariant::FullyConstrained,
            None,
        )?;
        let (core_fit, core_theta) = self.estimator.estimate_theta(
            data,
            &InvarianceSet::core(),
            ThetaVariant::CoreConstrained,
            Some(&baseline_fit),
        )?;
        let baseline = Baseline {
            fit: baseline_fit,
            theta: baseline_theta,
        };
        log_stage_complete("baseline", stage.elapsed());
        pb.inc(1);

        // DIF purification
        let stage = Instant::now();
        pb.set_message("dif");
        let dif = DifScanner::new(self.config.dif.clone(), &self.estimator).scan_from(
            data,
            baseline.fit.clone(),
            baseline.theta.clone(),
        )?;
        log_stage_complete("dif", stage.elapsed());
        pb.inc(1);

        let theta = ThetaTable::new()
            .with_column(baseline.theta.clone())
            .with_column(core_theta)
            .with_column(dif.theta.clone());

        // Release-and-test per item
        let stage = Instant::now();
        pb.set_message("sensitivity");
        let release = ReleaseEstimator::new(
            self.config.sensitivity.clone(),
            &self.estimator,
            &baseline,
        );
        let outcome = self
            .runner
            .run("sensitivity", &Item::ALL, |item| release.run(data, item));
        let (releases, release_failures) = outcome.into_parts();
        failures.extend(release_failures);
        let theta = releases
            .iter()
            .fold(theta, |table, r| table.with_column(r.theta.clone()));
        log_stage_complete("sensitivity", stage.elapsed());
        pb.inc(1);

        // Per-item projections
        let stage = Instant::now();
        pb.set_message("projection");
        let projection = &self.config.projection;
        let basis = theta.require(projection.theta_variant)?;
        let grid = EvaluationGrid::from_scores(basis, projection.grid_step)?;
        let pseudo_r2 = self.config.dif.pseudo_r2;
        let outcome = self.runner.run("projection", &Item::ALL, |item| {
            item_impact(data, basis, &grid, item, pseudo_r2, &self.optimizer)
        });
        let (impacts, impact_failures) = outcome.into_parts();
        failures.extend(impact_failures);
        log_stage_complete("projection", stage.elapsed());
        pb.inc(1);

        // Sum score
        let stage = Instant::now();
        pb.set_message("sum score");
        let sum_score = sum_score_impact(
            data,
            basis,
            &grid,
            projection.sum_score_degree,
            projection.screening_cutoff,
        )?;
        log_stage_complete("sum score", stage.elapsed());
        pb.inc(1);

        let models = vec![
            ModelFitSummary::new(ThetaVariant::FullyConstrained, &baseline.fit),
            ModelFitSummary::new(ThetaVariant::CoreConstrained, &core_fit),
            ModelFitSummary::new(ThetaVariant::DifCalibrated, &dif.fit),
        ];
        let theta_means = theta
            .columns()
            .iter()
            .map(|scores| ThetaGroupMeans::new(data, scores))
            .collect();

        finish_progress_bar(&pb, "analysis complete");
        info!(
            "Invariance analysis finished in {:.2?} ({} item failure(s))",
            start.elapsed(),
            failures.len()
        );

        Ok(AnalysisReport {
            config: self.config.clone(),
            data: data.summary(projection.screening_cutoff),
            models,
            theta_means,
            dif,
            releases,
            impacts,
            sum_score,
            failures,
            theta,
        })
    }
}
