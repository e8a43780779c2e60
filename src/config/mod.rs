//! Configuration for the invariance analysis.
//!
//! Every tunable of the estimator, the DIF scanner, the release-and-test
//! estimator, the curve projector and the batch runner lives here with an
//! explicit default. Nothing downstream infers a hidden default.

use serde::Serialize;
use std::fmt;

use crate::error::{AnalysisError, Result};
use crate::models::invariance::MIN_INVARIANT_ITEMS;
use crate::models::theta::ThetaVariant;

/// Settings for the L-BFGS minimizer used inside every model fit
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for the gradient norm
    pub tol: f64,
    /// Number of corrections kept for the inverse Hessian approximation
    pub memory: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tol: 1e-6,
            memory: 7,
        }
    }
}

/// Settings for the multi-group graded response estimator
#[derive(Debug, Clone, Serialize)]
pub struct EstimatorConfig {
    /// Number of quadrature nodes
    pub quadrature_points: usize,
    /// Quadrature covers `[-half_width, half_width]`
    pub quadrature_half_width: f64,
    /// EM iteration budget
    pub max_em_iterations: usize,
    /// EM stops once no parameter moves more than this
    pub em_tolerance: f64,
    /// Estimate focal-group latent mean and variance (reference fixed at N(0, 1))
    pub free_focal_distribution: bool,
    /// Seed for start-value jitter; `None` disables jitter
    pub seed: Option<u64>,
    /// Per-item M-step minimizer
    pub optimizer: OptimizerConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            quadrature_points: 61,
            quadrature_half_width: 6.0,
            max_em_iterations: 500,
            em_tolerance: 1e-4,
            free_focal_distribution: true,
            seed: Some(20_240_101),
            optimizer: OptimizerConfig {
                max_iter: 100,
                tol: 1e-7,
                memory: 5,
            },
        }
    }
}

/// Rule that flags an item as exhibiting DIF
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DifCriterion {
    /// Flag when either pseudo-R² increment reaches the threshold
    R2Change {
        /// Minimum pseudo-R² increment
        threshold: f64,
    },
    /// Flag when either likelihood-ratio test is significant
    ChiSquare {
        /// Significance level
        alpha: f64,
    },
    /// Flag when the theta coefficient changes by this proportion after adding group
    BetaChange {
        /// Minimum proportional change
        threshold: f64,
    },
}

impl Default for DifCriterion {
    fn default() -> Self {
        Self::R2Change { threshold: 0.02 }
    }
}

/// Pseudo-R² definition used as effect size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PseudoR2 {
    /// Cox-Snell rescaled to a maximum of 1
    #[default]
    Nagelkerke,
    /// One minus the log-likelihood ratio
    McFadden,
    /// Cox-Snell
    CoxSnell,
}

/// Settings for the iterative DIF purification
#[derive(Debug, Clone, Serialize)]
pub struct DifConfig {
    /// Flagging rule
    pub criterion: DifCriterion,
    /// Effect-size definition reported (and used by `R2Change`)
    pub pseudo_r2: PseudoR2,
    /// Purification iteration budget
    pub max_iterations: usize,
    /// Anchors that must remain for the model to stay identified
    pub min_anchor_items: usize,
    /// Minimizer for the nested ordered-logit fits
    pub optimizer: OptimizerConfig,
}

impl Default for DifConfig {
    fn default() -> Self {
        Self {
            criterion: DifCriterion::default(),
            pseudo_r2: PseudoR2::default(),
            max_iterations: 10,
            min_anchor_items: MIN_INVARIANT_ITEMS,
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// Settings for the release-and-test estimator
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityConfig {
    /// Absolute theta difference (SD units) that counts as practically significant
    pub practical_threshold: f64,
    /// Item counts as impactful when the share exceeding the threshold is above this
    pub min_impacted_share: f64,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            practical_threshold: 0.3,
            min_impacted_share: 0.0,
        }
    }
}

/// Settings for the response-curve projector
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionConfig {
    /// Grid step in theta units
    pub grid_step: f64,
    /// Degree of the theta polynomial in the sum-score model
    pub sum_score_degree: usize,
    /// Sum score at or above which a respondent screens positive
    pub screening_cutoff: u32,
    /// Theta column the per-item response models are fitted on
    pub theta_variant: ThetaVariant,
    /// Minimizer for the per-item response models
    pub optimizer: OptimizerConfig,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            grid_step: 0.01,
            sum_score_degree: 4,
            screening_cutoff: 10,
            theta_variant: ThetaVariant::DifCalibrated,
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// Settings for per-item batches
#[derive(Debug, Clone, Serialize)]
pub struct BatchConfig {
    /// Worker threads
    pub workers: usize,
    /// Draw progress bars
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            show_progress: false,
        }
    }
}

/// Configuration for a full analysis run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisConfig {
    /// Graded response estimator
    pub estimator: EstimatorConfig,
    /// DIF scanner
    pub dif: DifConfig,
    /// Release-and-test estimator
    pub sensitivity: SensitivityConfig,
    /// Curve projector
    pub projection: ProjectionConfig,
    /// Per-item batches
    pub batch: BatchConfig,
}

impl AnalysisConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for the configuration
    #[must_use]
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::new()
    }

    /// Check every value before any fitting starts
    ///
    /// # Errors
    /// Returns `InputValidation` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let e = &self.estimator;
        if e.quadrature_points < 5 {
            return Err(invalid("estimator.quadrature_points", "must be at least 5"));
        }
        if !(e.quadrature_half_width.is_finite() && e.quadrature_half_width > 0.0) {
            return Err(invalid("estimator.quadrature_half_width", "must be positive"));
        }
        if e.max_em_iterations == 0 {
            return Err(invalid("estimator.max_em_iterations", "must be positive"));
        }
        if !(e.em_tolerance.is_finite() && e.em_tolerance > 0.0) {
            return Err(invalid("estimator.em_tolerance", "must be positive"));
        }
        check_optimizer("estimator.optimizer", &e.optimizer)?;

        match self.dif.criterion {
            DifCriterion::R2Change { threshold } | DifCriterion::BetaChange { threshold }
                if !(threshold.is_finite() && threshold >= 0.0) =>
            {
                return Err(invalid("dif.criterion", "threshold must be non-negative"));
            }
            DifCriterion::ChiSquare { alpha } if !(alpha > 0.0 && alpha < 1.0) => {
                return Err(invalid("dif.criterion", "alpha must lie in (0, 1)"));
            }
            _ => {}
        }
        if self.dif.max_iterations == 0 {
            return Err(invalid("dif.max_iterations", "must be positive"));
        }
        if self.dif.min_anchor_items < MIN_INVARIANT_ITEMS {
            return Err(invalid(
                "dif.min_anchor_items",
                format!("must be at least {MIN_INVARIANT_ITEMS}"),
            ));
        }
        check_optimizer("dif.optimizer", &self.dif.optimizer)?;

        let s = &self.sensitivity;
        if !(s.practical_threshold.is_finite() && s.practical_threshold >= 0.0) {
            return Err(invalid("sensitivity.practical_threshold", "must be non-negative"));
        }
        if !(0.0..1.0).contains(&s.min_impacted_share) {
            return Err(invalid("sensitivity.min_impacted_share", "must lie in [0, 1)"));
        }

        let p = &self.projection;
        if !(p.grid_step.is_finite() && p.grid_step > 0.0) {
            return Err(invalid("projection.grid_step", "must be positive"));
        }
        if p.sum_score_degree == 0 || p.sum_score_degree > 6 {
            return Err(invalid("projection.sum_score_degree", "must lie in 1..=6"));
        }
        if matches!(p.theta_variant, ThetaVariant::Released(_)) {
            return Err(invalid(
                "projection.theta_variant",
                "released-item thetas are comparison columns, not projection bases",
            ));
        }
        check_optimizer("projection.optimizer", &p.optimizer)?;

        if self.batch.workers == 0 {
            return Err(invalid("batch.workers", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> AnalysisError {
    AnalysisError::validation(format!("config {field}"), message)
}

fn check_optimizer(field: &str, optimizer: &OptimizerConfig) -> Result<()> {
    if optimizer.max_iter == 0 || optimizer.memory == 0 {
        return Err(invalid(field, "max_iter and memory must be positive"));
    }
    if !(optimizer.tol.is_finite() && optimizer.tol > 0.0) {
        return Err(invalid(field, "tol must be positive"));
    }
    Ok(())
}

impl fmt::Display for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Configuration:")?;
        writeln!(
            f,
            "  Quadrature: {} points on ±{}",
            self.estimator.quadrature_points, self.estimator.quadrature_half_width
        )?;
        writeln!(
            f,
            "  EM: max {} iterations, tolerance {:e}",
            self.estimator.max_em_iterations, self.estimator.em_tolerance
        )?;
        if let Some(seed) = self.estimator.seed {
            writeln!(f, "  Seed: {seed}")?;
        }
        match self.dif.criterion {
            DifCriterion::R2Change { threshold } => {
                writeln!(f, "  DIF criterion: {:?} R² change >= {threshold}", self.dif.pseudo_r2)?;
            }
            DifCriterion::ChiSquare { alpha } => {
                writeln!(f, "  DIF criterion: chi-square at alpha {alpha}")?;
            }
            DifCriterion::BetaChange { threshold } => {
                writeln!(f, "  DIF criterion: beta change >= {threshold}")?;
            }
        }
        writeln!(f, "  DIF max iterations: {}", self.dif.max_iterations)?;
        writeln!(
            f,
            "  Practical threshold: {} SD",
            self.sensitivity.practical_threshold
        )?;
        writeln!(
            f,
            "  Grid step: {} (projection on {})",
            self.projection.grid_step, self.projection.theta_variant
        )?;
        writeln!(f, "  Workers: {}", self.batch.workers)?;
        Ok(())
    }
}

/// Builder for constructing an analysis configuration
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    /// Create a new builder with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of quadrature nodes
    #[must_use]
    pub const fn quadrature_points(mut self, n: usize) -> Self {
        self.config.estimator.quadrature_points = n;
        self
    }

    /// Set the EM iteration budget
    #[must_use]
    pub const fn max_em_iterations(mut self, n: usize) -> Self {
        self.config.estimator.max_em_iterations = n;
        self
    }

    /// Set the EM convergence tolerance
    #[must_use]
    pub const fn em_tolerance(mut self, tol: f64) -> Self {
        self.config.estimator.em_tolerance = tol;
        self
    }

    /// Set the start-value seed
    #[must_use]
    pub const fn seed(mut self, seed: Option<u64>) -> Self {
        self.config.estimator.seed = seed;
        self
    }

    /// Set the DIF flagging rule
    #[must_use]
    pub const fn dif_criterion(mut self, criterion: DifCriterion) -> Self {
        self.config.dif.criterion = criterion;
        self
    }

    /// Set the pseudo-R² definition
    #[must_use]
    pub const fn pseudo_r2(mut self, kind: PseudoR2) -> Self {
        self.config.dif.pseudo_r2 = kind;
        self
    }

    /// Set the purification iteration budget
    #[must_use]
    pub const fn max_dif_iterations(mut self, n: usize) -> Self {
        self.config.dif.max_iterations = n;
        self
    }

    /// Set the minimizer for the DIF ordered-logit fits
    #[must_use]
    pub fn dif_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.config.dif.optimizer = optimizer;
        self
    }

    /// Set the practical-significance threshold in SD units
    #[must_use]
    pub const fn practical_threshold(mut self, threshold: f64) -> Self {
        self.config.sensitivity.practical_threshold = threshold;
        self
    }

    /// Set the projection grid step
    #[must_use]
    pub const fn grid_step(mut self, step: f64) -> Self {
        self.config.projection.grid_step = step;
        self
    }

    /// Set the theta column used for projections
    #[must_use]
    pub const fn projection_theta(mut self, variant: ThetaVariant) -> Self {
        self.config.projection.theta_variant = variant;
        self
    }

    /// Set the minimizer for the per-item response models
    #[must_use]
    pub fn projection_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.config.projection.optimizer = optimizer;
        self
    }

    /// Set the worker count
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.config.batch.workers = workers;
        self
    }

    /// Enable or disable progress bars
    #[must_use]
    pub const fn show_progress(mut self, show: bool) -> Self {
        self.config.batch.show_progress = show;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::Item;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dif.criterion, DifCriterion::R2Change { threshold: 0.02 });
        assert_eq!(config.dif.pseudo_r2, PseudoR2::Nagelkerke);
        assert!((config.projection.grid_step - 0.01).abs() < f64::EPSILON);
        assert!((config.sensitivity.practical_threshold - 0.3).abs() < f64::EPSILON);
        assert!(config.to_string().contains("Quadrature: 61 points"));
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(AnalysisConfig::builder().grid_step(0.0).build().is_err());
        assert!(
            AnalysisConfig::builder()
                .dif_criterion(DifCriterion::ChiSquare { alpha: 1.5 })
                .build()
                .is_err()
        );
        assert!(
            AnalysisConfig::builder()
                .projection_theta(ThetaVariant::Released(Item::Sleep))
                .build()
                .is_err()
        );
        let err = AnalysisConfig::builder().workers(0).build().unwrap_err();
        assert!(err.to_string().contains("batch.workers"));
    }

    #[test]
    fn test_model_fit_optimizers_are_configurable() {
        let tight = OptimizerConfig {
            max_iter: 2000,
            tol: 1e-9,
            memory: 10,
        };
        let config = AnalysisConfig::builder()
            .dif_optimizer(tight.clone())
            .projection_optimizer(tight)
            .build()
            .unwrap();
        assert_eq!(config.dif.optimizer.max_iter, 2000);
        assert_eq!(config.projection.optimizer.memory, 10);

        let err = AnalysisConfig::builder()
            .dif_optimizer(OptimizerConfig {
                max_iter: 0,
                ..OptimizerConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("dif.optimizer"));

        let err = AnalysisConfig::builder()
            .projection_optimizer(OptimizerConfig {
                tol: f64::NAN,
                ..OptimizerConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("projection.optimizer"));
    }
}
