//! Plain-text tables and JSON output of an analysis report
//!
//! Each table is a borrowing `Display` wrapper; the free functions render one
//! to a `String`.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::algorithm::batch::ItemFailure;
use crate::algorithm::dif::DifScan;
use crate::algorithm::dif::stats::pseudo_r2_label;
use crate::algorithm::ordinal::ModelSummary;
use crate::algorithm::projection::{ItemImpact, SumScoreImpact};
use crate::algorithm::sensitivity::ReleaseResult;
use crate::config::PseudoR2;
use crate::error::{AnalysisError, Result};
use crate::pipeline::AnalysisReport;
use crate::utils::logging::{log_operation_complete, log_operation_start};

const RULE: &str = "--------------------------------------------------------------------------";

/// DIF summary: LR statistics, beta change and pseudo-R² increments per item
pub struct DifTable<'a> {
    /// Purification result
    pub scan: &'a DifScan,
    /// Pseudo-R² flavour named in the headers
    pub kind: PseudoR2,
}

impl fmt::Display for DifTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = pseudo_r2_label(self.kind);
        writeln!(
            f,
            "DIF summary ({} round(s), anchors: {})",
            self.scan.iterations, self.scan.anchors
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "{:<6} {:<12} {:>9} {:>9} {:>9} {:>12} {:>12}",
            "item",
            "class",
            "chi12",
            "chi13",
            "beta %",
            format!("{label} 12"),
            format!("{label} 13")
        )?;
        for s in &self.scan.statistics {
            writeln!(
                f,
                "{:<6} {:<12} {:>9.3} {:>9.3} {:>9.2} {:>12.4} {:>12.4}",
                s.item.code(),
                s.class.to_string(),
                s.chi12,
                s.chi13,
                100.0 * s.beta_change,
                s.r2_change_12,
                s.r2_change_13
            )?;
        }
        Ok(())
    }
}

/// Release-and-test results per item
pub struct SensitivityTable<'a>(pub &'a [ReleaseResult]);

impl fmt::Display for SensitivityTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let threshold = self.0.first().map_or(0.0, |r| r.threshold);
        writeln!(f, "Release-and-test (practical threshold {threshold} SD)")?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "{:<6} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "item", "signed", "unsigned", "max |d|", "share", "impactful"
        )?;
        for r in self.0 {
            writeln!(
                f,
                "{:<6} {:>10.4} {:>10.4} {:>10.4} {:>10.3} {:>10}",
                r.item.code(),
                r.mean_signed_difference,
                r.mean_absolute_difference,
                r.max_absolute_difference,
                r.share_exceeding,
                if r.impactful { "yes" } else { "no" }
            )?;
        }
        Ok(())
    }
}

/// Average group differences of the projected curves
pub struct ImpactTable<'a> {
    /// Per-item impacts
    pub impacts: &'a [ItemImpact],
    /// Sum-score impact
    pub sum_score: &'a SumScoreImpact,
}

impl fmt::Display for ImpactTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Projected group differences (focal minus reference)")?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "{:<10} {:>14} {:>14} {:>14} {:>14}",
            "item", "resp signed", "resp unsigned", "elev signed", "elev unsigned"
        )?;
        for i in self.impacts {
            writeln!(
                f,
                "{:<10} {:>14.4} {:>14.4} {:>14.4} {:>14.4}",
                i.item.code(),
                i.response_difference.signed,
                i.response_difference.unsigned,
                i.elevated_difference.signed,
                i.elevated_difference.unsigned
            )?;
        }
        let sum_score = self.sum_score;
        writeln!(
            f,
            "{:<10} {:>14.4} {:>14.4}",
            "sum score", sum_score.difference.signed, sum_score.difference.unsigned
        )?;
        let crossing = |c: Option<f64>| c.map_or_else(|| "never".to_string(), |t| format!("{t:.2}"));
        writeln!(
            f,
            "Cutoff {} reached at theta {} (reference), {} (focal); R² {:.4}",
            sum_score.screening_cutoff,
            crossing(sum_score.cutoff_crossing[0]),
            crossing(sum_score.cutoff_crossing[1]),
            sum_score.r_squared
        )
    }
}

/// Coefficient table of one response model
pub struct CoefficientTable<'a> {
    /// Heading
    pub title: &'a str,
    /// Fitted model
    pub summary: &'a ModelSummary,
}

impl fmt::Display for CoefficientTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (pseudo-R² {:.4}, n = {})",
            self.title, self.summary.pseudo_r2, self.summary.n
        )?;
        writeln!(
            f,
            "  {:<12} {:>10} {:>10} {:>10} {:>10}",
            "term", "estimate", "OR", "2.5%", "97.5%"
        )?;
        for c in &self.summary.coefficients {
            writeln!(
                f,
                "  {:<12} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                c.term, c.estimate, c.odds_ratio, c.ci_lower, c.ci_upper
            )?;
        }
        Ok(())
    }
}

struct FailureTable<'a>(&'a [ItemFailure]);

impl fmt::Display for FailureTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Item failures")?;
        writeln!(f, "{RULE}")?;
        for failure in self.0 {
            writeln!(
                f,
                "{:<12} {:<6} {:<18} {}",
                failure.stage,
                failure.item.code(),
                failure.kind,
                failure.message
            )?;
        }
        Ok(())
    }
}

/// Whole report as text: summary, tables and per-item coefficients
pub struct ReportText<'a>(pub &'a AnalysisReport);

impl fmt::Display for ReportText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "{report}")?;
        writeln!(
            f,
            "{}",
            DifTable {
                scan: &report.dif,
                kind: report.config.dif.pseudo_r2,
            }
        )?;
        writeln!(f, "{}", SensitivityTable(&report.releases))?;
        write!(
            f,
            "{}",
            ImpactTable {
                impacts: &report.impacts,
                sum_score: &report.sum_score,
            }
        )?;
        for impact in &report.impacts {
            let title = format!("{} response, interaction", impact.item.code());
            write!(
                f,
                "\n{}",
                CoefficientTable {
                    title: &title,
                    summary: &impact.interaction,
                }
            )?;
        }
        if !report.failures.is_empty() {
            write!(f, "\n{}", FailureTable(&report.failures))?;
        }
        Ok(())
    }
}

/// DIF summary table as text
#[must_use]
pub fn dif_table(scan: &DifScan, kind: PseudoR2) -> String {
    DifTable { scan, kind }.to_string()
}

/// Release-and-test table as text
#[must_use]
pub fn sensitivity_table(releases: &[ReleaseResult]) -> String {
    SensitivityTable(releases).to_string()
}

/// Projected group differences as text
#[must_use]
pub fn impact_table(impacts: &[ItemImpact], sum_score: &SumScoreImpact) -> String {
    ImpactTable { impacts, sum_score }.to_string()
}

/// Coefficient table as text
#[must_use]
pub fn coefficient_table(title: &str, summary: &ModelSummary) -> String {
    CoefficientTable { title, summary }.to_string()
}

/// Render the whole report as text
#[must_use]
pub fn render(report: &AnalysisReport) -> String {
    ReportText(report).to_string()
}

/// Serialize the report to pretty JSON
///
/// # Errors
/// `Serialization` if a record cannot be encoded.
pub fn to_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| AnalysisError::Serialization(e.to_string()))
}

/// Write the report as JSON
///
/// # Errors
/// `Serialization` or `Io`.
pub fn write_json(path: &Path, report: &AnalysisReport) -> Result<()> {
    log_operation_start("Writing report", path);
    let json = to_json(report)?;
    fs::write(path, json)?;
    log_operation_complete("wrote", path, report.impacts.len(), None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::ordinal::CoefficientEstimate;
    use crate::models::theta::{ThetaScores, ThetaVariant};
    use crate::models::types::Item;

    fn release(item: Item, impactful: bool) -> ReleaseResult {
        ReleaseResult {
            item,
            mean_signed_difference: -0.05,
            mean_absolute_difference: 0.08,
            max_absolute_difference: 0.4,
            share_exceeding: 0.02,
            threshold: 0.3,
            impactful,
            focal_mean: 0.1,
            n: 2,
            theta: ThetaScores::standardized(ThetaVariant::Released(item), &[0.0, 1.0]).unwrap(),
        }
    }

    #[test]
    fn test_sensitivity_table_rows() {
        let table = sensitivity_table(&[release(Item::Sleep, true), release(Item::Appetite, false)]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("0.3 SD"));
        assert!(lines[3].starts_with("phq3"));
        assert!(lines[3].ends_with("yes"));
        assert!(lines[4].ends_with("no"));
    }

    #[test]
    fn test_failure_table_lists_each_failure() {
        let failures = [ItemFailure {
            stage: "release".to_string(),
            item: Item::Psychomotor,
            kind: "convergence".to_string(),
            message: "no convergence after 500 iterations".to_string(),
        }];
        let text = FailureTable(&failures).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("release"));
        assert!(lines[2].contains("phq8"));
        assert!(lines[2].ends_with("500 iterations"));
    }

    #[test]
    fn test_coefficient_table_lists_terms() {
        let summary = ModelSummary {
            coefficients: vec![CoefficientEstimate {
                term: "theta:group".to_string(),
                estimate: 0.2,
                std_error: 0.1,
                odds_ratio: 0.2f64.exp(),
                ci_lower: 1.0,
                ci_upper: 1.5,
            }],
            pseudo_r2: 0.31,
            log_likelihood: -100.0,
            n: 50,
        };
        let table = coefficient_table("phq1", &summary);
        assert!(table.contains("n = 50"));
        assert!(table.contains("theta:group"));
        assert!(table.contains("1.2214"));
    }
}
