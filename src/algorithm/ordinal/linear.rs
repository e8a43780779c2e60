//! Sum-score model: least squares on a theta polynomial interacted with group
//!
//! `E[sum | theta, g] = sum_k b_k theta^k + g * sum_k d_k theta^k`, k = 0..=degree.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::models::types::Group;

/// A fitted polynomial-by-group linear model of the sum score
#[derive(Debug, Clone, Serialize)]
pub struct SumScoreModel {
    degree: usize,
    terms: Vec<String>,
    coefficients: Vec<f64>,
    r_squared: f64,
    n: usize,
}

/// Design row `[1, t, .., t^d, g, g*t, .., g*t^d]`
fn design_row(theta: f64, group: Group, degree: usize) -> Vec<f64> {
    let g = group.as_f64();
    let powers: Vec<f64> = (0..=degree)
        .map(|k| theta.powi(i32::try_from(k).unwrap_or(i32::MAX)))
        .collect();
    let mut row = powers.clone();
    row.extend(powers.into_iter().map(|p| g * p));
    row
}

fn term_names(degree: usize) -> Vec<String> {
    let base: Vec<String> = (0..=degree)
        .map(|k| match k {
            0 => "(intercept)".to_string(),
            1 => "theta".to_string(),
            k => format!("theta^{k}"),
        })
        .collect();
    let mut names = base.clone();
    names.extend(base.into_iter().map(|b| {
        if b == "(intercept)" {
            "group".to_string()
        } else {
            format!("{b}:group")
        }
    }));
    names
}

impl SumScoreModel {
    /// Fit by ordinary least squares
    ///
    /// # Errors
    /// `InputValidation` for mismatched lengths or too few observations,
    /// `Computation` when the normal equations are singular.
    pub fn fit(thetas: &[f64], groups: &[Group], sums: &[u32], degree: usize) -> Result<Self> {
        if thetas.len() != groups.len() || thetas.len() != sums.len() {
            return Err(AnalysisError::validation(
                "sum score model",
                "theta, group and sum score columns differ in length",
            ));
        }
        let d = 2 * (degree + 1);
        if thetas.len() <= d {
            return Err(AnalysisError::validation(
                "sum score model",
                format!("{} observations for {d} coefficients", thetas.len()),
            ));
        }

        let mut xtx = DMatrix::<f64>::zeros(d, d);
        let mut xty = DVector::<f64>::zeros(d);
        for ((&t, &g), &s) in thetas.iter().zip(groups).zip(sums) {
            let row = DVector::from_vec(design_row(t, g, degree));
            xtx += &row * row.transpose();
            xty += &row * f64::from(s);
        }

        let beta = xtx
            .lu()
            .solve(&xty)
            .ok_or_else(|| AnalysisError::Computation("sum score OLS: singular X'X".to_string()))?;
        let coefficients: Vec<f64> = beta.iter().copied().collect();

        let n = thetas.len() as f64;
        let mean = sums.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
        let (ss_res, ss_tot) = thetas.iter().zip(groups).zip(sums).fold(
            (0.0, 0.0),
            |(res, tot), ((&t, &g), &s)| {
                let fitted: f64 = design_row(t, g, degree)
                    .iter()
                    .zip(&coefficients)
                    .map(|(x, b)| x * b)
                    .sum();
                let y = f64::from(s);
                (res + (y - fitted).powi(2), tot + (y - mean).powi(2))
            },
        );

        Ok(Self {
            degree,
            terms: term_names(degree),
            coefficients,
            r_squared: if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 },
            n: thetas.len(),
        })
    }

    /// Expected sum score
    #[must_use]
    pub fn predict(&self, theta: f64, group: Group) -> f64 {
        design_row(theta, group, self.degree)
            .iter()
            .zip(&self.coefficients)
            .map(|(x, b)| x * b)
            .sum()
    }

    /// Coefficients paired with term names
    #[must_use]
    pub fn coefficients(&self) -> Vec<(&str, f64)> {
        self.terms
            .iter()
            .map(String::as_str)
            .zip(self.coefficients.iter().copied())
            .collect()
    }

    /// Coefficient of determination
    #[must_use]
    pub const fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// Observations used
    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }
}
