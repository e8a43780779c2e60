//! Descriptive statistics over score vectors

/// Mean and population standard deviation
#[must_use]
pub fn mean_sd(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Rescale to mean 0 and standard deviation 1
///
/// Returns `None` for empty, non-finite or constant input.
#[must_use]
pub fn standardize(values: &[f64]) -> Option<Vec<f64>> {
    let (mean, sd) = mean_sd(values)?;
    if sd <= f64::EPSILON {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / sd).collect())
}

/// Signed and absolute mean of pairwise differences `a - b`
#[must_use]
pub fn mean_differences(a: &[f64], b: &[f64]) -> (f64, f64) {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return (0.0, 0.0);
    }
    let n = a.len() as f64;
    let (signed, unsigned) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0), |(s, u), (x, y)| (s + (x - y), u + (x - y).abs()));
    (signed / n, unsigned / n)
}
