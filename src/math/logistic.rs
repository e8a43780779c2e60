//! Numerically stable logistic helpers.

/// Stable `log(1 + exp(x))`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    x.max(0.0) + e.ln_1p()
}

/// Stable sigmoid: `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    let recip = 1.0 / (1.0 + e);
    if x >= 0.0 { recip } else { e * recip }
}

/// Stable `log(sigmoid(x))`.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 { -(-x).exp().ln_1p() } else { x - x.exp().ln_1p() }
}

/// Softplus, used to keep cutpoint increments positive.
#[inline]
pub fn softplus(x: f64) -> f64 {
    log1pexp(x)
}

/// Inverse of `softplus` for `y > 0`.
#[inline]
pub fn softplus_inv(y: f64) -> f64 {
    let y = y.max(1e-10);
    if y > 30.0 { y } else { y.exp_m1().ln() }
}

/// Stable `log(1 - exp(x))` for `x <= 0`.
#[inline]
pub fn log1mexp(x: f64) -> f64 {
    if !(x <= 0.0) {
        return f64::NEG_INFINITY;
    }
    const LN_HALF: f64 = -std::f64::consts::LN_2;
    if x < LN_HALF {
        (-x.exp()).ln_1p()
    } else {
        (-x.exp_m1()).ln()
    }
}

/// Log-odds of a proportion, clipped away from 0 and 1.
#[inline]
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-6, 1.0 - 1e-6);
    (p / (1.0 - p)).ln()
}

/// `log(sum(exp(xs)))` without overflow.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + xs.iter().map(|&x| (x - max).exp()).sum::<f64>().ln()
}
