//! Log-space arithmetic.

/// `log(Σ exp(v))`, stable for large magnitudes. Empty input is `-inf`.
pub fn log_sum_exp<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY || max == f64::INFINITY || max.is_nan() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// `log(exp(a) + exp(b))`.
pub fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Normalize log-space values in place so that `Σ exp(v) = 1`.
/// Returns the log normalizer; all-`-inf` input is left untouched.
pub fn normalize_log(values: &mut [f64]) -> f64 {
    let z = log_sum_exp(values.iter().copied());
    if z.is_finite() {
        for v in values.iter_mut() {
            *v -= z;
        }
    }
    z
}
