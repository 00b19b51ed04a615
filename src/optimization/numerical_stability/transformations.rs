//! Numerical stability utilities.
//!
//! Provides safe implementations of the nonlinear transforms used by the
//! choice models, which overflow or underflow in naïve form.
//!
//! # Provided items
//! - [`LOG_PROB_EPS`]: additive guard applied before taking the log of a
//!   probability.
//! - [`stable_softmax_in_place`] / [`stable_softmax`]: softmax with the
//!   maximum subtracted before exponentiation.
//! - [`log_sum_exp`]: `ln Σ exp(x_i)` without overflow.
//! - [`safe_logistic`]: `1 / (1 + exp(−x))` evaluated on the stable branch.
use ndarray::{Array1, ArrayView1, ArrayViewMut1};

/// Guard added to probabilities before `ln`, so a probability that
/// underflows to zero contributes a large finite penalty instead of `−∞`.
pub const LOG_PROB_EPS: f64 = 1e-300;

/// Overwrite `u` with `softmax(u)`.
///
/// Subtracts `max(u)` before exponentiation, so the result is invariant to
/// adding a constant to every entry and never overflows. An empty view is
/// left untouched.
pub fn stable_softmax_in_place(mut u: ArrayViewMut1<'_, f64>) {
    if u.is_empty() {
        return;
    }
    let max = u.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    u.mapv_inplace(|v| (v - max).exp());
    let total = u.sum();
    u.mapv_inplace(|v| v / total);
}

/// Allocating variant of [`stable_softmax_in_place`].
pub fn stable_softmax(u: ArrayView1<'_, f64>) -> Array1<f64> {
    let mut out = u.to_owned();
    stable_softmax_in_place(out.view_mut());
    out
}

/// `ln Σ_i exp(x_i)`, computed as `m + ln Σ exp(x_i − m)` with `m = max x`.
///
/// Returns `−∞` for an empty input.
pub fn log_sum_exp(x: ArrayView1<'_, f64>) -> f64 {
    let max = x.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    if !max.is_finite() {
        return max;
    }
    max + x.fold(0.0, |acc, &v| acc + (v - max).exp()).ln()
}

/// Numerically stable logistic function `σ(x) = 1 / (1 + e^{−x})`.
///
/// Uses `e^{x} / (1 + e^{x})` for negative `x` so that neither branch
/// overflows.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
