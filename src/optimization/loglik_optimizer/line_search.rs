//! Armijo backtracking line search in cost space.
//!
//! The L-BFGS driver minimizes `c(θ) = −ℓ(θ)`. Given a descent direction `p`
//! with slope `∇c(θ)ᵀp < 0`, the search tries `α = 1, shrink, shrink², …`
//! and accepts the first step satisfying
//!
//! ```text
//! c(θ + αp) ≤ c(θ) + c1 · α · ∇c(θ)ᵀp
//! ```
//!
//! Trial points whose log-likelihood is non-finite count as rejections.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::{LineSearchOptions, LogLikelihood},
        types::{FnEvalMap, Theta},
    },
};

/// Accepted trial point.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedStep {
    pub theta: Theta,
    /// Log-likelihood `ℓ` at `theta`.
    pub value: f64,
    pub step: f64,
}

/// Backtrack along `direction` from `theta`.
///
/// Parameters
/// ----------
/// - `cost`: `c(θ) = −ℓ(θ)` at the current point.
/// - `slope`: `∇c(θ)ᵀp`; must be negative for the search to make sense.
/// - `fn_evals`: `"cost_count"` is incremented once per trial.
///
/// Returns
/// -------
/// - `Ok(Some(step))` for the first trial meeting the Armijo condition.
/// - `Ok(None)` when every trial was rejected.
///
/// Errors
/// ------
/// - Objective errors other than non-finite values are propagated.
#[allow(clippy::too_many_arguments)]
pub fn armijo_backtrack<F: LogLikelihood + ?Sized>(
    f: &F, data: &F::Data, theta: &Theta, cost: f64, direction: &Theta, slope: f64,
    opts: &LineSearchOptions, fn_evals: &mut FnEvalMap,
) -> OptResult<Option<AcceptedStep>> {
    let mut step = 1.0;
    for _ in 0..opts.max_backtracks {
        let mut trial = theta.clone();
        trial.scaled_add(step, direction);
        let value = f.value(&trial, data)?;
        *fn_evals.entry("cost_count".to_string()).or_insert(0) += 1;
        if value.is_finite() && -value <= cost + opts.c1 * step * slope {
            return Ok(Some(AcceptedStep { theta: trial, value, step }));
        }
        step *= opts.shrink;
    }
    Ok(None)
}
