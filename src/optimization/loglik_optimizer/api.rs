//! High-level entry point for maximizing a user-provided `LogLikelihood`.
//!
//! Runs the in-crate L-BFGS driver and, when it stops without converging and
//! a fallback is configured, a single Nelder–Mead pass started from the
//! L-BFGS estimate.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        lbfgs::run_lbfgs,
        run::run_nelder_mead,
        traits::{FallbackMethod, LogLikelihood, MLEOptions, OptimOutcome},
        types::Theta,
    },
};

/// Maximize a log-likelihood `ℓ(θ)`.
///
/// # Behavior
/// - Validates the initial guess via `f.check(theta0, data)`.
/// - Runs L-BFGS with Armijo backtracking (see [`run_lbfgs`]).
/// - If L-BFGS did not converge and `opts.fallback` is
///   [`FallbackMethod::NelderMead`], runs Nelder–Mead from the L-BFGS
///   estimate and keeps whichever result has the larger log-likelihood.
/// - Non-convergence is reported through [`OptimOutcome::converged`], never
///   as an error.
///
/// # Errors
/// - Propagates any error from `f.check`.
/// - Propagates objective/gradient errors raised during the run.
/// - A failing fallback run is ignored in favor of the L-BFGS outcome.
///
/// # Example
/// ```
/// use ndarray::array;
/// use rust_conjoint::optimization::{
///     errors::OptResult,
///     loglik_optimizer::{maximize, LogLikelihood, MLEOptions, Theta},
/// };
///
/// struct Concave;
/// impl LogLikelihood for Concave {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(-(theta - 1.0).mapv(|d| d * d).sum())
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Concave, array![0.0, 0.0], &(), &MLEOptions::default())?;
/// assert!(out.converged);
/// # Ok::<(), rust_conjoint::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood + ?Sized>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let primary = run_lbfgs(f, theta0, data, opts)?;
    if primary.converged || opts.fallback == FallbackMethod::None {
        return Ok(primary);
    }
    match run_nelder_mead(f, primary.theta_hat.clone(), data, opts) {
        Ok(secondary) if secondary.value >= primary.value => Ok(secondary),
        _ => Ok(primary),
    }
}
