//! loglik_optimizer::finite_diff: finite-difference gradients and checks.
//!
//! Purpose
//! -------
//! Provide finite-difference approximations of `∇ℓ(θ)` for log-likelihoods
//! that do not implement an analytic gradient, and a discrepancy check that
//! compares an analytic gradient with its numerical counterpart.
//!
//! Key behaviors
//! -------------
//! - [`fd_gradient`] tries central differences first and falls back to
//!   forward differences when the central pass hit an objective error or
//!   produced a non-finite gradient.
//! - [`run_fd_diff`] computes a forward-difference gradient of an arbitrary
//!   closure with error capture and post-hoc validation.
//! - [`gradient_discrepancy`] reports `max_k |g_analytic − g_fd|`.
//!
//! Invariants & assumptions
//! ------------------------
//! - The `finitediff` closures must return `f64`, so objective errors are
//!   routed into a shared `RefCell<Option<OptError>>` and the closure returns
//!   `NaN`. The first captured error wins.
//! - Gradients returned from this module satisfy [`validate_grad`].
//!
//! Downstream usage
//! ----------------
//! - The L-BFGS driver calls [`fd_gradient`] whenever
//!   [`LogLikelihood::grad`] returns `GradientNotImplemented`.
//! - Model tests call [`gradient_discrepancy`] to check analytic gradients.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        traits::LogLikelihood,
        types::{Grad, Theta},
        validation::validate_grad,
    },
};
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// run_fd_diff: forward-difference gradient with error capture and validation.
///
/// Parameters
/// ----------
/// - `theta`: `&Theta`
///   Point at which the gradient is approximated; its length is the
///   expected gradient dimension.
/// - `func`: `&G`
///   Scalar objective. Evaluation errors must be written into
///   `closure_err` with `NaN` returned in their place.
/// - `closure_err`: `&RefCell<Option<OptError>>`
///   Error side channel; cleared on entry and inspected afterwards.
///
/// Errors
/// ------
/// - The captured objective error, if any.
/// - `OptError::GradientDimMismatch` / `OptError::InvalidGradient` from
///   [`validate_grad`].
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<OptError>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

/// fd_gradient: numerical `∇ℓ(θ)` for a [`LogLikelihood`].
///
/// Central differences are preferred. Forward differences are used when the
/// central pass captured an objective error or failed validation.
///
/// Errors
/// ------
/// - Objective errors raised during the forward pass.
/// - Validation errors when both passes yield non-finite gradients.
pub fn fd_gradient<F: LogLikelihood + ?Sized>(
    f: &F, theta: &Theta, data: &F::Data,
) -> OptResult<Grad> {
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let ll = |x: &Theta| -> f64 {
        match f.value(x, data) {
            Ok(v) => v,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };
    let central = theta.central_diff(&ll);
    if closure_err.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
        return Ok(central);
    }
    run_fd_diff(theta, &ll, &closure_err)
}

/// Analytic gradient when available, otherwise [`fd_gradient`].
///
/// Errors
/// ------
/// - Any error from `f.grad` other than `GradientNotImplemented`.
/// - Validation errors for the analytic gradient.
pub fn gradient_or_fd<F: LogLikelihood + ?Sized>(
    f: &F, theta: &Theta, data: &F::Data,
) -> OptResult<Grad> {
    match f.grad(theta, data) {
        Ok(g) => {
            validate_grad(&g, theta.len())?;
            Ok(g)
        }
        Err(OptError::GradientNotImplemented) => fd_gradient(f, theta, data),
        Err(e) => Err(e),
    }
}

/// gradient_discrepancy: `max_k |∇ℓ_analytic(θ)_k − ∇ℓ_fd(θ)_k|`.
///
/// Errors
/// ------
/// - Propagates errors from the analytic gradient or the central-difference
///   evaluation.
pub fn gradient_discrepancy<F: LogLikelihood + ?Sized>(
    f: &F, theta: &Theta, data: &F::Data,
) -> OptResult<f64> {
    let analytic = f.grad(theta, data)?;
    validate_grad(&analytic, theta.len())?;
    let numeric = fd_gradient(f, theta, data)?;
    Ok(analytic.iter().zip(numeric.iter()).map(|(a, n)| (a - n).abs()).fold(0.0, f64::max))
}
