//! loglik_optimizer: log-likelihood maximizer with an argmin fallback.
//!
//! Purpose
//! -------
//! Provide a small, dependable optimization layer for **maximizing
//! log-likelihoods** `ℓ(θ)`. Callers implement a single trait,
//! [`LogLikelihood`], and invoke [`maximize`] to run L-BFGS with Armijo
//! backtracking, optionally followed by a derivative-free Nelder–Mead pass.
//!
//! Key behaviors
//! -------------
//! - [`lbfgs::run_lbfgs`] implements the two-loop L-BFGS recursion with a
//!   bounded correction history and a curvature filter.
//! - [`line_search::armijo_backtrack`] halves the step until the Armijo
//!   sufficient-decrease condition holds.
//! - [`run::run_nelder_mead`] drives argmin's Nelder–Mead solver through
//!   [`adapter::ArgMinAdapter`], which exposes `c(θ) = −ℓ(θ)`.
//! - [`finite_diff`] supplies numerical gradients for models without an
//!   analytic one and a discrepancy check for models with one.
//! - [`validation`] centralizes finiteness and shape checks.
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer **always maximizes** `ℓ(θ)`; user code implements `ℓ(θ)`
//!   and `∇ℓ(θ)`, never the cost.
//! - Hitting the iteration cap is not an error; it is reported through
//!   [`OptimOutcome::converged`] and [`OptimOutcome::status`].
//! - Configuration types ([`Tolerances`], [`LineSearchOptions`],
//!   [`MLEOptions`]) are validated on construction.
//!
//! Conventions
//! -----------
//! - Parameters live in an unconstrained space as [`Theta`] (`Array1<f64>`).
//! - All user-facing values (including [`OptimOutcome::value`] and
//!   [`OptimOutcome::ll_path`]) are log-likelihoods.
//! - Errors bubble up as [`OptResult<T>`](crate::optimization::errors::OptResult);
//!   this module never intentionally panics and never logs.
//!
//! Downstream usage
//! ----------------
//! - Model code implements [`LogLikelihood`] and calls [`maximize`] with a
//!   start vector, a data payload, and [`MLEOptions`].
//! - The conditional-logit likelihood and the pooled multinomial regression
//!   in `choice` both go through this entry point.
//!
//! Testing notes
//! -------------
//! - Unit tests in each submodule cover history bookkeeping, line-search
//!   acceptance, convergence on toy concave objectives, finite-difference
//!   fallbacks, the Nelder–Mead runner, and configuration validation.

pub mod adapter;
pub mod api;
pub mod finite_diff;
pub mod lbfgs;
pub mod line_search;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{
    FallbackMethod, LineSearchOptions, LogLikelihood, MLEOptions, OptimMethod, OptimOutcome,
    Termination, Tolerances,
};
pub use self::types::{Cost, FnEvalMap, Grad, Theta, DEFAULT_LBFGS_MEM};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_conjoint::optimization::loglik_optimizer::prelude::*;
//
// to import the main optimizer surface in a single line.

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{
        FallbackMethod, LineSearchOptions, LogLikelihood, MLEOptions, OptimMethod, OptimOutcome,
        Tolerances,
    };
    pub use super::types::{Cost, Grad, Theta};
}
