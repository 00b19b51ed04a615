//! optimization: MLE stack, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide a cohesive optimization layer for model fitting, combining a
//! log-likelihood maximizer (L-BFGS with an argmin-backed Nelder–Mead
//! fallback), numerically stable probability transforms, and a single
//! error/result surface. Callers implement a log-likelihood, choose
//! tolerances, and obtain fitted parameters and diagnostics without touching
//! solver details.
//!
//! Key behaviors
//! -------------
//! - Expose a high-level API for **maximizing log-likelihoods** `ℓ(θ)`
//!   (`loglik_optimizer`), including stopping criteria, line-search
//!   settings, and the optional fallback solver.
//! - Supply shared numerical primitives (`numerical_stability`): stable
//!   softmax, log-sum-exp, and logistic transforms.
//! - Normalize configuration issues, numerical failures, and backend solver
//!   errors into a single enum (`errors::OptError`) with a common result
//!   alias (`OptResult<T>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Optimizers operate in an unconstrained parameter space `θ` and assume
//!   that inputs are finite once validation has passed; invalid states are
//!   reported as `OptError`, not panics.
//! - Non-convergence is data, not an error: every successful run returns an
//!   `OptimOutcome` carrying a `converged` flag.
//!
//! Conventions
//! -----------
//! - All solvers conceptually maximize `ℓ(θ)` by minimizing `c(θ) = -ℓ(θ)`;
//!   user-facing APIs and outcomes are expressed in terms of `ℓ`.
//! - Parameters and gradients are `ndarray` vectors (`Theta`, `Grad`).
//! - This module and its submodules avoid I/O and logging; the estimation
//!   layer in `choice` reports progress through `tracing`.
//!
//! Downstream usage
//! ----------------
//! - Model code implements `LogLikelihood` and calls `maximize`.
//! - Front-ends typically import the curated surface via
//!   `optimization::prelude::*`.
//!
//! Testing notes
//! -------------
//! - Unit tests in the submodules focus on local concerns: solver
//!   bookkeeping and convergence on toy objectives, tolerance validation,
//!   stable transforms, and error conversions.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_conjoint::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
