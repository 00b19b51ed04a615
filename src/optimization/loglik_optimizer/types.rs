//! loglik_optimizer::types: shared numeric aliases and defaults.
//!
//! Purpose
//! -------
//! Centralize the core numeric types and defaults used by the
//! log-likelihood optimizer so that the solver code, the model layer, and
//! the fallback runner agree on shapes without repeating `ndarray` generics.
//!
//! Conventions
//! -----------
//! - `Theta` and `Grad` are column vectors with length equal to the number
//!   of free parameters.
//! - `Cost` is a scalar in log-likelihood space; the solvers flip signs
//!   internally when they minimize.
//! - The defaults below are the values the estimation layer relies on when
//!   callers do not override them.
use ndarray::Array1;
use std::collections::HashMap;

/// Parameter vector `θ` for log-likelihood optimization.
pub type Theta = Array1<f64>;

/// Gradient vector `∇ℓ(θ)`, matching the shape of `Theta`.
pub type Grad = Array1<f64>;

/// Scalar objective value.
pub type Cost = f64;

/// Function-evaluation counters keyed by name (`"cost_count"`, `"gradient_count"`).
pub type FnEvalMap = HashMap<String, u64>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 5;

/// Default iteration cap.
pub const DEFAULT_MAX_ITER: usize = 200;

/// Default gradient-norm stopping threshold.
pub const DEFAULT_TOL_GRAD: f64 = 1e-6;

/// Armijo sufficient-decrease constant.
pub const DEFAULT_ARMIJO_C1: f64 = 1e-4;

/// Step multiplier applied after each rejected trial step.
pub const DEFAULT_BACKTRACK_SHRINK: f64 = 0.5;

/// Maximum number of step halvings per line search.
pub const DEFAULT_MAX_BACKTRACKS: usize = 20;

/// Minimum curvature `sᵀy` for a correction pair to enter the history.
pub const CURVATURE_EPS: f64 = 1e-10;
