//! Public API surface for log-likelihood maximization.
//!
//! - [`LogLikelihood`]: trait users implement for their model.
//! - [`MLEOptions`], [`Tolerances`], [`LineSearchOptions`]: optimizer configuration.
//! - [`FallbackMethod`]: optional derivative-free solver tried after a
//!   non-converged L-BFGS run.
//! - [`OptimOutcome`]: normalized result returned by [`maximize`](super::maximize).
//!
//! Convention: we *maximize* a user log-likelihood `ℓ(θ)` by minimizing the cost
//! `c(θ) = -ℓ(θ)`. If an analytic gradient is provided, it should be the gradient
//! of the log-likelihood (`∇ℓ(θ)`); the solvers flip the sign as needed.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        types::{
            Cost, FnEvalMap, Grad, Theta, DEFAULT_ARMIJO_C1, DEFAULT_BACKTRACK_SHRINK,
            DEFAULT_LBFGS_MEM, DEFAULT_MAX_BACKTRACKS, DEFAULT_MAX_ITER, DEFAULT_TOL_GRAD,
        },
        validation::{validate_theta_hat, validate_value, verify_tol_grad},
    },
};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// User-implemented log-likelihood interface.
///
/// - `type Data`: per-model data carried into `value`/`grad`/`check`.
///
/// Required:
/// - `value(&Theta, &Data) -> OptResult<Cost>`: evaluate `ℓ(θ)`.
/// - `check(&Theta, &Data) -> OptResult<()>`: reject obviously invalid
///   `θ`/`data` pairs. Called once before optimization.
///
/// Optional:
/// - `grad(&Theta, &Data) -> OptResult<Grad>`: analytic gradient `∇ℓ(θ)`.
///   If not implemented, finite differences are used automatically.
/// - `value_and_grad`: joint evaluation; override when the two share work.
pub trait LogLikelihood {
    type Data;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }

    fn value_and_grad(&self, theta: &Theta, data: &Self::Data) -> OptResult<(Cost, Grad)> {
        let value = self.value(theta, data)?;
        let grad = self.grad(theta, data)?;
        Ok((value, grad))
    }
}

/// Derivative-free solver tried once when L-BFGS does not converge.
///
/// Parsing is case-insensitive and accepts `"none"`, `"nelder-mead"`,
/// `"neldermead"` and `"nelder_mead"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMethod {
    #[default]
    None,
    NelderMead,
}

impl FromStr for FallbackMethod {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(FallbackMethod::None),
            "nelder-mead" | "neldermead" | "nelder_mead" => Ok(FallbackMethod::NelderMead),
            _ => Err(OptError::InvalidFallback {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'none' or 'nelder-mead'.",
            }),
        }
    }
}

/// Armijo backtracking configuration.
///
/// - `c1`: sufficient-decrease constant, in `(0, 1)`.
/// - `shrink`: step multiplier after a rejected trial, in `(0, 1)`.
/// - `max_backtracks`: number of shrinks before the search gives up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOptions {
    pub c1: f64,
    pub shrink: f64,
    pub max_backtracks: usize,
}

impl LineSearchOptions {
    /// Construct validated line-search options.
    ///
    /// # Errors
    /// - [`OptError::InvalidLineSearch`] when `c1` or `shrink` fall outside
    ///   `(0, 1)` or `max_backtracks == 0`.
    pub fn new(c1: f64, shrink: f64, max_backtracks: usize) -> OptResult<Self> {
        if !(c1.is_finite() && c1 > 0.0 && c1 < 1.0) {
            return Err(OptError::InvalidLineSearch {
                name: "c1",
                value: c1,
                reason: "Armijo constant must lie in (0, 1).",
            });
        }
        if !(shrink.is_finite() && shrink > 0.0 && shrink < 1.0) {
            return Err(OptError::InvalidLineSearch {
                name: "shrink",
                value: shrink,
                reason: "Step shrink factor must lie in (0, 1).",
            });
        }
        if max_backtracks == 0 {
            return Err(OptError::InvalidLineSearch {
                name: "max_backtracks",
                value: 0.0,
                reason: "At least one backtracking step is required.",
            });
        }
        Ok(Self { c1, shrink, max_backtracks })
    }
}

impl Default for LineSearchOptions {
    fn default() -> Self {
        Self {
            c1: DEFAULT_ARMIJO_C1,
            shrink: DEFAULT_BACKTRACK_SHRINK,
            max_backtracks: DEFAULT_MAX_BACKTRACKS,
        }
    }
}

/// Numerical tolerances and iteration limits used by the optimizer.
///
/// - `tol_grad`: terminate when `‖∇ℓ(θ)‖₂` falls below this threshold.
/// - `max_iter`: hard cap on the number of accepted iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: f64,
    pub max_iter: usize,
}

impl Tolerances {
    /// Construct validated tolerances; `None` selects the default
    /// (`tol_grad = 1e-6`, `max_iter = 200`).
    ///
    /// # Errors
    /// - [`OptError::InvalidTolGrad`] for non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(tol_grad: Option<f64>, max_iter: Option<usize>) -> OptResult<Self> {
        verify_tol_grad(tol_grad)?;
        let max_iter = max_iter.unwrap_or(DEFAULT_MAX_ITER);
        if max_iter == 0 {
            return Err(OptError::InvalidMaxIter {
                max_iter,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        Ok(Self { tol_grad: tol_grad.unwrap_or(DEFAULT_TOL_GRAD), max_iter })
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self { tol_grad: DEFAULT_TOL_GRAD, max_iter: DEFAULT_MAX_ITER }
    }
}

/// Optimizer-level configuration.
///
/// Fields:
/// - `tols`: gradient tolerance and iteration cap.
/// - `line_search`: Armijo backtracking settings.
/// - `lbfgs_mem`: number of `(s, y)` pairs kept by L-BFGS.
/// - `fallback`: derivative-free solver tried after a non-converged run.
/// - `verbose`: attaches a terminal observer to the fallback run (requires
///   the `obs_slog` feature).
///
/// Default: `tol_grad = 1e-6`, `max_iter = 200`, `lbfgs_mem = 5`,
/// `c1 = 1e-4`, halving up to 20 times, no fallback, quiet.
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_search: LineSearchOptions,
    pub lbfgs_mem: usize,
    pub fallback: FallbackMethod,
    pub verbose: bool,
}

impl MLEOptions {
    /// Create a new set of optimizer options.
    ///
    /// # Errors
    /// - [`OptError::InvalidLBFGSMem`] when `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_search: LineSearchOptions, lbfgs_mem: Option<usize>,
        fallback: FallbackMethod, verbose: bool,
    ) -> OptResult<Self> {
        let lbfgs_mem = lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
        if lbfgs_mem == 0 {
            return Err(OptError::InvalidLBFGSMem {
                mem: lbfgs_mem,
                reason: "L-BFGS memory must be greater than zero.",
            });
        }
        Ok(Self { tols, line_search, lbfgs_mem, fallback, verbose })
    }
}

impl Default for MLEOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances::default(),
            line_search: LineSearchOptions::default(),
            lbfgs_mem: DEFAULT_LBFGS_MEM,
            fallback: FallbackMethod::None,
            verbose: false,
        }
    }
}

/// Solver that produced an [`OptimOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptimMethod {
    #[serde(rename = "L-BFGS")]
    Lbfgs,
    #[serde(rename = "Nelder-Mead")]
    NelderMead,
}

impl fmt::Display for OptimMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimMethod::Lbfgs => write!(f, "L-BFGS"),
            OptimMethod::NelderMead => write!(f, "Nelder-Mead"),
        }
    }
}

/// Why a solver stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// `‖∇ℓ‖₂` dropped below `tol_grad`.
    GradientTolerance,
    /// The backend solver reported its own convergence criterion.
    SolverConverged,
    /// `max_iter` accepted iterations were used up.
    MaxIterations,
    /// No step satisfied the Armijo condition, even along steepest ascent.
    LineSearchFailed,
    /// Any other backend status, kept verbatim.
    Other(String),
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::GradientTolerance | Termination::SolverConverged)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::GradientTolerance => write!(f, "Gradient norm below tolerance"),
            Termination::SolverConverged => write!(f, "Solver converged"),
            Termination::MaxIterations => write!(f, "Maximum iterations reached"),
            Termination::LineSearchFailed => write!(f, "Line search failed"),
            Termination::Other(text) => write!(f, "{text}"),
        }
    }
}

/// Canonical result returned by `maximize`.
///
/// - `theta_hat`: best parameter vector found.
/// - `value`: best **log-likelihood** value `ℓ(θ)` (not the cost).
/// - `converged`: `true` only when the solver met its convergence criterion.
/// - `status`: human-readable termination status string.
/// - `method`: solver that produced `theta_hat`.
/// - `iterations`: number of accepted iterations.
/// - `fn_evals`: evaluation counters (`cost_count`, `gradient_count`).
/// - `grad_norm`: `‖∇ℓ(θ̂)‖₂` when a gradient was evaluated at `theta_hat`.
/// - `ll_path`: `ℓ` at the start point and after each accepted iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub method: OptimMethod,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
    pub ll_path: Vec<f64>,
}

impl OptimOutcome {
    /// Build a validated [`OptimOutcome`] from raw solver state.
    ///
    /// # Errors
    /// - Propagates validation errors for `theta_hat` (missing or non-finite)
    ///   and `value` (non-finite).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: Termination, method: OptimMethod,
        iterations: u64, fn_evals: FnEvalMap, grad: Option<&Grad>, ll_path: Vec<f64>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let grad_norm = grad.map(|g| g.dot(g).sqrt());
        Ok(Self {
            theta_hat,
            value,
            converged: termination.is_converged(),
            status: termination.to_string(),
            method,
            iterations: iterations as usize,
            fn_evals,
            grad_norm,
            ll_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Validation in `Tolerances::new`, `LineSearchOptions::new`, `MLEOptions::new`.
    // - `FallbackMethod` parsing.
    // - Convergence mapping inside `OptimOutcome::new`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Defaults are filled in when tolerances are omitted.
    //
    // Given
    // -----
    // - `Tolerances::new(None, None)`.
    //
    // Expect
    // ------
    // - `tol_grad = 1e-6`, `max_iter = 200`.
    fn tolerances_fill_defaults() {
        let tols = Tolerances::new(None, None).expect("defaults should validate");

        assert_eq!(tols.tol_grad, 1e-6);
        assert_eq!(tols.max_iter, 200);
    }

    #[test]
    // Purpose
    // -------
    // Reject non-positive tolerances and zero iteration caps.
    //
    // Given
    // -----
    // - `tol_grad = -1.0`, then `max_iter = 0`.
    //
    // Expect
    // ------
    // - `InvalidTolGrad` and `InvalidMaxIter` respectively.
    fn tolerances_reject_invalid_values() {
        let bad_tol = Tolerances::new(Some(-1.0), None);
        let bad_iter = Tolerances::new(None, Some(0));

        assert!(matches!(bad_tol, Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(bad_iter, Err(OptError::InvalidMaxIter { .. })));
    }

    #[test]
    // Purpose
    // -------
    // The Armijo constant and shrink factor must lie strictly inside (0, 1).
    //
    // Given
    // -----
    // - `c1 = 1.5`, then `shrink = 0.0`.
    //
    // Expect
    // ------
    // - Both constructions fail with `InvalidLineSearch`.
    fn line_search_options_validate_ranges() {
        assert!(matches!(
            LineSearchOptions::new(1.5, 0.5, 20),
            Err(OptError::InvalidLineSearch { name: "c1", .. })
        ));
        assert!(matches!(
            LineSearchOptions::new(1e-4, 0.0, 20),
            Err(OptError::InvalidLineSearch { name: "shrink", .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // A zero-length L-BFGS history is rejected.
    //
    // Given
    // -----
    // - `lbfgs_mem = Some(0)`.
    //
    // Expect
    // ------
    // - `InvalidLBFGSMem`.
    fn mle_options_reject_zero_memory() {
        let res = MLEOptions::new(
            Tolerances::default(),
            LineSearchOptions::default(),
            Some(0),
            FallbackMethod::None,
            false,
        );

        assert!(matches!(res, Err(OptError::InvalidLBFGSMem { mem: 0, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Fallback names parse case-insensitively and unknown names fail.
    //
    // Given
    // -----
    // - `"Nelder-Mead"`, `"NONE"`, `"bfgs"`.
    //
    // Expect
    // ------
    // - `NelderMead`, `None`, and `InvalidFallback`.
    fn fallback_method_parses_names() {
        assert_eq!("Nelder-Mead".parse::<FallbackMethod>(), Ok(FallbackMethod::NelderMead));
        assert_eq!("NONE".parse::<FallbackMethod>(), Ok(FallbackMethod::None));
        assert!(matches!(
            "bfgs".parse::<FallbackMethod>(),
            Err(OptError::InvalidFallback { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Only convergence-type terminations set `converged`.
    //
    // Given
    // -----
    // - Identical raw state with `GradientTolerance` and `MaxIterations`.
    //
    // Expect
    // ------
    // - `converged` is true for the former and false for the latter; the
    //   gradient norm is computed from the supplied gradient.
    fn outcome_maps_termination_to_convergence() {
        let grad = array![3.0, 4.0];
        let ok = OptimOutcome::new(
            Some(array![1.0, 2.0]),
            -1.5,
            Termination::GradientTolerance,
            OptimMethod::Lbfgs,
            4,
            FnEvalMap::new(),
            Some(&grad),
            vec![-2.0, -1.5],
        )
        .expect("valid outcome");
        let capped = OptimOutcome::new(
            Some(array![1.0, 2.0]),
            -1.5,
            Termination::MaxIterations,
            OptimMethod::Lbfgs,
            200,
            FnEvalMap::new(),
            None,
            Vec::new(),
        )
        .expect("valid outcome");

        assert!(ok.converged);
        assert_eq!(ok.grad_norm, Some(5.0));
        assert!(!capped.converged);
        assert_eq!(capped.status, "Maximum iterations reached");
    }

    #[test]
    // Purpose
    // -------
    // Missing or non-finite estimates are rejected.
    //
    // Given
    // -----
    // - `theta_hat = None`, then `theta_hat = [NaN]`.
    //
    // Expect
    // ------
    // - `MissingThetaHat`, then `InvalidThetaHat`.
    fn outcome_rejects_invalid_theta_hat() {
        let missing = OptimOutcome::new(
            None,
            0.0,
            Termination::GradientTolerance,
            OptimMethod::Lbfgs,
            0,
            FnEvalMap::new(),
            None,
            Vec::new(),
        );
        let nan = OptimOutcome::new(
            Some(array![f64::NAN]),
            0.0,
            Termination::GradientTolerance,
            OptimMethod::Lbfgs,
            0,
            FnEvalMap::new(),
            None,
            Vec::new(),
        );

        assert_eq!(missing, Err(OptError::MissingThetaHat));
        assert!(matches!(nan, Err(OptError::InvalidThetaHat { index: 0, .. })));
    }
}
