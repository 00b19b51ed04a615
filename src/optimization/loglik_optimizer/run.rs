//! Execution helper that runs argmin's Nelder–Mead solver on a log-likelihood
//! problem and returns a crate-friendly [`OptimOutcome`].
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        finite_diff::gradient_or_fd,
        traits::{LogLikelihood, MLEOptions, OptimMethod, OptimOutcome, Termination},
        types::Theta,
    },
};
use argmin::{
    core::{Executor, State, TerminationReason, TerminationStatus},
    solver::neldermead::NelderMead,
};

/// Relative perturbation used to build the initial simplex.
const SIMPLEX_REL_STEP: f64 = 0.05;

/// Absolute perturbation for coordinates that start at zero.
const SIMPLEX_ZERO_STEP: f64 = 0.00025;

/// Standard deviation of simplex costs below which Nelder–Mead stops.
const SIMPLEX_SD_TOLERANCE: f64 = 1e-10;

/// Run Nelder–Mead from `theta0`.
///
/// # Behavior
/// - Builds an `n + 1` vertex simplex around `theta0`, perturbing each
///   coordinate by 5% (or `2.5e-4` for zeros).
/// - Caps iterations at `max_iter × n`.
/// - With the `obs_slog` feature and `opts.verbose`, attaches a terminal slog
///   observer.
/// - Maps argmin's termination into [`Termination`]; only `SolverConverged`
///   and `TargetCostReached` count as convergence.
///
/// # Errors
/// - Propagates argmin runtime errors and objective errors through
///   `From<argmin::core::Error> for OptError`.
/// - Propagates validation errors when building the [`OptimOutcome`].
pub fn run_nelder_mead<F: LogLikelihood + ?Sized>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    let dim = theta0.len();
    let mut vertices = Vec::with_capacity(dim + 1);
    vertices.push(theta0.clone());
    for k in 0..dim {
        let mut vertex = theta0.clone();
        vertex[k] = if vertex[k].abs() > 1e-8 {
            vertex[k] * (1.0 + SIMPLEX_REL_STEP)
        } else {
            SIMPLEX_ZERO_STEP
        };
        vertices.push(vertex);
    }
    let solver = NelderMead::new(vertices).with_sd_tolerance(SIMPLEX_SD_TOLERANCE)?;
    let problem = ArgMinAdapter::new(f, data);
    let max_iters = (opts.tols.max_iter.saturating_mul(dim.max(1))) as u64;

    let mut optimizer = Executor::new(problem, solver).configure(|state| state.max_iters(max_iters));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let fn_evals = result.get_func_counts().clone();
    let termination = match result.get_termination_status() {
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached,
        ) => Termination::SolverConverged,
        TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
            Termination::MaxIterations
        }
        other => Termination::Other(format!("{other:?}")),
    };
    let value = -result.get_best_cost();
    let theta_hat = result.take_best_param();
    let grad = theta_hat.as_ref().and_then(|t| gradient_or_fd(f, t, data).ok());
    OptimOutcome::new(
        theta_hat,
        value,
        termination,
        OptimMethod::NelderMead,
        iterations,
        fn_evals,
        grad.as_ref(),
        vec![value],
    )
}
